pub mod point;
pub mod transform;
