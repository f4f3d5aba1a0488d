use crate::error::PcdError;

// LAS data coordinates are stored as i32
// The actual coordinates are calculated based on a combination of scale and offset, as follows
// x = (raw_x * scale) + offset
pub fn decode(raw: i32, scale: f64, offset: f64) -> f64 {
    raw as f64 * scale + offset
}

pub fn encode(value: f64, scale: f64, offset: f64) -> Result<i32, PcdError> {
    let raw = ((value - offset) / scale).round();
    if !raw.is_finite() || raw < i32::MIN as f64 || raw > i32::MAX as f64 {
        return Err(PcdError::CoordinateOutOfRange {
            value,
            scale,
            offset,
        });
    }
    Ok(raw as i32)
}

/// Scale and offset of a single axis.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AxisTransform {
    scale: f64,
    offset: f64,
}

impl AxisTransform {
    pub fn new(scale: f64, offset: f64) -> Result<Self, PcdError> {
        Self::for_axis('?', scale, offset)
    }

    fn for_axis(axis: char, scale: f64, offset: f64) -> Result<Self, PcdError> {
        if !scale.is_finite() || scale <= 0.0 {
            return Err(PcdError::InvalidScale { axis, scale });
        }
        if !offset.is_finite() {
            return Err(PcdError::InvalidOffset { axis, offset });
        }
        Ok(Self { scale, offset })
    }

    pub fn scale(&self) -> f64 {
        self.scale
    }

    pub fn offset(&self) -> f64 {
        self.offset
    }

    pub fn decode(&self, raw: i32) -> f64 {
        decode(raw, self.scale, self.offset)
    }

    pub fn encode(&self, value: f64) -> Result<i32, PcdError> {
        encode(value, self.scale, self.offset)
    }
}

/// Per-axis scale and offset of a point source or sink.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScaleOffset {
    pub x: AxisTransform,
    pub y: AxisTransform,
    pub z: AxisTransform,
}

impl ScaleOffset {
    pub fn new(scale: [f64; 3], offset: [f64; 3]) -> Result<Self, PcdError> {
        Ok(Self {
            x: AxisTransform::for_axis('X', scale[0], offset[0])?,
            y: AxisTransform::for_axis('Y', scale[1], offset[1])?,
            z: AxisTransform::for_axis('Z', scale[2], offset[2])?,
        })
    }

    pub fn scale(&self) -> [f64; 3] {
        [self.x.scale, self.y.scale, self.z.scale]
    }

    pub fn offset(&self) -> [f64; 3] {
        [self.x.offset, self.y.offset, self.z.offset]
    }

    pub fn decode(&self, raw: [i32; 3]) -> [f64; 3] {
        [
            self.x.decode(raw[0]),
            self.y.decode(raw[1]),
            self.z.decode(raw[2]),
        ]
    }

    pub fn encode(&self, value: [f64; 3]) -> Result<[i32; 3], PcdError> {
        Ok([
            self.x.encode(value[0])?,
            self.y.encode(value[1])?,
            self.z.encode(value[2])?,
        ])
    }
}
