use crate::error::PcdError;

use super::transform::ScaleOffset;

/// Ordered attribute names of a point record, mirroring the LAS point-format field list.
///
/// `X`, `Y` and `Z` are always present. Every other name is an extra attribute whose values are
/// stored in schema order in [`PointRecord::extra`].
#[derive(Debug, Clone, PartialEq)]
pub struct AttributeSchema {
    names: Vec<String>,
    slots: Vec<Slot>,
    extra_count: usize,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Slot {
    X,
    Y,
    Z,
    Extra(usize),
}

impl AttributeSchema {
    pub fn new<S: Into<String>>(names: impl IntoIterator<Item = S>) -> Result<Self, PcdError> {
        let names: Vec<String> = names.into_iter().map(Into::into).collect();

        let mut slots = Vec::with_capacity(names.len());
        let mut extra_count = 0;
        let mut seen = [false; 3];

        for name in &names {
            let slot = match name.as_str() {
                "X" if !seen[0] => Slot::X,
                "Y" if !seen[1] => Slot::Y,
                "Z" if !seen[2] => Slot::Z,
                _ => {
                    extra_count += 1;
                    Slot::Extra(extra_count - 1)
                }
            };
            match slot {
                Slot::X => seen[0] = true,
                Slot::Y => seen[1] = true,
                Slot::Z => seen[2] = true,
                Slot::Extra(_) => {}
            }
            slots.push(slot);
        }

        for (present, name) in seen.iter().zip(["X", "Y", "Z"]) {
            if !present {
                return Err(PcdError::MissingAttribute(name));
            }
        }

        Ok(Self {
            names,
            slots,
            extra_count,
        })
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn slots(&self) -> &[Slot] {
        &self.slots
    }

    pub fn extra_count(&self) -> usize {
        self.extra_count
    }

    /// Comma-joined attribute names, without a trailing delimiter.
    pub fn header_line(&self) -> String {
        self.names.join(",")
    }
}

/// A single point with raw (unscaled) coordinates.
#[derive(Debug, Clone, PartialEq)]
pub struct PointRecord {
    pub x: i32,
    pub y: i32,
    pub z: i32,
    pub extra: Vec<f64>,
}

impl PointRecord {
    pub fn new(x: i32, y: i32, z: i32) -> Self {
        Self {
            x,
            y,
            z,
            extra: Vec::new(),
        }
    }

    pub fn raw_xyz(&self) -> [i32; 3] {
        [self.x, self.y, self.z]
    }
}

#[derive(Debug, Clone)]
pub struct PointSet {
    schema: AttributeSchema,
    records: Vec<PointRecord>,
}

impl PointSet {
    pub fn new(schema: AttributeSchema) -> Self {
        Self {
            schema,
            records: Vec::new(),
        }
    }

    pub fn with_capacity(schema: AttributeSchema, capacity: usize) -> Self {
        Self {
            schema,
            records: Vec::with_capacity(capacity),
        }
    }

    pub fn push(&mut self, record: PointRecord) -> Result<(), PcdError> {
        if record.extra.len() != self.schema.extra_count() {
            return Err(PcdError::SchemaMismatch {
                expected: self.schema.extra_count(),
                actual: record.extra.len(),
            });
        }
        self.records.push(record);
        Ok(())
    }

    pub fn schema(&self) -> &AttributeSchema {
        &self.schema
    }

    pub fn records(&self) -> &[PointRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &PointRecord> {
        self.records.iter()
    }

    /// Replaces every raw Z value, or none of them.
    pub fn set_raw_z(&mut self, raw_z: Vec<i32>) -> Result<(), PcdError> {
        if raw_z.len() != self.records.len() {
            return Err(PcdError::Alignment {
                expected: self.records.len(),
                actual: raw_z.len(),
            });
        }
        for (record, z) in self.records.iter_mut().zip(raw_z) {
            record.z = z;
        }
        Ok(())
    }
}

/// Metadata of a decoded point source.
#[derive(Debug, Clone)]
pub struct FileInfo {
    pub point_count: u64,
    pub transforms: ScaleOffset,
    pub schema: AttributeSchema,
}

// This represents the maximum and minimum values of the original coordinate values obtained by combining the scale and offset.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BoundingVolume {
    pub min: [f64; 3],
    pub max: [f64; 3],
}

impl BoundingVolume {
    pub fn empty() -> Self {
        Self {
            min: [f64::MAX, f64::MAX, f64::MAX],
            max: [f64::MIN, f64::MIN, f64::MIN],
        }
    }

    pub fn extend(&mut self, point: [f64; 3]) {
        for axis in 0..3 {
            self.min[axis] = self.min[axis].min(point[axis]);
            self.max[axis] = self.max[axis].max(point[axis]);
        }
    }

    pub fn is_empty(&self) -> bool {
        (0..3).any(|axis| self.min[axis] > self.max[axis])
    }
}
