use pcd_core::{
    pointcloud::{point::PointSet, transform::AxisTransform},
    table::ResponseTable,
    PcdError,
};

use crate::error::HeightError;

/// Real-world heights of the `height_code` column, in response row order.
pub fn extract_heights(table: &ResponseTable, height_code: &str) -> Result<Vec<f64>, HeightError> {
    let index = table.column_index(height_code)?;
    log::debug!("height code '{}' found at column {}", height_code, index);

    table
        .column(height_code)?
        .enumerate()
        .map(|(row, value)| {
            value
                .trim()
                .parse::<f64>()
                .map_err(|_| HeightError::InvalidHeight {
                    row: row + 1,
                    value: value.to_string(),
                })
        })
        .collect()
}

/// Replaces the Z of every point with the height of the response row at the same position.
///
/// Rows are matched by position only: row N of the response belongs to point N of the request.
/// The row count must equal the point count and every height must be representable with `z`;
/// otherwise nothing is modified.
pub fn merge_heights(
    points: &mut PointSet,
    table: &ResponseTable,
    height_code: &str,
    z: &AxisTransform,
) -> Result<usize, HeightError> {
    let heights = extract_heights(table, height_code)?;

    if heights.len() != points.len() {
        if table.dropped_rows() > 0 {
            log::warn!(
                "{} malformed response rows were dropped",
                table.dropped_rows()
            );
        }
        return Err(PcdError::Alignment {
            expected: points.len(),
            actual: heights.len(),
        }
        .into());
    }

    let raw_z = heights
        .into_iter()
        .map(|height| z.encode(height))
        .collect::<Result<Vec<_>, _>>()?;
    points.set_raw_z(raw_z)?;

    Ok(points.len())
}

#[cfg(test)]
mod tests {
    use pcd_core::pointcloud::{
        point::{AttributeSchema, PointRecord},
        transform::{encode, ScaleOffset},
    };

    use super::*;

    const RESPONSE: &str = "utm_e,utm_n,H2013,utm_z\n\
        329999.8947,4839000.0062,35.123,ON-9\n\
        330002.2338,4838999.6872,35.071,ON-9\n";

    fn transforms() -> ScaleOffset {
        ScaleOffset::new([0.0001; 3], [329999.8947, 4839000.0062, 0.0]).unwrap()
    }

    fn points(raw: &[[i32; 3]]) -> PointSet {
        let schema = AttributeSchema::new(["X", "Y", "Z", "intensity"]).unwrap();
        let mut points = PointSet::new(schema);
        for (i, &[x, y, z]) in raw.iter().enumerate() {
            let mut record = PointRecord::new(x, y, z);
            record.extra.push(i as f64);
            points.push(record).unwrap();
        }
        points
    }

    #[test]
    fn extracts_height_column_skipping_malformed_rows() {
        let text = "utm_e,utm_n,H2013,utm_z\n\
            329999.8947,4839000.0062,35.123,ON-9\n\
            330002.2338,4838999.6872,35.071\n\
            330026.3268,4839042.692,34.870,ON-9\n";
        let table = ResponseTable::parse(text, ',').unwrap();

        assert_eq!(table.column_index("H2013").unwrap(), 2);
        let heights = extract_heights(&table, "H2013").unwrap();
        assert_eq!(heights, vec![35.123, 34.870]);
    }

    #[test]
    fn missing_height_code_is_a_lookup_error() {
        let table = ResponseTable::parse(RESPONSE, ',').unwrap();
        let err = extract_heights(&table, "H2010").unwrap_err();
        assert!(matches!(err, HeightError::Core(PcdError::MissingColumn(code)) if code == "H2010"));
    }

    #[test]
    fn unparsable_height_reports_row() {
        let table = ResponseTable::parse("a,H2013\n1,2.5\n2,n/a\n", ',').unwrap();
        let err = extract_heights(&table, "H2013").unwrap_err();
        assert!(matches!(err, HeightError::InvalidHeight { row: 2, value } if value == "n/a"));
    }

    #[test]
    fn merge_replaces_z_and_keeps_xy() {
        let transforms = transforms();
        let mut target = points(&[[0, 0, 6710], [23391, -3190, 6170]]);
        let table = ResponseTable::parse(RESPONSE, ',').unwrap();

        let merged = merge_heights(&mut target, &table, "H2013", &transforms.z).unwrap();
        assert_eq!(merged, 2);

        let records = target.records();
        assert_eq!(records[0].raw_xyz(), [0, 0, encode(35.123, 0.0001, 0.0).unwrap()]);
        assert_eq!(records[1].raw_xyz(), [23391, -3190, 350710]);
        assert_eq!(records[1].extra, vec![1.0]);
        assert!((transforms.z.decode(records[0].z) - 35.123).abs() < 1e-9);
    }

    #[test]
    fn blank_response_lines_do_not_break_alignment() {
        let z = AxisTransform::new(0.01, 0.0).unwrap();
        let mut target = points(&[[0, 0, 0], [0, 0, 0]]);
        let table = ResponseTable::parse("H2013\n35.1\n\n35.2\n", ',').unwrap();

        merge_heights(&mut target, &table, "H2013", &z).unwrap();
        assert_eq!(target.records()[0].z, 3510);
        assert_eq!(target.records()[1].z, 3520);
    }

    #[test]
    fn merge_uses_target_offset() {
        let z = AxisTransform::new(0.01, 100.0).unwrap();
        let mut target = points(&[[0, 0, 0], [0, 0, 0]]);
        let table = ResponseTable::parse("H2013\n101.25\n99.5\n", ',').unwrap();

        merge_heights(&mut target, &table, "H2013", &z).unwrap();
        assert_eq!(target.records()[0].z, 125);
        assert_eq!(target.records()[1].z, -50);
    }

    #[test]
    fn row_count_mismatch_fails_before_mutation() {
        let transforms = transforms();
        let mut target = points(&[[0, 0, 6710], [23391, -3190, 6170]]);
        let table = ResponseTable::parse(
            "utm_e,utm_n,H2013,utm_z\n1,2,35.1,ON-9\n3,4,35.2,ON-9\n5,6,35.3,ON-9\n",
            ',',
        )
        .unwrap();

        let err = merge_heights(&mut target, &table, "H2013", &transforms.z).unwrap_err();
        assert!(matches!(
            err,
            HeightError::Core(PcdError::Alignment {
                expected: 2,
                actual: 3
            })
        ));
        assert_eq!(target.records()[0].z, 6710);
        assert_eq!(target.records()[1].z, 6170);
    }

    #[test]
    fn dropped_rows_surface_as_alignment_error() {
        let transforms = transforms();
        let mut target = points(&[[0, 0, 6710], [23391, -3190, 6170]]);
        let table = ResponseTable::parse("utm_e,utm_n,H2013\n1,2,35.1\n3,4\n", ',').unwrap();

        let err = merge_heights(&mut target, &table, "H2013", &transforms.z).unwrap_err();
        assert!(matches!(
            err,
            HeightError::Core(PcdError::Alignment {
                expected: 2,
                actual: 1
            })
        ));
    }

    #[test]
    fn unrepresentable_height_leaves_points_untouched() {
        let z = AxisTransform::new(0.0001, 0.0).unwrap();
        let mut target = points(&[[0, 0, 1], [0, 0, 2]]);
        let table = ResponseTable::parse("H2013\n35.0\n1e12\n", ',').unwrap();

        let err = merge_heights(&mut target, &table, "H2013", &z).unwrap_err();
        assert!(matches!(
            err,
            HeightError::Core(PcdError::CoordinateOutOfRange { .. })
        ));
        assert_eq!(target.records()[0].z, 1);
        assert_eq!(target.records()[1].z, 2);
    }
}
