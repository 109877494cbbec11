//! Put Batcher: folds cell writes into one mutation per row.

use hashbrown::HashMap;
use widecol_core::Put;

/// A single cell write supplied by the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteRequest {
    pub row: String,
    pub family: String,
    pub qualifier: String,
    pub value: Vec<u8>,
}

impl WriteRequest {
    pub fn new(
        row: impl Into<String>,
        family: impl Into<String>,
        qualifier: impl Into<String>,
        value: impl Into<Vec<u8>>,
    ) -> Self {
        Self {
            row: row.into(),
            family: family.into(),
            qualifier: qualifier.into(),
            value: value.into(),
        }
    }
}

/// Group writes into one `Put` per distinct row key.
///
/// Rows come out in the order they are first seen. A repeated
/// (family, qualifier) within a row keeps its first position but takes the
/// value of the last write.
pub fn group_writes(writes: &[WriteRequest]) -> Vec<Put> {
    let mut puts: Vec<Put> = Vec::new();
    let mut by_row: HashMap<&str, usize> = HashMap::new();

    for write in writes {
        let index = *by_row.entry(write.row.as_str()).or_insert_with(|| {
            puts.push(Put::new(write.row.as_str()));
            puts.len() - 1
        });
        let put = &mut puts[index];

        let existing = put
            .columns_mut()
            .iter_mut()
            .find(|c| c.family == write.family.as_bytes() && c.qualifier == write.qualifier.as_bytes());
        match existing {
            Some(column) => column.value.clone_from(&write.value),
            None => {
                put.add_column(write.family.as_str(), write.qualifier.as_str(), write.value.as_slice());
            }
        }
    }
    puts
}

#[cfg(test)]
mod tests {
    use super::*;

    fn columns(put: &Put) -> Vec<(String, String, Vec<u8>)> {
        put.columns()
            .iter()
            .map(|c| {
                (
                    String::from_utf8_lossy(&c.family).into_owned(),
                    String::from_utf8_lossy(&c.qualifier).into_owned(),
                    c.value.clone(),
                )
            })
            .collect()
    }

    fn col(family: &str, qualifier: &str, value: &str) -> (String, String, Vec<u8>) {
        (family.to_string(), qualifier.to_string(), value.as_bytes().to_vec())
    }

    #[test]
    fn test_same_row_merges_last_write_wins() {
        let writes = vec![
            WriteRequest::new("r1", "f", "q1", "a"),
            WriteRequest::new("r1", "f", "q1", "b"),
            WriteRequest::new("r2", "f", "q1", "c"),
        ];
        let puts = group_writes(&writes);

        assert_eq!(puts.len(), 2);
        assert_eq!(puts[0].row(), b"r1");
        assert_eq!(columns(&puts[0]), vec![col("f", "q1", "b")]);
        assert_eq!(puts[1].row(), b"r2");
        assert_eq!(columns(&puts[1]), vec![col("f", "q1", "c")]);
    }

    #[test]
    fn test_distinct_columns_kept_in_order() {
        let writes = vec![
            WriteRequest::new("r", "f", "b", "1"),
            WriteRequest::new("r", "g", "a", "2"),
            WriteRequest::new("r", "f", "b", "3"),
            WriteRequest::new("r", "f", "a", "4"),
        ];
        let puts = group_writes(&writes);

        assert_eq!(puts.len(), 1);
        assert_eq!(
            columns(&puts[0]),
            vec![
                col("f", "b", "3"),
                col("g", "a", "2"),
                col("f", "a", "4"),
            ]
        );
    }

    #[test]
    fn test_one_put_per_distinct_row() {
        let writes: Vec<WriteRequest> = (0..50)
            .map(|i| WriteRequest::new(format!("row-{}", i % 7), "f", format!("q{}", i % 3), vec![i as u8]))
            .collect();
        let puts = group_writes(&writes);

        assert_eq!(puts.len(), 7);
        let rows: Vec<&[u8]> = puts.iter().map(Put::row).collect();
        assert_eq!(rows[0], b"row-0");
        assert_eq!(rows[6], b"row-6");
        // last write to row-0/q0 is i = 42
        let q0 = puts[0].columns().iter().find(|c| c.qualifier == b"q0").map(|c| c.value.clone());
        assert_eq!(q0, Some(vec![42u8]));
    }

    #[test]
    fn test_empty_input() {
        assert!(group_writes(&[]).is_empty());
    }

    #[test]
    fn test_empty_value_is_a_write() {
        let puts = group_writes(&[WriteRequest::new("r", "f", "q", "x"), WriteRequest::new("r", "f", "q", "")]);
        assert_eq!(puts[0].columns()[0].value, Vec::<u8>::new());
    }
}
