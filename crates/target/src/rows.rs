//! Convert driver rows into display strings.
//!
//! Statements run through `sqlx::raw_sql`, i.e. the simple query protocol,
//! so both MySQL and PostgreSQL return every value in text format. Decoding
//! unchecked as `String` therefore works for any column type.

use sqlx::{Column, ColumnIndex, Decode, Row, ValueRef};

/// Rendering of SQL `NULL`.
pub const NULL_CELL: &str = "";

/// Column headers of a row.
pub fn column_names<R: Row>(row: &R) -> Vec<String> {
    row.columns().iter().map(|c| c.name().to_string()).collect()
}

/// Placeholder headers for rows whose column names are unavailable.
pub fn placeholder_columns(width: usize) -> Vec<String> {
    (0..width).map(|i| format!("column_{i}")).collect()
}

/// Stringify every cell of a row.
pub fn row_to_strings<R>(row: &R) -> Vec<String>
where
    R: Row,
    usize: ColumnIndex<R>,
    for<'r> String: Decode<'r, R::Database>,
    for<'r> Vec<u8>: Decode<'r, R::Database>,
{
    (0..row.len()).map(|idx| cell_to_string(row, idx)).collect()
}

fn cell_to_string<R>(row: &R, idx: usize) -> String
where
    R: Row,
    usize: ColumnIndex<R>,
    for<'r> String: Decode<'r, R::Database>,
    for<'r> Vec<u8>: Decode<'r, R::Database>,
{
    match row.try_get_raw(idx) {
        Ok(raw) if raw.is_null() => return NULL_CELL.to_string(),
        Ok(_) => {}
        Err(e) => {
            tracing::debug!(idx, error = %e, "Unreadable cell");
            return NULL_CELL.to_string();
        }
    }
    if let Ok(text) = row.try_get_unchecked::<String, _>(idx) {
        return text;
    }
    row.try_get_unchecked::<Vec<u8>, _>(idx)
        .map(|bytes| String::from_utf8_lossy(&bytes).into_owned())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn placeholder_columns_are_numbered() {
        assert_eq!(
            placeholder_columns(3),
            vec!["column_0", "column_1", "column_2"]
        );
        assert!(placeholder_columns(0).is_empty());
    }
}
