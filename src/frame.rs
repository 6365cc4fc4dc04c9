//! Helpers over `polars::DataFrame` for survey tables.
//!
//! Exports arrive as all-text tables: every column starts out as a nullable
//! `String` column and empty fields are null. The stages narrow types from there.

use polars::prelude::*;

use crate::error::{PrepError, Result};

/// Build an all-text frame from row-major fields. Rows must match the header width.
pub fn from_rows(columns: &[String], rows: Vec<Vec<Option<String>>>) -> Result<DataFrame> {
    let mut values: Vec<Vec<Option<String>>> = vec![Vec::with_capacity(rows.len()); columns.len()];
    for (line, row) in rows.into_iter().enumerate() {
        if row.len() != columns.len() {
            return Err(PrepError::MalformedInput(format!(
                "row {} has {} fields, expected {}",
                line + 1,
                row.len(),
                columns.len()
            )));
        }
        for (column, field) in values.iter_mut().zip(row) {
            column.push(field);
        }
    }

    let columns = columns
        .iter()
        .zip(values)
        .map(|(name, cells)| text_column(name, cells))
        .collect();
    Ok(DataFrame::new(columns)?)
}

/// A nullable text column.
pub fn text_column(name: &str, values: Vec<Option<String>>) -> Column {
    Column::new(name.into(), values)
}

/// A nullable float column.
pub fn number_column(name: &str, values: Vec<Option<f64>>) -> Column {
    Column::new(name.into(), values)
}

pub fn column_names(df: &DataFrame) -> Vec<String> {
    df.get_column_names().iter().map(|name| name.to_string()).collect()
}

pub fn has_column(df: &DataFrame, name: &str) -> bool {
    df.get_column_names().iter().any(|c| c.as_str() == name)
}

/// True while a column still holds raw text.
pub fn is_text_column(df: &DataFrame, name: &str) -> Result<bool> {
    Ok(df.column(name)?.dtype() == &DataType::String)
}

/// Read a column as text, casting non-text columns first.
pub fn text_values(df: &DataFrame, name: &str) -> Result<Vec<Option<String>>> {
    let casted = df.column(name)?.cast(&DataType::String)?;
    let values = casted
        .str()?
        .into_iter()
        .map(|value| value.map(str::to_string))
        .collect();
    Ok(values)
}

/// Keep the rows whose mask entry is true. Returns how many rows were removed.
pub fn retain_rows(df: &mut DataFrame, keep: &[bool]) -> Result<usize> {
    let before = df.height();
    let mask = BooleanChunked::from_slice("keep".into(), keep);
    *df = df.filter(&mask)?;
    Ok(before - df.height())
}

/// Drop the named columns that exist. Returns the names actually dropped, in frame order.
pub fn drop_columns(df: &mut DataFrame, names: &[String]) -> Result<Vec<String>> {
    let doomed: Vec<String> = column_names(df)
        .into_iter()
        .filter(|c| names.contains(c))
        .collect();
    for name in &doomed {
        df.drop_in_place(name)?;
    }
    Ok(doomed)
}

/// Rebuild the frame with new column names, position for position.
pub fn rename_all(df: DataFrame, names: &[String]) -> Result<DataFrame> {
    if names.len() != df.width() {
        return Err(PrepError::MalformedInput(format!(
            "{} names for {} columns",
            names.len(),
            df.width()
        )));
    }
    let columns = df
        .get_columns()
        .iter()
        .zip(names)
        .map(|(column, name)| column.clone().with_name(name.as_str().into()))
        .collect();
    Ok(DataFrame::new(columns)?)
}

#[cfg(test)]
pub(crate) fn number_values(df: &DataFrame, name: &str) -> Vec<Option<f64>> {
    let casted = df.column(name).unwrap().cast(&DataType::Float64).unwrap();
    casted
        .as_materialized_series()
        .f64()
        .unwrap()
        .into_iter()
        .collect()
}

#[cfg(test)]
pub(crate) fn text_frame(columns: &[&str], rows: &[&[&str]]) -> DataFrame {
    let names: Vec<String> = columns.iter().map(|c| c.to_string()).collect();
    let rows = rows
        .iter()
        .map(|row| {
            row.iter()
                .map(|field| (!field.is_empty()).then(|| field.to_string()))
                .collect()
        })
        .collect();
    from_rows(&names, rows).unwrap()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> DataFrame {
        text_frame(&["a", "b", "c"], &[&["1", "x", ""], &["2", "y", "z"], &["3", "x", "w"]])
    }

    #[test]
    fn ragged_rows_are_rejected() {
        let err = from_rows(
            &["a".to_string(), "b".to_string()],
            vec![vec![Some("1".into()), Some("2".into())], vec![None]],
        )
        .unwrap_err();
        assert!(matches!(err, PrepError::MalformedInput(msg) if msg.contains("row 2")));
    }

    #[test]
    fn empty_fields_are_null_text() {
        let df = sample();
        assert!(is_text_column(&df, "c").unwrap());
        assert_eq!(
            text_values(&df, "c").unwrap(),
            vec![None, Some("z".to_string()), Some("w".to_string())]
        );
    }

    #[test]
    fn retain_rows_reports_removed_count() {
        let mut df = sample();
        let removed = retain_rows(&mut df, &[true, false, true]).unwrap();
        assert_eq!(removed, 1);
        assert_eq!(
            text_values(&df, "a").unwrap(),
            vec![Some("1".to_string()), Some("3".to_string())]
        );
    }

    #[test]
    fn drop_columns_ignores_unknown_names() {
        let mut df = sample();
        let dropped = drop_columns(&mut df, &["b".to_string(), "nope".to_string()]).unwrap();
        assert_eq!(dropped, vec!["b".to_string()]);
        assert_eq!(column_names(&df), vec!["a".to_string(), "c".to_string()]);
        assert!(!has_column(&df, "b"));
    }

    #[test]
    fn rename_all_keeps_data_in_place() {
        let df = rename_all(sample(), &["x".into(), "y".into(), "z".into()]).unwrap();
        assert_eq!(column_names(&df), vec!["x", "y", "z"]);
        assert_eq!(text_values(&df, "y").unwrap()[1].as_deref(), Some("y"));
        assert!(rename_all(df, &["only".into()]).is_err());
    }

    #[test]
    fn text_values_casts_numbers() {
        let mut df = sample();
        df.with_column(number_column("n", vec![Some(1.5), None, Some(3.0)]))
            .unwrap();
        let values = text_values(&df, "n").unwrap();
        assert_eq!(values[0].as_deref(), Some("1.5"));
        assert_eq!(values[1], None);
    }
}
