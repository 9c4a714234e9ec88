//! Column type inference
//!
//! A column's type is decided from its whole content, never cell by cell:
//! a column holding `1`, `2` and `x` is a text column of three strings.

use super::value::{DataType, Value};

/// Markers read as missing values
pub const NULL_MARKERS: &[&str] = &[
    "", "#N/A", "#N/A N/A", "#NA", "-NaN", "-nan", "<NA>", "N/A", "NA", "NULL", "NaN", "None",
    "n/a", "nan", "null",
];

/// Check whether a raw cell is a missing-value marker
pub fn is_null_marker(raw: &str) -> bool {
    NULL_MARKERS.contains(&raw)
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw {
        "true" | "True" | "TRUE" => Some(true),
        "false" | "False" | "FALSE" => Some(false),
        _ => None,
    }
}

/// Infer a typed column from raw text cells (`None` = missing)
pub fn infer_from_text(cells: Vec<Option<String>>) -> (DataType, Vec<Value>) {
    let cells: Vec<Option<String>> = cells
        .into_iter()
        .map(|cell| cell.filter(|raw| !is_null_marker(raw)))
        .collect();

    let present = || cells.iter().flatten().map(|raw| raw.trim());

    if present().next().is_none() {
        return (DataType::Null, vec![Value::Null; cells.len()]);
    }

    if present().all(|raw| raw.parse::<i64>().is_ok()) {
        let values = cells
            .iter()
            .map(|cell| match cell {
                Some(raw) => raw.trim().parse().map(Value::Integer).unwrap_or(Value::Null),
                None => Value::Null,
            })
            .collect();
        return (DataType::Integer, values);
    }

    if present().all(|raw| raw.parse::<f64>().is_ok()) {
        let values = cells
            .iter()
            .map(|cell| match cell {
                Some(raw) => raw.trim().parse().map(Value::Float).unwrap_or(Value::Null),
                None => Value::Null,
            })
            .collect();
        return (DataType::Float, values);
    }

    if present().all(|raw| parse_bool(raw).is_some()) {
        let values = cells
            .iter()
            .map(|cell| {
                cell.as_deref()
                    .and_then(|raw| parse_bool(raw.trim()))
                    .map(Value::Boolean)
                    .unwrap_or(Value::Null)
            })
            .collect();
        return (DataType::Boolean, values);
    }

    let values = cells
        .into_iter()
        .map(|cell| cell.map(Value::Text).unwrap_or(Value::Null))
        .collect();
    (DataType::Text, values)
}

/// Unify already-typed cells into one column type
///
/// Integers mixed with floats widen to float; any other mix falls back to text.
pub fn unify_values(values: Vec<Value>) -> (DataType, Vec<Value>) {
    let mut seen: Vec<DataType> = Vec::new();
    for data_type in values.iter().filter_map(Value::data_type) {
        if !seen.contains(&data_type) {
            seen.push(data_type);
        }
    }

    match seen.as_slice() {
        [] => (DataType::Null, values),
        [single] => (*single, values),
        [a, b]
            if matches!(
                (a, b),
                (DataType::Integer, DataType::Float) | (DataType::Float, DataType::Integer)
            ) =>
        {
            let values = values
                .into_iter()
                .map(|value| match value {
                    Value::Integer(n) => Value::Float(n as f64),
                    other => other,
                })
                .collect();
            (DataType::Float, values)
        }
        _ => {
            let values = values
                .into_iter()
                .map(|value| match value {
                    Value::Null => Value::Null,
                    Value::Text(s) => Value::Text(s),
                    other => Value::Text(other.to_string()),
                })
                .collect();
            (DataType::Text, values)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cells(raw: &[&str]) -> Vec<Option<String>> {
        raw.iter().map(|s| Some(s.to_string())).collect()
    }

    #[test]
    fn test_infer_integers() {
        let (data_type, values) = infer_from_text(cells(&["1", "2", "35"]));
        assert_eq!(data_type, DataType::Integer);
        assert_eq!(values[2], Value::Integer(35));
    }

    #[test]
    fn test_infer_integers_with_missing() {
        let (data_type, values) = infer_from_text(cells(&["1", "", "NA"]));
        assert_eq!(data_type, DataType::Integer);
        assert_eq!(values, vec![Value::Integer(1), Value::Null, Value::Null]);
    }

    #[test]
    fn test_infer_floats() {
        let (data_type, values) = infer_from_text(cells(&["85.5", "92"]));
        assert_eq!(data_type, DataType::Float);
        assert_eq!(values[1], Value::Float(92.0));
    }

    #[test]
    fn test_infer_booleans() {
        let (data_type, _) = infer_from_text(cells(&["True", "false", "TRUE"]));
        assert_eq!(data_type, DataType::Boolean);
    }

    #[test]
    fn test_mixed_column_is_text() {
        let (data_type, values) = infer_from_text(cells(&["1", "2", "x"]));
        assert_eq!(data_type, DataType::Text);
        assert_eq!(values[0], Value::Text("1".into()));
    }

    #[test]
    fn test_all_missing_is_null_column() {
        let (data_type, values) = infer_from_text(vec![None, Some("null".into())]);
        assert_eq!(data_type, DataType::Null);
        assert!(values.iter().all(Value::is_null));
    }

    #[test]
    fn test_unify_widens_integers() {
        let (data_type, values) = unify_values(vec![Value::Integer(1), Value::Float(1.5)]);
        assert_eq!(data_type, DataType::Float);
        assert_eq!(values[0], Value::Float(1.0));
    }

    #[test]
    fn test_unify_mixed_to_text() {
        let (data_type, values) =
            unify_values(vec![Value::Boolean(true), Value::Integer(2), Value::Null]);
        assert_eq!(data_type, DataType::Text);
        assert_eq!(values[0], Value::Text("true".into()));
        assert_eq!(values[2], Value::Null);
    }
}
