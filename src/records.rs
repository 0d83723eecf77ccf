//! Typed per-dataset records built from parsed CSV rows.
//!
//! [`Metric`] is the single place where text becomes a number. Anything
//! that does not parse as a finite number is "undefined": it counts as zero
//! in sums and percentage display, and is skipped by rankings.

use serde::{Deserialize, Serialize};

use crate::parser::Row;

/// A numeric field value after coercion.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Metric(Option<f64>);

impl Metric {
    pub const UNDEFINED: Metric = Metric(None);

    pub fn new(value: f64) -> Self {
        Self(value.is_finite().then_some(value))
    }

    /// Parses trimmed text. Empty, non-numeric, `NaN` and infinite values are
    /// undefined. Thousands separators are tolerated.
    pub fn parse(raw: &str) -> Self {
        let cleaned: String = raw.trim().chars().filter(|c| *c != ',').collect();
        match cleaned.parse::<f64>() {
            Ok(v) => Self::new(v),
            Err(_) => Self::UNDEFINED,
        }
    }

    pub fn value(self) -> Option<f64> {
        self.0
    }

    pub fn is_defined(self) -> bool {
        self.0.is_some()
    }

    pub fn or_zero(self) -> f64 {
        self.0.unwrap_or(0.0)
    }
}

/// Which columns of a source carry the state name, code, metric and period.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatasetSchema {
    pub name_field: String,
    #[serde(default)]
    pub code_field: Option<String>,
    pub metric_field: String,
    #[serde(default)]
    pub period_field: Option<String>,
}

impl DatasetSchema {
    pub fn new(name_field: &str, metric_field: &str) -> Self {
        Self {
            name_field: name_field.to_string(),
            code_field: None,
            metric_field: metric_field.to_string(),
            period_field: None,
        }
    }

    pub fn with_code(mut self, code_field: &str) -> Self {
        self.code_field = Some(code_field.to_string());
        self
    }

    pub fn with_period(mut self, period_field: &str) -> Self {
        self.period_field = Some(period_field.to_string());
        self
    }
}

/// One row of one dataset for one state.
#[derive(Debug, Clone, PartialEq)]
pub struct StateRecord {
    pub state_name: String,
    pub state_code: Option<String>,
    pub metric_value: Metric,
    pub period: Option<String>,
    /// Every trimmed field of the source row, including the ones above.
    pub fields: Row,
}

impl StateRecord {
    pub fn from_row(row: Row, schema: &DatasetSchema) -> Self {
        let text = |field: &str| row.get(field).map(|v| v.trim().to_string());
        let non_empty = |field: &Option<String>| {
            field
                .as_deref()
                .and_then(|f| text(f))
                .filter(|v| !v.is_empty())
        };

        Self {
            state_name: text(&schema.name_field).unwrap_or_default(),
            state_code: non_empty(&schema.code_field),
            metric_value: text(&schema.metric_field)
                .map(|v| Metric::parse(&v))
                .unwrap_or_default(),
            period: non_empty(&schema.period_field),
            fields: row,
        }
    }

    pub fn text(&self, field: &str) -> Option<&str> {
        self.fields.get(field).map(String::as_str)
    }

    pub fn numeric(&self, field: &str) -> Metric {
        self.text(field).map(Metric::parse).unwrap_or_default()
    }
}

/// Builds records for every row of a dataset.
pub fn to_records(rows: Vec<Row>, schema: &DatasetSchema) -> Vec<StateRecord> {
    rows.into_iter()
        .map(|row| StateRecord::from_row(row, schema))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(pairs: &[(&str, &str)]) -> Row {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_metric_parse() {
        assert_eq!(Metric::parse("3000").value(), Some(3000.0));
        assert_eq!(Metric::parse(" 12.5 ").value(), Some(12.5));
        assert_eq!(Metric::parse("1,234").value(), Some(1234.0));
        assert_eq!(Metric::parse("-4").value(), Some(-4.0));
    }

    #[test]
    fn test_metric_undefined_values() {
        for raw in ["", "n/a", "NaN", "inf", "-infinity", "12ha"] {
            let m = Metric::parse(raw);
            assert!(!m.is_defined(), "{raw} should be undefined");
            assert_eq!(m.or_zero(), 0.0);
        }
    }

    #[test]
    fn test_record_from_row() {
        let schema = DatasetSchema::new("state", "prf_ha")
            .with_code("state_code")
            .with_period("year");
        let record = StateRecord::from_row(
            row(&[
                ("state", "Perak"),
                ("state_code", " MY-08 "),
                ("prf_ha", "995000"),
                ("year", "2020"),
            ]),
            &schema,
        );

        assert_eq!(record.state_name, "Perak");
        assert_eq!(record.state_code.as_deref(), Some("MY-08"));
        assert_eq!(record.metric_value.value(), Some(995000.0));
        assert_eq!(record.period.as_deref(), Some("2020"));
        assert_eq!(record.text("year"), Some("2020"));
    }

    #[test]
    fn test_blank_code_is_absent() {
        let schema = DatasetSchema::new("state", "prf_ha").with_code("state_code");
        let record = StateRecord::from_row(
            row(&[("state", "Penang"), ("state_code", "  "), ("prf_ha", "")]),
            &schema,
        );

        assert_eq!(record.state_code, None);
        assert!(!record.metric_value.is_defined());
    }

    #[test]
    fn test_missing_columns() {
        let schema = DatasetSchema::new("state", "prf_ha").with_code("state_code");
        let record = StateRecord::from_row(row(&[("other", "x")]), &schema);

        assert_eq!(record.state_name, "");
        assert_eq!(record.state_code, None);
        assert_eq!(record.numeric("prf_pct"), Metric::UNDEFINED);
    }
}
