//! Builds the payloads the KPI, table and chart sinks consume.
//!
//! Nothing here renders: values are formatted to display text and data is
//! wired into the named slots a chart specification refers to.

use std::collections::BTreeMap;

use serde::Serialize;
use serde_json::{Map, Number, Value};

use crate::config::{CellFormat, ColumnConfig, KpiConfig, TableConfig};
use crate::join::JoinedRecord;
use crate::parser::Row;
use crate::records::{Metric, StateRecord};
use crate::stats::{format_num, format_pct, rank, sum};

/// Shown in place of a KPI value that could not be computed.
pub const MISSING: &str = "—";

const LON_FIELDS: &[&str] = &["lon", "label_lon", "centroid_lon", "lng", "longitude"];
const LAT_FIELDS: &[&str] = &["lat", "label_lat", "centroid_lat", "latitude"];

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct KpiCard {
    pub label: String,
    pub value: String,
    pub note: String,
}

impl KpiCard {
    pub fn new(label: &str, value: Option<String>, note: &str) -> Self {
        Self {
            label: label.to_string(),
            value: value.unwrap_or_else(|| MISSING.to_string()),
            note: note.to_string(),
        }
    }
}

/// Builds the KPI cards. `primary` is `None` when the primary source failed
/// to load, in which case every value is [`MISSING`].
pub fn kpi_cards(
    primary: Option<&[JoinedRecord]>,
    metric_field: &str,
    config: &KpiConfig,
) -> Vec<KpiCard> {
    let total = primary.map(|records| {
        let total = sum(records.iter().map(|r| r.numeric(metric_field)));
        format_num(total.round())
    });
    let count = primary.map(|records| format_num(records.len() as f64));

    vec![
        KpiCard::new(&config.total_label, total, &config.total_note),
        KpiCard::new(&config.count_label, count, &config.count_note),
    ]
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Column {
    pub key: String,
    pub label: String,
}

/// Display cells of one table row, keyed by column key.
pub type RankedRow = BTreeMap<String, String>;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TablePayload {
    pub rows: Vec<RankedRow>,
    pub columns: Vec<Column>,
}

fn cell(record: &JoinedRecord, column: &ColumnConfig) -> String {
    match column.format {
        CellFormat::Text => record.text(&column.key).unwrap_or_default().to_string(),
        CellFormat::Number => format_num(record.numeric(&column.key).or_zero()),
        CellFormat::Percent => format_pct(record.numeric(&column.key).or_zero()),
    }
}

/// Ranks `records` by the configured field and formats the top rows.
pub fn ranked_table(records: &[JoinedRecord], config: &TableConfig) -> TablePayload {
    let rows: Vec<RankedRow> = rank(records, config.top_n, |r| r.numeric(&config.rank_field))
        .into_iter()
        .map(|record| {
            config
                .columns
                .iter()
                .map(|c| (c.key.clone(), cell(record, c)))
                .collect()
        })
        .collect();

    TablePayload {
        rows,
        columns: config
            .columns
            .iter()
            .map(|c| Column {
                key: c.key.clone(),
                label: c.label.clone(),
            })
            .collect(),
    }
}

/// A chart specification plus the named datasets it references.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChartPayload {
    pub spec: Value,
    pub datasets: BTreeMap<String, Vec<Value>>,
}

impl ChartPayload {
    pub fn new(spec: Value) -> Self {
        Self {
            spec,
            datasets: BTreeMap::new(),
        }
    }

    pub fn with_dataset(mut self, name: &str, records: Vec<Value>) -> Self {
        self.datasets.insert(name.to_string(), records);
        self
    }

    /// The chart spec with its top-level `datasets` slot replaced by the
    /// bound datasets. Non-object specifications are returned unchanged.
    pub fn bound_spec(&self) -> Value {
        let mut spec = self.spec.clone();
        if let Value::Object(obj) = &mut spec {
            let datasets: Map<String, Value> = self
                .datasets
                .iter()
                .map(|(name, records)| (name.clone(), Value::Array(records.clone())))
                .collect();
            obj.insert("datasets".to_string(), Value::Object(datasets));
        }
        spec
    }
}

fn metric_value(metric: Metric) -> Value {
    metric
        .value()
        .and_then(Number::from_f64)
        .map(Value::Number)
        .unwrap_or(Value::Null)
}

fn first_numeric(fields: &Row, candidates: &[&str]) -> Metric {
    candidates
        .iter()
        .filter_map(|f| fields.get(*f))
        .map(|v| Metric::parse(v))
        .find(|m| m.is_defined())
        .unwrap_or_default()
}

fn record_object(fields: &Row, numeric_fields: &[String]) -> Map<String, Value> {
    let mut obj: Map<String, Value> = fields
        .iter()
        .map(|(k, v)| (k.clone(), Value::String(v.clone())))
        .collect();
    for field in numeric_fields {
        let metric = fields.get(field).map(|v| Metric::parse(v)).unwrap_or_default();
        obj.insert(field.clone(), metric_value(metric));
    }
    obj
}

/// Chart records for joined data: every visible field, the canonical key
/// under `key_field` (`null` when unresolved), numeric fields as numbers and
/// `lon`/`lat` taken from the first coordinate column present.
pub fn joined_chart_records(
    records: &[JoinedRecord],
    key_field: &str,
    numeric_fields: &[String],
) -> Vec<Value> {
    records
        .iter()
        .map(|record| {
            let fields = record.merged_fields();
            let mut obj = record_object(&fields, numeric_fields);
            obj.insert(
                key_field.to_string(),
                record
                    .key
                    .as_ref()
                    .map(|k| Value::String(k.to_string()))
                    .unwrap_or(Value::Null),
            );
            obj.insert("lon".to_string(), metric_value(first_numeric(&fields, LON_FIELDS)));
            obj.insert("lat".to_string(), metric_value(first_numeric(&fields, LAT_FIELDS)));
            Value::Object(obj)
        })
        .collect()
}

/// Chart records for an unjoined dataset.
pub fn raw_chart_records(records: &[StateRecord], numeric_fields: &[String]) -> Vec<Value> {
    records
        .iter()
        .map(|r| Value::Object(record_object(&r.fields, numeric_fields)))
        .collect()
}
