//! Payload parsers for CSV tables, GeoJSON feature collections and the
//! dashboard metadata document.
//!
//! No coercion happens here: CSV values stay trimmed strings. Numbers are
//! read later through [`crate::records::Metric`].

use std::collections::BTreeMap;

use csv::{ReaderBuilder, Trim};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::LoadError;

/// One CSV data row keyed by the header row.
pub type Row = BTreeMap<String, String>;

/// Parses a CSV payload into rows keyed by its header.
///
/// Blank lines, including lines holding only whitespace, are skipped. Every
/// other line must have exactly as many columns as the header.
///
/// # Errors
///
/// [`LoadError::EmptyHeader`] when the payload has no header names and
/// [`LoadError::ColumnMismatch`] when a row is wider or narrower than the
/// header.
pub fn parse_csv(bytes: &[u8]) -> Result<Vec<Row>, LoadError> {
    let mut rdr = ReaderBuilder::new()
        .has_headers(true)
        .trim(Trim::All)
        .flexible(true)
        .from_reader(bytes);

    let headers = rdr.headers()?.clone();
    if headers.iter().all(str::is_empty) {
        return Err(LoadError::EmptyHeader);
    }

    let mut rows = Vec::new();
    for result in rdr.records() {
        let record = result?;
        if record.iter().all(str::is_empty) {
            continue;
        }
        if record.len() != headers.len() {
            return Err(LoadError::ColumnMismatch {
                line: record.position().map(|p| p.line()).unwrap_or_default(),
                expected: headers.len(),
                found: record.len(),
            });
        }
        let row: Row = headers
            .iter()
            .zip(record.iter())
            .map(|(h, v)| (h.to_string(), v.to_string()))
            .collect();
        rows.push(row);
    }

    Ok(rows)
}

/// A GeoJSON-like feature collection. Geometry is carried but never read.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct FeatureCollection {
    #[serde(default)]
    pub features: Vec<GeoFeature>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct GeoFeature {
    #[serde(default)]
    pub properties: Option<Map<String, Value>>,
    #[serde(default)]
    pub geometry: Value,
}

impl GeoFeature {
    /// Returns the trimmed, non-empty text of property `key`.
    ///
    /// Numeric properties are rendered with their JSON text so numeric
    /// admin codes still resolve.
    pub fn property(&self, key: &str) -> Option<String> {
        let value = self.properties.as_ref()?.get(key)?;
        let text = match value {
            Value::String(s) => s.trim().to_string(),
            Value::Number(n) => n.to_string(),
            _ => return None,
        };
        (!text.is_empty()).then_some(text)
    }

    /// Returns the first present property among `keys`, in order.
    pub fn first_property(&self, keys: &[String]) -> Option<String> {
        keys.iter().find_map(|k| self.property(k))
    }
}

/// Parses a GeoJSON feature collection.
pub fn parse_feature_collection(bytes: &[u8]) -> Result<FeatureCollection, LoadError> {
    Ok(serde_json::from_slice(bytes)?)
}

/// Dashboard metadata document. Only `lastUpdated` is required.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Metadata {
    #[serde(rename = "lastUpdated")]
    pub last_updated: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

pub fn parse_metadata(bytes: &[u8]) -> Result<Metadata, LoadError> {
    Ok(serde_json::from_slice(bytes)?)
}

/// Parses any JSON document, used for chart specifications.
pub fn parse_json(bytes: &[u8]) -> Result<Value, LoadError> {
    Ok(serde_json::from_slice(bytes)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_csv_trims_values() {
        let rows = parse_csv(b"state , prf_ha\n Selangor ,  3000 \n").unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["state"], "Selangor");
        assert_eq!(rows[0]["prf_ha"], "3000");
    }

    #[test]
    fn test_parse_csv_skips_blank_lines() {
        let rows = parse_csv(b"state,prf_ha\n\nPerak,10\n\n\nJohor,20\n").unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[1]["state"], "Johor");
    }

    #[test]
    fn test_parse_csv_skips_whitespace_only_lines() {
        let rows = parse_csv(b"state,prf_ha\nPerak,10\n   \nJohor,20\n\t\nKedah,5\n").unwrap();
        let states: Vec<&str> = rows.iter().map(|r| r["state"].as_str()).collect();
        assert_eq!(states, ["Perak", "Johor", "Kedah"]);
    }

    #[test]
    fn test_parse_csv_handles_crlf() {
        let rows = parse_csv(b"state,prf_ha\r\nKedah,5\r\n").unwrap();
        assert_eq!(rows[0]["prf_ha"], "5");
    }

    #[test]
    fn test_parse_csv_keeps_values_as_text() {
        let rows = parse_csv(b"state,prf_ha\nPahang,n/a\n").unwrap();
        assert_eq!(rows[0]["prf_ha"], "n/a");
    }

    #[test]
    fn test_parse_csv_empty_payload() {
        assert!(matches!(parse_csv(b""), Err(LoadError::EmptyHeader)));
    }

    #[test]
    fn test_parse_csv_column_mismatch() {
        let result = parse_csv(b"state,prf_ha\nPerak,10,extra\n");
        match result {
            Err(LoadError::ColumnMismatch {
                line,
                expected,
                found,
            }) => {
                assert_eq!(line, 2);
                assert_eq!(expected, 2);
                assert_eq!(found, 3);
            }
            other => panic!("expected column mismatch, got {other:?}"),
        }
    }

    #[test]
    fn test_parse_csv_narrow_row_is_mismatch() {
        assert!(matches!(
            parse_csv(b"state,prf_ha,prf_pct\nPerak,10\n"),
            Err(LoadError::ColumnMismatch {
                expected: 3,
                found: 2,
                ..
            })
        ));
    }

    #[test]
    fn test_parse_csv_header_only() {
        let rows = parse_csv(b"state,prf_ha\n").unwrap();
        assert!(rows.is_empty());
    }

    #[test]
    fn test_parse_feature_collection_properties() {
        let payload = br#"{
            "type": "FeatureCollection",
            "features": [
                {"type": "Feature", "properties": {"name": "Penang", "iso": " MY-07 "}, "geometry": null},
                {"type": "Feature", "properties": null, "geometry": {"type": "Point", "coordinates": [0, 0]}}
            ]
        }"#;
        let fc = parse_feature_collection(payload).unwrap();
        assert_eq!(fc.features.len(), 2);
        assert_eq!(fc.features[0].property("iso").as_deref(), Some("MY-07"));
        assert_eq!(fc.features[0].property("code"), None);
        assert_eq!(fc.features[1].property("name"), None);
    }

    #[test]
    fn test_first_property_order() {
        let payload = br#"{"features": [{"properties": {"code": "", "admin-pcode": "MY10"}}]}"#;
        let fc = parse_feature_collection(payload).unwrap();
        let keys = vec!["code".to_string(), "iso".to_string(), "admin-pcode".to_string()];
        assert_eq!(fc.features[0].first_property(&keys).as_deref(), Some("MY10"));
    }

    #[test]
    fn test_parse_invalid_json() {
        assert!(matches!(
            parse_feature_collection(b"{not json"),
            Err(LoadError::Json(_))
        ));
    }

    #[test]
    fn test_parse_metadata() {
        let meta = parse_metadata(br#"{"lastUpdated": "2025-09-01", "source": "JPSM"}"#).unwrap();
        assert_eq!(meta.last_updated, "2025-09-01");
        assert_eq!(meta.extra["source"], "JPSM");
        assert!(parse_metadata(b"{}").is_err());
    }
}
