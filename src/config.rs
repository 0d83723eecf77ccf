//! Dashboard configuration.
//!
//! Stored as JSON on disk; every field has a default reproducing the
//! published dashboard, so a file only needs the keys it overrides:
//! ```json
//! {
//!   "table": { "top_n": 3 },
//!   "key_field": "ISO"
//! }
//! ```

use serde::{Deserialize, Serialize};

use crate::error::{AliasError, ConfigError};
use crate::normalize::AliasTable;
use crate::records::DatasetSchema;

const CDN: &str = "https://cdn.jsdelivr.net/gh/wantedWaffleInUni/dv2@main";

fn owned(names: &[&str]) -> Vec<String> {
    names.iter().map(|n| n.to_string()).collect()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DashboardConfig {
    pub sources: Sources,
    pub aliases: Vec<AliasEntry>,
    pub geometry: GeometryConfig,
    /// Field under which chart records carry their canonical key.
    pub key_field: KeyField,
    pub status: StatusConfig,
    pub kpis: KpiConfig,
    pub table: TableConfig,
    pub charts: Charts,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            sources: Sources::default(),
            aliases: default_aliases(),
            geometry: GeometryConfig::default(),
            key_field: KeyField::default(),
            status: StatusConfig::default(),
            kpis: KpiConfig::default(),
            table: TableConfig::default(),
            charts: Charts::default(),
        }
    }
}

impl DashboardConfig {
    /// Loads the config from a JSON file at `path`.
    pub fn load(path: &str) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_string(),
            source,
        })?;
        Self::from_json(&content).map_err(|source| ConfigError::Parse {
            path: path.to_string(),
            source,
        })
    }

    pub fn from_json(content: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(content)
    }

    pub fn alias_table(&self) -> Result<AliasTable, AliasError> {
        AliasTable::from_pairs(
            self.aliases
                .iter()
                .map(|a| (a.alias.as_str(), a.canonical.as_str())),
        )
    }

    /// Every configured source as `(name, location)`, in load order.
    pub fn source_list(&self) -> Vec<(&'static str, &str)> {
        let s = &self.sources;
        vec![
            ("meta", s.meta.as_str()),
            ("geometry", s.geometry.as_str()),
            ("prf", s.prf.location.as_str()),
            ("prf_table", s.prf_table.location.as_str()),
            ("history", s.history.location.as_str()),
            ("loss", s.loss.location.as_str()),
            ("air_quality", s.air_quality.location.as_str()),
        ]
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Sources {
    pub meta: String,
    pub geometry: String,
    pub prf: SourceConfig,
    pub prf_table: SourceConfig,
    pub history: SourceConfig,
    pub loss: SourceConfig,
    pub air_quality: SourceConfig,
}

impl Default for Sources {
    fn default() -> Self {
        Self {
            meta: format!("{CDN}/config/meta.json"),
            geometry: format!("{CDN}/public/data/my_states.geojson"),
            prf: SourceConfig::new(
                &format!("{CDN}/public/data/prf_state_latest.csv"),
                DatasetSchema::new("state", "prf_ha").with_code("state_code"),
            ),
            prf_table: SourceConfig::new(
                &format!("{CDN}/public/data/prf_state_table.csv"),
                DatasetSchema::new("state", "prf_ha").with_code("state_code"),
            ),
            history: SourceConfig::new(
                &format!("{CDN}/public/data/prf_state_history.csv"),
                DatasetSchema::new("state", "prf_ha").with_period("year"),
            ),
            loss: SourceConfig::new(
                &format!("{CDN}/public/data/gfw_loss_state.csv"),
                DatasetSchema::new("state", "loss_ha").with_period("year"),
            ),
            air_quality: SourceConfig::new(
                &format!("{CDN}/public/data/air_quality_monthly.csv"),
                DatasetSchema::new("state", "value").with_period("month"),
            ),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    pub location: String,
    pub schema: DatasetSchema,
}

impl SourceConfig {
    pub fn new(location: &str, schema: DatasetSchema) -> Self {
        Self {
            location: location.to_string(),
            schema,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AliasEntry {
    pub alias: String,
    pub canonical: String,
}

/// The federal-territory long forms and the Malay name of Penang.
pub fn default_aliases() -> Vec<AliasEntry> {
    [
        ("W.P. Kuala Lumpur", "Kuala Lumpur"),
        ("W.P. Labuan", "Labuan"),
        ("W.P. Putrajaya", "Putrajaya"),
        ("Pulau Pinang", "Penang"),
    ]
    .into_iter()
    .map(|(alias, canonical)| AliasEntry {
        alias: alias.to_string(),
        canonical: canonical.to_string(),
    })
    .collect()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeometryConfig {
    /// Feature properties tried in order for the state name.
    pub name_properties: Vec<String>,
    /// Feature properties tried in order for the region code.
    pub code_properties: Vec<String>,
}

impl Default for GeometryConfig {
    fn default() -> Self {
        Self {
            name_properties: owned(&["name", "shapeName", "state_name", "NAME_1"]),
            code_properties: owned(&[
                "code",
                "iso",
                "admin-pcode",
                "shapeISO",
                "ISO_A1",
                "ADM1_PCODE",
            ]),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct KeyField(pub String);

impl Default for KeyField {
    fn default() -> Self {
        Self("shapeISO".to_string())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StatusConfig {
    pub target: String,
}

impl Default for StatusConfig {
    fn default() -> Self {
        Self {
            target: "last-updated".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct KpiConfig {
    pub target: String,
    pub total_label: String,
    pub total_note: String,
    pub count_label: String,
    pub count_note: String,
}

impl Default for KpiConfig {
    fn default() -> Self {
        Self {
            target: "kpis".to_string(),
            total_label: "Total PRF (ha)".to_string(),
            total_note: "Sum over all states".to_string(),
            count_label: "States".to_string(),
            count_note: String::new(),
        }
    }
}

/// How a table cell renders its field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CellFormat {
    Text,
    Number,
    Percent,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnConfig {
    pub key: String,
    pub label: String,
    pub format: CellFormat,
}

impl ColumnConfig {
    pub fn new(key: &str, label: &str, format: CellFormat) -> Self {
        Self {
            key: key.to_string(),
            label: label.to_string(),
            format,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TableConfig {
    pub target: String,
    pub rank_field: String,
    pub top_n: usize,
    pub columns: Vec<ColumnConfig>,
}

impl Default for TableConfig {
    fn default() -> Self {
        Self {
            target: "state-rank".to_string(),
            rank_field: "prf_ha".to_string(),
            top_n: 5,
            columns: vec![
                ColumnConfig::new("state", "State", CellFormat::Text),
                ColumnConfig::new("prf_ha", "PRF (ha)", CellFormat::Number),
                ColumnConfig::new("prf_pct", "PRF % of land", CellFormat::Percent),
            ],
        }
    }
}

/// Which loaded dataset feeds a chart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChartSource {
    /// Primary PRF records joined and keyed for the map.
    Prf,
    History,
    Loss,
    AirQuality,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChartConfig {
    pub target: String,
    /// Location of the declarative chart specification.
    pub spec: String,
    /// Name the chart spec uses to reference its data.
    pub dataset: String,
    pub source: ChartSource,
    /// Fields converted to numbers in the bound records.
    #[serde(default)]
    pub numeric_fields: Vec<String>,
}

impl ChartConfig {
    pub fn new(target: &str, spec: &str, dataset: &str, source: ChartSource) -> Self {
        Self {
            target: target.to_string(),
            spec: spec.to_string(),
            dataset: dataset.to_string(),
            source,
            numeric_fields: Vec::new(),
        }
    }

    pub fn with_numeric(mut self, fields: &[&str]) -> Self {
        self.numeric_fields = owned(fields);
        self
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Charts(pub Vec<ChartConfig>);

impl Default for Charts {
    fn default() -> Self {
        Self(vec![
            ChartConfig::new(
                "map-prf",
                "src/specs/map_prf_overview.vl.json",
                "prf",
                ChartSource::Prf,
            )
            .with_numeric(&["prf_ha", "prf_pct"]),
            ChartConfig::new(
                "line-prf-history",
                &format!("{CDN}/src/specs/lines_prf_history.vl.json"),
                "history",
                ChartSource::History,
            )
            .with_numeric(&["prf_ha"]),
            ChartConfig::new(
                "bars-loss",
                &format!("{CDN}/src/specs/bars_loss_by_year.vl.json"),
                "loss",
                ChartSource::Loss,
            )
            .with_numeric(&["loss_ha"]),
            ChartConfig::new(
                "smallmult-air",
                &format!("{CDN}/src/specs/smallmult_air_quality.vl.json"),
                "aq",
                ChartSource::AirQuality,
            )
            .with_numeric(&["value"]),
        ])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = DashboardConfig::default();
        assert_eq!(config.aliases.len(), 4);
        assert_eq!(config.table.top_n, 5);
        assert_eq!(config.charts.0.len(), 4);
        assert_eq!(config.key_field.0, "shapeISO");
        assert_eq!(&config.geometry.code_properties[..3], ["code", "iso", "admin-pcode"]);
    }

    #[test]
    fn test_empty_json_uses_defaults_with_aliases() {
        let config = DashboardConfig::from_json("{}").unwrap();
        assert_eq!(config.aliases, default_aliases());
        assert_eq!(config.alias_table().unwrap().len(), 4);
        assert_eq!(config.source_list().len(), 7);
    }

    #[test]
    fn test_partial_override() {
        let config = DashboardConfig::from_json(
            r#"{
                "table": { "top_n": 3 },
                "aliases": [{ "alias": "Pulau Pinang", "canonical": "Penang" }],
                "sources": { "loss": { "location": "loss.csv", "schema": { "name_field": "state", "metric_field": "loss_ha" } } }
            }"#,
        )
        .unwrap();

        assert_eq!(config.table.top_n, 3);
        assert_eq!(config.table.rank_field, "prf_ha");
        assert_eq!(config.aliases.len(), 1);
        assert_eq!(config.sources.loss.location, "loss.csv");
        assert!(config.sources.prf.location.ends_with("prf_state_latest.csv"));
    }

    #[test]
    fn test_conflicting_aliases_rejected() {
        let config = DashboardConfig::from_json(
            r#"{ "aliases": [
                { "alias": "Pulau Pinang", "canonical": "Penang" },
                { "alias": "Pulau Pinang", "canonical": "Perak" }
            ] }"#,
        )
        .unwrap();
        assert!(config.alias_table().is_err());
    }

    #[test]
    fn test_load_missing_file() {
        let err = DashboardConfig::load("/nonexistent/prf_dashboard.json").unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }
}
