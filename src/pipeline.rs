//! One render pass: load every source, key and join, aggregate, then hand the
//! payloads to a sink.
//!
//! Sources load concurrently and independently. A source that fails is
//! logged, recorded in the [`LoadReport`] and replaced by an empty dataset, so
//! the panels that depend on it render a placeholder instead of failing the
//! whole pass.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use crate::config::{ChartSource, DashboardConfig, SourceConfig};
use crate::error::{ConfigError, JoinAmbiguityError, LoadError};
use crate::fetch::{HttpClient, fetch_source};
use crate::join::{JoinedRecord, KeyedDataset, left_join};
use crate::normalize::{AliasTable, CanonicalKey, GeoIndex, KeyNormalizer};
use crate::output::DashboardSink;
use crate::parser::{
    FeatureCollection, Metadata, parse_csv, parse_feature_collection, parse_json, parse_metadata,
};
use crate::present::{
    ChartPayload, KpiCard, TablePayload, joined_chart_records, kpi_cards, ranked_table,
    raw_chart_records,
};
use crate::records::{StateRecord, to_records};

/// Load outcome of one source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SourceStatus {
    pub name: String,
    pub location: String,
    /// Record or feature count on success.
    pub records: Option<usize>,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LoadReport {
    pub sources: Vec<SourceStatus>,
}

impl LoadReport {
    fn record<T>(
        &mut self,
        name: &str,
        location: &str,
        result: &Result<T, LoadError>,
        count: impl Fn(&T) -> usize,
    ) {
        let status = match result {
            Ok(value) => {
                let records = count(value);
                info!(source = name, records, "Source loaded");
                SourceStatus {
                    name: name.to_string(),
                    location: location.to_string(),
                    records: Some(records),
                    error: None,
                }
            }
            Err(e) => {
                error!(source = name, location, error = %e, "Source failed to load");
                SourceStatus {
                    name: name.to_string(),
                    location: location.to_string(),
                    records: None,
                    error: Some(e.to_string()),
                }
            }
        };
        self.sources.push(status);
    }

    pub fn failed(&self) -> impl Iterator<Item = &SourceStatus> {
        self.sources.iter().filter(|s| s.error.is_some())
    }

    pub fn is_failed(&self, name: &str) -> bool {
        self.failed().any(|s| s.name == name)
    }
}

/// Everything one load cycle produced. Failed sources are `None`.
#[derive(Debug, Clone, Default)]
pub struct LoadedSources {
    pub meta: Option<Metadata>,
    pub geometry: Option<FeatureCollection>,
    pub prf: Option<Vec<StateRecord>>,
    pub prf_table: Option<Vec<StateRecord>>,
    pub history: Option<Vec<StateRecord>>,
    pub loss: Option<Vec<StateRecord>>,
    pub air_quality: Option<Vec<StateRecord>>,
    /// One entry per configured chart; `None` when its specification failed.
    pub chart_specs: Vec<Option<Value>>,
    pub report: LoadReport,
}

/// Ticket identifying one render pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PassTicket(u64);

/// Generation counter used to drop results of superseded passes.
#[derive(Debug, Clone, Default)]
pub struct Generations(Arc<AtomicU64>);

impl Generations {
    /// Starts a new pass, superseding every earlier ticket.
    pub fn begin(&self) -> PassTicket {
        PassTicket(self.0.fetch_add(1, Ordering::SeqCst) + 1)
    }

    pub fn is_current(&self, ticket: PassTicket) -> bool {
        self.0.load(Ordering::SeqCst) == ticket.0
    }
}

/// Payloads of one render pass.
#[derive(Debug, Clone)]
pub struct Frame {
    pub status: Option<String>,
    pub kpis: Vec<KpiCard>,
    pub table: TablePayload,
    /// `(target, payload)` per chart whose specification loaded.
    pub charts: Vec<(String, ChartPayload)>,
    pub records: Vec<JoinedRecord>,
    pub rejected_joins: Vec<JoinAmbiguityError>,
    pub report: LoadReport,
    pub rendered_at: DateTime<Utc>,
}

impl Frame {
    pub fn chart(&self, target: &str) -> Option<&ChartPayload> {
        self.charts.iter().find(|(t, _)| t == target).map(|(_, c)| c)
    }

    /// The joined record for `key`, as read by selection subscribers.
    pub fn record(&self, key: &CanonicalKey) -> Option<&JoinedRecord> {
        self.records.iter().find(|r| r.key.as_ref() == Some(key))
    }
}

#[derive(Debug)]
pub enum PassOutcome {
    Rendered(Box<Frame>),
    /// A newer pass started while this one was loading.
    Superseded,
}

pub struct Dashboard<C> {
    config: DashboardConfig,
    aliases: AliasTable,
    client: Arc<C>,
    generations: Generations,
}

impl<C: HttpClient + 'static> Dashboard<C> {
    /// # Errors
    ///
    /// Fails if the configured alias table maps one alias to two names.
    pub fn new(config: DashboardConfig, client: C) -> Result<Self, ConfigError> {
        let aliases = config.alias_table()?;
        Ok(Self {
            config,
            aliases,
            client: Arc::new(client),
            generations: Generations::default(),
        })
    }

    pub fn config(&self) -> &DashboardConfig {
        &self.config
    }

    pub fn generations(&self) -> &Generations {
        &self.generations
    }

    async fn load_records(&self, source: &SourceConfig) -> Result<Vec<StateRecord>, LoadError> {
        let bytes = fetch_source(self.client.as_ref(), &source.location).await?;
        Ok(to_records(parse_csv(&bytes)?, &source.schema))
    }

    async fn load_geometry(&self) -> Result<FeatureCollection, LoadError> {
        let bytes = fetch_source(self.client.as_ref(), &self.config.sources.geometry).await?;
        parse_feature_collection(&bytes)
    }

    async fn load_meta(&self) -> Result<Metadata, LoadError> {
        let bytes = fetch_source(self.client.as_ref(), &self.config.sources.meta).await?;
        parse_metadata(&bytes)
    }

    /// Fetches every chart spec concurrently, in config order. A spec that
    /// fails to load is `None`.
    async fn load_chart_specs(&self) -> Vec<Option<Value>> {
        let charts = &self.config.charts.0;
        let mut tasks = JoinSet::new();
        for (i, chart) in charts.iter().enumerate() {
            let client = Arc::clone(&self.client);
            let location = chart.spec.clone();
            tasks.spawn(async move {
                let spec = match fetch_source(client.as_ref(), &location).await {
                    Ok(bytes) => parse_json(&bytes),
                    Err(e) => Err(e),
                };
                (i, spec)
            });
        }

        let mut specs = vec![None; charts.len()];
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((i, Ok(spec))) => specs[i] = Some(spec),
                Ok((i, Err(e))) => {
                    let chart = &charts[i];
                    warn!(chart = %chart.target, spec = %chart.spec, error = %e, "Chart specification failed to load");
                }
                Err(e) => error!(error = %e, "Chart specification task failed"),
            }
        }
        specs
    }

    /// Loads every source concurrently. Never fails: failures are recorded in
    /// the returned report.
    #[tracing::instrument(skip(self))]
    pub async fn load(&self) -> LoadedSources {
        let s = &self.config.sources;
        let (meta, geometry, prf, prf_table, history, loss, air_quality, chart_specs) = tokio::join!(
            self.load_meta(),
            self.load_geometry(),
            self.load_records(&s.prf),
            self.load_records(&s.prf_table),
            self.load_records(&s.history),
            self.load_records(&s.loss),
            self.load_records(&s.air_quality),
            self.load_chart_specs(),
        );

        let mut report = LoadReport::default();
        report.record("meta", &s.meta, &meta, |_| 1);
        report.record("geometry", &s.geometry, &geometry, |g| g.features.len());
        report.record("prf", &s.prf.location, &prf, Vec::len);
        report.record("prf_table", &s.prf_table.location, &prf_table, Vec::len);
        report.record("history", &s.history.location, &history, Vec::len);
        report.record("loss", &s.loss.location, &loss, Vec::len);
        report.record("air_quality", &s.air_quality.location, &air_quality, Vec::len);

        LoadedSources {
            meta: meta.ok(),
            geometry: geometry.ok(),
            prf: prf.ok(),
            prf_table: prf_table.ok(),
            history: history.ok(),
            loss: loss.ok(),
            air_quality: air_quality.ok(),
            chart_specs,
            report,
        }
    }

    /// Keys, joins and aggregates loaded sources into payloads.
    pub fn build(&self, loaded: &LoadedSources) -> Frame {
        let config = &self.config;

        let index = loaded
            .geometry
            .as_ref()
            .map(|g| {
                GeoIndex::from_features(
                    g,
                    &config.geometry.name_properties,
                    &config.geometry.code_properties,
                )
            })
            .unwrap_or_default();

        let prf = loaded.prf.clone().unwrap_or_default();
        let prf_table = loaded.prf_table.clone().unwrap_or_default();

        let known_names = index
            .names()
            .chain(prf.iter().map(|r| r.state_name.as_str()))
            .chain(prf_table.iter().map(|r| r.state_name.as_str()));
        for name in self.aliases.unknown_canonicals(known_names) {
            warn!(canonical = %name, "Alias target not present in any authoritative dataset");
        }

        let normalizer = KeyNormalizer::new(&self.aliases, &index);
        let primary = KeyedDataset::new("prf", prf, &normalizer);
        let secondaries = [KeyedDataset::new("prf_table", prf_table, &normalizer)];
        let joined = left_join(primary, &secondaries);

        let kpis = kpi_cards(
            loaded.prf.as_ref().map(|_| joined.records.as_slice()),
            &config.sources.prf.schema.metric_field,
            &config.kpis,
        );
        let table = ranked_table(&joined.records, &config.table);

        let charts = config
            .charts
            .0
            .iter()
            .zip(&loaded.chart_specs)
            .filter_map(|(chart, spec)| {
                let spec = spec.clone()?;
                let records = match chart.source {
                    ChartSource::Prf => joined_chart_records(
                        &joined.records,
                        &config.key_field.0,
                        &chart.numeric_fields,
                    ),
                    ChartSource::History => raw(&loaded.history, &chart.numeric_fields),
                    ChartSource::Loss => raw(&loaded.loss, &chart.numeric_fields),
                    ChartSource::AirQuality => raw(&loaded.air_quality, &chart.numeric_fields),
                };
                debug!(chart = %chart.target, records = records.len(), "Chart bound");
                Some((
                    chart.target.clone(),
                    ChartPayload::new(spec).with_dataset(&chart.dataset, records),
                ))
            })
            .collect();

        Frame {
            status: loaded
                .meta
                .as_ref()
                .map(|m| format!("Last updated: {}", m.last_updated)),
            kpis,
            table,
            charts,
            records: joined.records,
            rejected_joins: joined.rejected,
            report: loaded.report.clone(),
            rendered_at: Utc::now(),
        }
    }

    /// Writes a frame to `sink`. A panel that fails to write is logged and
    /// does not stop the others.
    pub fn apply<S: DashboardSink>(&self, frame: &Frame, sink: &mut S) {
        let config = &self.config;

        if let Some(status) = &frame.status {
            if let Err(e) = sink.status(&config.status.target, status) {
                error!(panel = %config.status.target, error = %e, "Status write failed");
            }
        }
        if let Err(e) = sink.kpis(&config.kpis.target, &frame.kpis) {
            error!(panel = %config.kpis.target, error = %e, "KPI write failed");
        }
        if let Err(e) = sink.table(&config.table.target, &frame.table) {
            error!(panel = %config.table.target, error = %e, "Table write failed");
        }
        for (target, chart) in &frame.charts {
            if let Err(e) = sink.chart(target, chart) {
                error!(panel = %target, error = %e, "Chart write failed");
            }
        }
    }

    /// Builds and applies `loaded` unless `ticket` has been superseded.
    pub fn finish_pass<S: DashboardSink>(
        &self,
        ticket: PassTicket,
        loaded: &LoadedSources,
        sink: &mut S,
    ) -> PassOutcome {
        if !self.generations.is_current(ticket) {
            info!("Discarding results of a superseded pass");
            return PassOutcome::Superseded;
        }

        let frame = self.build(loaded);
        self.apply(&frame, sink);
        info!(
            records = frame.records.len(),
            charts = frame.charts.len(),
            failed_sources = frame.report.failed().count(),
            rejected_joins = frame.rejected_joins.len(),
            "Render pass complete"
        );
        PassOutcome::Rendered(Box::new(frame))
    }

    /// Runs a full pass: load, join, aggregate and write to `sink`.
    #[tracing::instrument(skip(self, sink))]
    pub async fn render_pass<S: DashboardSink>(&self, sink: &mut S) -> PassOutcome {
        let ticket = self.generations.begin();
        let loaded = self.load().await;
        self.finish_pass(ticket, &loaded, sink)
    }
}

fn raw(records: &Option<Vec<StateRecord>>, numeric_fields: &[String]) -> Vec<Value> {
    records
        .as_deref()
        .map(|r| raw_chart_records(r, numeric_fields))
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generations_supersede_earlier_tickets() {
        let generations = Generations::default();
        let first = generations.begin();
        assert!(generations.is_current(first));

        let second = generations.clone().begin();
        assert!(!generations.is_current(first));
        assert!(generations.is_current(second));
    }

    #[test]
    fn test_load_report_failures() {
        let mut report = LoadReport::default();
        let ok: Result<Vec<u8>, LoadError> = Ok(vec![1, 2]);
        let failed: Result<Vec<u8>, LoadError> = Err(LoadError::EmptyHeader);
        report.record("prf", "prf.csv", &ok, Vec::len);
        report.record("loss", "loss.csv", &failed, Vec::len);

        assert_eq!(report.sources[0].records, Some(2));
        assert!(!report.is_failed("prf"));
        assert!(report.is_failed("loss"));
        assert_eq!(report.failed().count(), 1);
    }
}
