//! Sinks that receive rendered dashboard payloads.
//!
//! Every sink tolerates targets it does not know: writing to one is a no-op.

use std::collections::HashSet;
use std::path::PathBuf;

use anyhow::{Context, Result};
use serde::Serialize;
use tracing::{debug, info};

use crate::present::{ChartPayload, KpiCard, TablePayload};

pub trait DashboardSink {
    fn status(&mut self, target: &str, text: &str) -> Result<()>;
    fn kpis(&mut self, target: &str, cards: &[KpiCard]) -> Result<()>;
    fn table(&mut self, target: &str, table: &TablePayload) -> Result<()>;
    fn chart(&mut self, target: &str, chart: &ChartPayload) -> Result<()>;
}

/// Logs every payload as pretty-printed JSON.
#[derive(Debug, Default)]
pub struct LogSink;

impl LogSink {
    fn log(kind: &str, target: &str, payload: &impl Serialize) -> Result<()> {
        info!(kind, panel = target, "{}", serde_json::to_string_pretty(payload)?);
        Ok(())
    }
}

impl DashboardSink for LogSink {
    fn status(&mut self, target: &str, text: &str) -> Result<()> {
        Self::log("status", target, &text)
    }

    fn kpis(&mut self, target: &str, cards: &[KpiCard]) -> Result<()> {
        Self::log("kpis", target, &cards)
    }

    fn table(&mut self, target: &str, table: &TablePayload) -> Result<()> {
        Self::log("table", target, table)
    }

    fn chart(&mut self, target: &str, chart: &ChartPayload) -> Result<()> {
        Self::log("chart", target, &chart.bound_spec())
    }
}

/// Writes each payload to `<dir>/<target>.json` for a fixed set of targets.
#[derive(Debug)]
pub struct JsonDirSink {
    dir: PathBuf,
    targets: HashSet<String>,
}

impl JsonDirSink {
    /// Creates `dir` if needed.
    pub fn new<I, S>(dir: impl Into<PathBuf>, targets: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create output directory {}", dir.display()))?;
        Ok(Self {
            dir,
            targets: targets.into_iter().map(Into::into).collect(),
        })
    }

    pub fn path_for(&self, target: &str) -> PathBuf {
        self.dir.join(format!("{target}.json"))
    }

    fn write(&self, target: &str, payload: &impl Serialize) -> Result<()> {
        if !self.targets.contains(target) {
            debug!(panel = target, "No such target, skipping");
            return Ok(());
        }

        let path = self.path_for(target);
        let body = serde_json::to_vec_pretty(payload)?;
        std::fs::write(&path, body)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        debug!(panel = target, path = %path.display(), "Payload written");
        Ok(())
    }
}

impl DashboardSink for JsonDirSink {
    fn status(&mut self, target: &str, text: &str) -> Result<()> {
        self.write(target, &serde_json::json!({ "text": text }))
    }

    fn kpis(&mut self, target: &str, cards: &[KpiCard]) -> Result<()> {
        self.write(target, &cards)
    }

    fn table(&mut self, target: &str, table: &TablePayload) -> Result<()> {
        self.write(target, table)
    }

    fn chart(&mut self, target: &str, chart: &ChartPayload) -> Result<()> {
        self.write(target, &chart.bound_spec())
    }
}
