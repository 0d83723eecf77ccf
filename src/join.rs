//! Left-joins a primary dataset against secondary datasets on canonical key.

use std::collections::{BTreeMap, HashMap};

use tracing::{debug, warn};

use crate::error::JoinAmbiguityError;
use crate::normalize::{CanonicalKey, KeyNormalizer};
use crate::records::{Metric, StateRecord};

/// A record paired with its resolved key. `key == None` never joins.
#[derive(Debug, Clone, PartialEq)]
pub struct KeyedRecord {
    pub key: Option<CanonicalKey>,
    pub record: StateRecord,
}

/// A named dataset whose records have been keyed.
#[derive(Debug, Clone, PartialEq)]
pub struct KeyedDataset {
    pub name: String,
    pub records: Vec<KeyedRecord>,
}

impl KeyedDataset {
    pub fn new(name: &str, records: Vec<StateRecord>, normalizer: &KeyNormalizer<'_>) -> Self {
        let records: Vec<KeyedRecord> = records
            .into_iter()
            .map(|record| KeyedRecord {
                key: normalizer.resolve_record(&record),
                record,
            })
            .collect();

        let unresolved = records.iter().filter(|r| r.key.is_none()).count();
        if unresolved > 0 {
            debug!(dataset = name, unresolved, "Records without a canonical key");
        }

        Self {
            name: name.to_string(),
            records,
        }
    }

    /// Indexes records by key, rejecting duplicates.
    fn index(&self) -> Result<HashMap<&CanonicalKey, &StateRecord>, JoinAmbiguityError> {
        let mut index = HashMap::new();
        for keyed in &self.records {
            let Some(key) = &keyed.key else {
                continue;
            };
            if index.insert(key, &keyed.record).is_some() {
                return Err(JoinAmbiguityError {
                    dataset: self.name.clone(),
                    key: key.to_string(),
                });
            }
        }
        Ok(index)
    }
}

/// A primary record enriched with the matching record of each secondary.
#[derive(Debug, Clone, PartialEq)]
pub struct JoinedRecord {
    pub key: Option<CanonicalKey>,
    pub primary: StateRecord,
    /// Secondary dataset name → matching record, in join order.
    pub enrichments: Vec<(String, StateRecord)>,
}

impl JoinedRecord {
    /// Reads `field` from the primary record, then from each enrichment in
    /// join order.
    pub fn text(&self, field: &str) -> Option<&str> {
        self.primary
            .text(field)
            .or_else(|| self.enrichments.iter().find_map(|(_, r)| r.text(field)))
    }

    pub fn numeric(&self, field: &str) -> Metric {
        self.text(field).map(Metric::parse).unwrap_or_default()
    }

    pub fn enrichment(&self, dataset: &str) -> Option<&StateRecord> {
        self.enrichments
            .iter()
            .find(|(name, _)| name == dataset)
            .map(|(_, r)| r)
    }

    /// Every field visible through [`JoinedRecord::text`], primary first.
    pub fn merged_fields(&self) -> BTreeMap<String, String> {
        let mut merged = BTreeMap::new();
        for (_, record) in self.enrichments.iter().rev() {
            merged.extend(record.fields.clone());
        }
        merged.extend(self.primary.fields.clone());
        merged
    }
}

/// Result of a join: the joined records plus one error per secondary
/// dataset that was skipped because of duplicate keys.
#[derive(Debug, Clone, PartialEq)]
pub struct JoinOutcome {
    pub records: Vec<JoinedRecord>,
    pub rejected: Vec<JoinAmbiguityError>,
}

/// Left-joins `primary` against every dataset in `secondaries`.
///
/// Output order and cardinality follow `primary`. Primary records without a
/// key are kept with no enrichment. A secondary with a duplicated key is not
/// joined at all; the other secondaries still are.
pub fn left_join(primary: KeyedDataset, secondaries: &[KeyedDataset]) -> JoinOutcome {
    let mut rejected = Vec::new();
    let mut indexes = Vec::with_capacity(secondaries.len());

    for secondary in secondaries {
        match secondary.index() {
            Ok(index) => indexes.push((secondary.name.as_str(), index)),
            Err(e) => {
                warn!(dataset = %e.dataset, key = %e.key, "Join rejected: duplicate key");
                rejected.push(e);
            }
        }
    }

    let records: Vec<JoinedRecord> = primary
        .records
        .into_iter()
        .map(|keyed| {
            let enrichments = match &keyed.key {
                Some(key) => indexes
                    .iter()
                    .filter_map(|(name, index)| {
                        index.get(key).map(|r| (name.to_string(), (*r).clone()))
                    })
                    .collect(),
                None => Vec::new(),
            };
            JoinedRecord {
                key: keyed.key,
                primary: keyed.record,
                enrichments,
            }
        })
        .collect();

    debug!(
        primary = %primary.name,
        records = records.len(),
        joined = indexes.len(),
        rejected = rejected.len(),
        "Join complete"
    );

    JoinOutcome { records, rejected }
}
