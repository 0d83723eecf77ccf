//! Canonical join keys for state records.
//!
//! Sources disagree on naming ("W.P. Kuala Lumpur" vs "Kuala Lumpur") and
//! on code schemes (ISO 3166-2 vs admin P-codes). [`KeyNormalizer`] resolves
//! every record to one [`CanonicalKey`] or to `None`:
//!
//! 1. an explicit code on the record wins and is used verbatim;
//! 2. otherwise the name goes through the [`AliasTable`] and is looked up in
//!    the [`GeoIndex`] built from the geometry source;
//! 3. otherwise the record is unresolved.

use std::collections::HashMap;
use std::fmt;

use serde::Serialize;
use tracing::{debug, warn};

use crate::error::AliasError;
use crate::parser::FeatureCollection;
use crate::records::StateRecord;

/// Collapses internal whitespace and trims a state name.
pub fn normalize_name(name: &str) -> String {
    name.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Identifier used for joining across datasets.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct CanonicalKey(String);

impl CanonicalKey {
    pub fn new(code: impl Into<String>) -> Self {
        Self(code.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CanonicalKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Alternate state name → canonical state name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AliasTable {
    entries: HashMap<String, String>,
}

impl AliasTable {
    /// Builds the table, normalizing both sides.
    ///
    /// # Errors
    ///
    /// Returns [`AliasError`] if one alias is given two different canonical
    /// names. Repeating an identical pair is accepted.
    pub fn from_pairs<I, A, C>(pairs: I) -> Result<Self, AliasError>
    where
        I: IntoIterator<Item = (A, C)>,
        A: AsRef<str>,
        C: AsRef<str>,
    {
        let mut entries: HashMap<String, String> = HashMap::new();
        for (alias, canonical) in pairs {
            let alias = normalize_name(alias.as_ref());
            let canonical = normalize_name(canonical.as_ref());
            if let Some(existing) = entries.get(&alias) {
                if *existing != canonical {
                    return Err(AliasError {
                        alias,
                        first: existing.clone(),
                        second: canonical,
                    });
                }
                continue;
            }
            entries.insert(alias, canonical);
        }
        Ok(Self { entries })
    }

    /// Returns the canonical form of `name`: its alias target, or the
    /// normalized name itself when it is not an alias.
    pub fn resolve(&self, name: &str) -> String {
        let normalized = normalize_name(name);
        match self.entries.get(&normalized) {
            Some(canonical) => canonical.clone(),
            None => normalized,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Canonical names that do not appear among `known_names`, sorted.
    pub fn unknown_canonicals<'a, I>(&self, known_names: I) -> Vec<String>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let known: std::collections::HashSet<String> =
            known_names.into_iter().map(normalize_name).collect();
        let mut missing: Vec<String> = self
            .entries
            .values()
            .filter(|c| !known.contains(c.as_str()))
            .cloned()
            .collect();
        missing.sort();
        missing.dedup();
        missing
    }
}

/// Canonical state name → region code, built once per load cycle from the
/// geometry source.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GeoIndex {
    by_name: HashMap<String, CanonicalKey>,
}

impl GeoIndex {
    /// Indexes every feature that has both a name and a code.
    ///
    /// `name_properties` and `code_properties` are tried in order; the first
    /// present value wins. When two features share a name the first one is
    /// kept and the conflict is logged.
    pub fn from_features(
        collection: &FeatureCollection,
        name_properties: &[String],
        code_properties: &[String],
    ) -> Self {
        let mut by_name = HashMap::new();
        let mut skipped = 0usize;

        for feature in &collection.features {
            let (Some(name), Some(code)) = (
                feature.first_property(name_properties),
                feature.first_property(code_properties),
            ) else {
                skipped += 1;
                continue;
            };

            let name = normalize_name(&name);
            if let Some(existing) = by_name.get(&name) {
                warn!(state = %name, kept = %existing, ignored = %code, "Duplicate feature name in geometry");
                continue;
            }
            by_name.insert(name, CanonicalKey::new(code));
        }

        debug!(indexed = by_name.len(), skipped, "Geometry index built");
        Self { by_name }
    }

    pub fn from_pairs<'a, I>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        Self {
            by_name: pairs
                .into_iter()
                .map(|(name, code)| (normalize_name(name), CanonicalKey::new(code)))
                .collect(),
        }
    }

    pub fn get(&self, name: &str) -> Option<&CanonicalKey> {
        self.by_name.get(&normalize_name(name))
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.by_name.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.by_name.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_name.is_empty()
    }
}

/// Resolves records to canonical keys.
#[derive(Debug, Clone, Copy)]
pub struct KeyNormalizer<'a> {
    aliases: &'a AliasTable,
    index: &'a GeoIndex,
}

impl<'a> KeyNormalizer<'a> {
    pub fn new(aliases: &'a AliasTable, index: &'a GeoIndex) -> Self {
        Self { aliases, index }
    }

    /// Resolves a state name and an optional explicit code.
    pub fn resolve(&self, state_name: &str, code: Option<&str>) -> Option<CanonicalKey> {
        if let Some(code) = code.map(str::trim).filter(|c| !c.is_empty()) {
            return Some(CanonicalKey::new(code));
        }

        let canonical = self.aliases.resolve(state_name);
        if canonical.is_empty() {
            return None;
        }
        self.index.get(&canonical).cloned()
    }

    pub fn resolve_record(&self, record: &StateRecord) -> Option<CanonicalKey> {
        self.resolve(&record.state_name, record.state_code.as_deref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_feature_collection;

    fn default_aliases() -> AliasTable {
        AliasTable::from_pairs([
            ("W.P. Kuala Lumpur", "Kuala Lumpur"),
            ("W.P. Labuan", "Labuan"),
            ("W.P. Putrajaya", "Putrajaya"),
            ("Pulau Pinang", "Penang"),
        ])
        .unwrap()
    }

    fn index() -> GeoIndex {
        GeoIndex::from_pairs([
            ("Kuala Lumpur", "MY-14"),
            ("Labuan", "MY-15"),
            ("Putrajaya", "MY-16"),
            ("Penang", "MY-07"),
            ("Selangor", "MY-10"),
        ])
    }

    #[test]
    fn test_alias_resolves_to_same_key_as_canonical() {
        let aliases = default_aliases();
        let index = index();
        let normalizer = KeyNormalizer::new(&aliases, &index);

        for (alias, canonical) in aliases.iter() {
            let via_alias = normalizer.resolve(alias, None);
            let direct = index.get(canonical).cloned();
            assert!(direct.is_some(), "{canonical} missing from index");
            assert_eq!(via_alias, direct, "alias {alias}");
        }
    }

    #[test]
    fn test_explicit_code_wins() {
        let aliases = default_aliases();
        let index = index();
        let normalizer = KeyNormalizer::new(&aliases, &index);

        assert_eq!(
            normalizer.resolve("Pulau Pinang", Some(" MY-99 ")),
            Some(CanonicalKey::new("MY-99"))
        );
    }

    #[test]
    fn test_blank_code_falls_back_to_name() {
        let aliases = default_aliases();
        let index = index();
        let normalizer = KeyNormalizer::new(&aliases, &index);

        assert_eq!(
            normalizer.resolve("Selangor", Some("   ")),
            Some(CanonicalKey::new("MY-10"))
        );
    }

    #[test]
    fn test_unresolved_name_is_none() {
        let aliases = default_aliases();
        let index = index();
        let normalizer = KeyNormalizer::new(&aliases, &index);

        assert_eq!(normalizer.resolve("Atlantis", None), None);
        assert_eq!(normalizer.resolve("", None), None);
        assert_eq!(normalizer.resolve("   ", Some("")), None);
    }

    #[test]
    fn test_name_whitespace_is_normalized() {
        let aliases = default_aliases();
        let index = index();
        let normalizer = KeyNormalizer::new(&aliases, &index);

        assert_eq!(
            normalizer.resolve("  W.P.   Kuala Lumpur ", None),
            Some(CanonicalKey::new("MY-14"))
        );
    }

    #[test]
    fn test_conflicting_alias_rejected() {
        let result = AliasTable::from_pairs([("Pulau Pinang", "Penang"), ("Pulau Pinang", "Perak")]);
        let err = result.unwrap_err();
        assert_eq!(err.alias, "Pulau Pinang");
        assert_eq!(err.first, "Penang");
        assert_eq!(err.second, "Perak");
    }

    #[test]
    fn test_repeated_identical_alias_accepted() {
        let table = AliasTable::from_pairs([("Pulau Pinang", "Penang"), ("Pulau Pinang", "Penang")])
            .unwrap();
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn test_unknown_canonicals() {
        let aliases = default_aliases();
        let missing = aliases.unknown_canonicals(["Penang", "Kuala Lumpur", "Selangor"]);
        assert_eq!(missing, vec!["Labuan".to_string(), "Putrajaya".to_string()]);
    }

    #[test]
    fn test_index_from_features_uses_fallbacks() {
        let payload = br#"{"features": [
            {"properties": {"name": "Penang", "iso": "MY-07"}},
            {"properties": {"shapeName": "Selangor", "admin-pcode": "MY10"}},
            {"properties": {"name": "Sabah"}},
            {"properties": {"name": "Penang", "code": "MY-99"}}
        ]}"#;
        let fc = parse_feature_collection(payload).unwrap();
        let names = vec!["name".to_string(), "shapeName".to_string()];
        let codes = vec!["code".to_string(), "iso".to_string(), "admin-pcode".to_string()];
        let index = GeoIndex::from_features(&fc, &names, &codes);

        assert_eq!(index.len(), 2);
        assert_eq!(index.get("Penang"), Some(&CanonicalKey::new("MY-07")));
        assert_eq!(index.get("Selangor"), Some(&CanonicalKey::new("MY10")));
        assert_eq!(index.get("Sabah"), None);
    }

    #[test]
    fn test_code_priority_order() {
        let payload = br#"{"features": [
            {"properties": {"name": "Johor", "admin-pcode": "MY01", "iso": "MY-01", "code": "JHR"}}
        ]}"#;
        let fc = parse_feature_collection(payload).unwrap();
        let names = vec!["name".to_string()];
        let codes = vec!["code".to_string(), "iso".to_string(), "admin-pcode".to_string()];
        let index = GeoIndex::from_features(&fc, &names, &codes);

        assert_eq!(index.get("Johor"), Some(&CanonicalKey::new("JHR")));
    }
}
