use crate::LoadError;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

/// Directly served destinations per airport, as published (no durations).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RouteDirectory {
    routes: BTreeMap<String, BTreeSet<String>>,
}

impl RouteDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads the `{ "LHR": ["JFK", ...] }` JSON snapshot.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, LoadError> {
        let raw: BTreeMap<String, Vec<String>> = crate::read_json(path.as_ref())?;
        Ok(Self::from_map(raw))
    }

    pub fn from_json_str(json: &str) -> Result<Self, serde_json::Error> {
        let raw: BTreeMap<String, Vec<String>> = serde_json::from_str(json)?;
        Ok(Self::from_map(raw))
    }

    pub fn from_map(raw: BTreeMap<String, Vec<String>>) -> Self {
        let mut directory = Self::new();
        for (origin, dests) in raw {
            for dest in dests {
                directory.insert(&origin, &dest);
            }
        }
        directory
    }

    pub fn from_pairs<'a>(pairs: impl IntoIterator<Item = (&'a str, &'a str)>) -> Self {
        let mut directory = Self::new();
        for (from, to) in pairs {
            directory.insert(from, to);
        }
        directory
    }

    /// Self-loops are ignored.
    pub fn insert(&mut self, from: &str, to: &str) {
        if from == to {
            return;
        }
        self.routes
            .entry(from.to_string())
            .or_default()
            .insert(to.to_string());
    }

    pub fn serves(&self, from: &str, to: &str) -> bool {
        self.routes.get(from).is_some_and(|d| d.contains(to))
    }

    /// Directed pairs in (origin, destination) order.
    pub fn pairs(&self) -> impl Iterator<Item = (&str, &str)> {
        self.routes
            .iter()
            .flat_map(|(from, dests)| dests.iter().map(move |to| (from.as_str(), to.as_str())))
    }

    pub fn pair_count(&self) -> usize {
        self.routes.values().map(|d| d.len()).sum()
    }

    pub fn origin_count(&self) -> usize {
        self.routes.len()
    }
}

/// How two route sources agree. Used to sanity-check the authoritative
/// source against a (possibly stale) reference; the two are never merged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteOverlap {
    pub both: usize,
    pub primary_only: usize,
    pub reference_only: usize,
    /// Share of the reference pairs also present in the primary source.
    pub overlap_pct: f64,
    /// A few reference-only pairs, likely discontinued service.
    pub reference_only_sample: Vec<(String, String)>,
}

impl RouteOverlap {
    pub fn compare(primary: &RouteDirectory, reference: &RouteDirectory) -> Self {
        let primary_pairs: BTreeSet<(&str, &str)> = primary.pairs().collect();
        let reference_pairs: BTreeSet<(&str, &str)> = reference.pairs().collect();

        let both = primary_pairs.intersection(&reference_pairs).count();
        let primary_only = primary_pairs.len() - both;
        let reference_only: Vec<&(&str, &str)> =
            reference_pairs.difference(&primary_pairs).collect();

        let overlap_pct = if reference_pairs.is_empty() {
            0.0
        } else {
            both as f64 / reference_pairs.len() as f64 * 100.0
        };

        Self {
            both,
            primary_only,
            reference_only: reference_only.len(),
            overlap_pct,
            reference_only_sample: reference_only
                .iter()
                .take(5)
                .map(|(a, b)| (a.to_string(), b.to_string()))
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_and_dedupe() {
        let routes =
            RouteDirectory::from_json_str(r#"{"LHR": ["JFK", "CDG", "JFK", "LHR"], "JFK": ["LAX"]}"#)
                .unwrap();
        assert_eq!(routes.pair_count(), 3);
        assert!(routes.serves("LHR", "CDG"));
        assert!(!routes.serves("CDG", "LHR"));
        assert!(!routes.serves("LHR", "LHR"));
        let pairs: Vec<_> = routes.pairs().collect();
        assert_eq!(pairs[0], ("JFK", "LAX"));
    }

    #[test]
    fn test_overlap_counts() {
        let primary = RouteDirectory::from_pairs([("LHR", "JFK"), ("LHR", "CDG"), ("JFK", "LAX")]);
        let reference = RouteDirectory::from_pairs([("LHR", "JFK"), ("LHR", "TXL"), ("JFK", "LAX"), ("BRS", "JFK")]);

        let overlap = RouteOverlap::compare(&primary, &reference);
        assert_eq!(overlap.both, 2);
        assert_eq!(overlap.primary_only, 1);
        assert_eq!(overlap.reference_only, 2);
        assert!((overlap.overlap_pct - 50.0).abs() < 1e-9);
        assert_eq!(overlap.reference_only_sample.len(), 2);
        assert_eq!(overlap.reference_only_sample[0], ("BRS".to_string(), "JFK".to_string()));
    }

    #[test]
    fn test_compare_never_mutates_primary() {
        let primary = RouteDirectory::from_pairs([("LHR", "JFK")]);
        let reference = RouteDirectory::from_pairs([("LHR", "SYD")]);
        let _ = RouteOverlap::compare(&primary, &reference);
        assert!(!primary.serves("LHR", "SYD"));
        assert_eq!(primary.pair_count(), 1);
    }
}
