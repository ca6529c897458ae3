//! Path to vulnerability description index

use crate::normalize::normalize_action;
use std::collections::HashMap;
use surfacemap_core::EndpointsArtifact;

/// Insertion-ordered map from normalized path to description.
///
/// Attack surfaces are inserted first, in report order, then bare endpoints
/// with an empty description. The first entry for a path wins. Fuzzy
/// lookups walk the entries in this order.
#[derive(Debug, Clone, Default)]
pub struct DescriptionIndex {
    entries: Vec<(String, String)>,
    positions: HashMap<String, usize>,
}

impl DescriptionIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the index from an endpoints artifact
    pub fn from_endpoints(endpoints: &EndpointsArtifact) -> Self {
        let mut index = Self::new();

        for surface in &endpoints.attack_surfaces {
            if surface.url.is_empty() {
                continue;
            }
            index.insert(normalize_action(&surface.url), &surface.description);
        }
        for endpoint in &endpoints.endpoints {
            index.insert(normalize_action(endpoint), "");
        }

        index
    }

    /// Insert unless the path is already indexed; returns whether it was added
    pub fn insert(&mut self, path: String, description: &str) -> bool {
        if self.positions.contains_key(&path) {
            return false;
        }
        self.positions.insert(path.clone(), self.entries.len());
        self.entries.push((path, description.to_string()));
        true
    }

    /// Description indexed under exactly `path`, possibly empty
    pub fn exact(&self, path: &str) -> Option<&str> {
        self.positions
            .get(path)
            .map(|&i| self.entries[i].1.as_str())
    }

    /// First non-empty description whose path is a suffix of `path` or has
    /// `path` as a suffix
    pub fn fuzzy(&self, path: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(key, description)| {
                !description.is_empty() && (key.ends_with(path) || path.ends_with(key.as_str()))
            })
            .map(|(_, description)| description.as_str())
    }

    /// Exact match if it carries a description, otherwise the fuzzy match
    pub fn lookup(&self, path: &str) -> Option<&str> {
        match self.exact(path) {
            Some(description) if !description.is_empty() => Some(description),
            _ => self.fuzzy(path),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries in insertion order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}
