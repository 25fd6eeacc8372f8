// =====================================================
// COLUMN MAPPER
// Header -> destination column proposals and mapping templates
// =====================================================

use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

pub const FUZZY_THRESHOLD: f64 = 0.4;
const SUBSTRING_BONUS: f64 = 0.4;

/// Marker some clients send for an explicitly skipped header.
pub const SKIP: &str = "skip";

// --- Mapping ---

/// Ordered source header -> destination column mapping. An empty target or
/// `"skip"` leaves the header unmapped. Serialized as a JSON object in
/// header order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ColumnMapping {
    entries: Vec<(String, String)>,
}

impl ColumnMapping {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every header starts unmapped.
    pub fn unmapped(headers: &[String]) -> Self {
        let mut mapping = Self::new();
        for header in headers {
            mapping.set(header, "");
        }
        mapping
    }

    /// Replaces the target of an existing header or appends a new entry.
    pub fn set(&mut self, header: &str, target: &str) {
        match self.entries.iter_mut().find(|(h, _)| h == header) {
            Some(entry) => entry.1 = target.to_string(),
            None => self.entries.push((header.to_string(), target.to_string())),
        }
    }

    pub fn get(&self, header: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(h, _)| h == header)
            .map(|(_, target)| target.as_str())
    }

    pub fn remove(&mut self, header: &str) {
        self.entries.retain(|(h, _)| h != header);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(h, t)| (h.as_str(), t.as_str()))
    }

    /// Only the entries that name a destination column, in header order.
    pub fn finalized(&self) -> Vec<(String, String)> {
        self.entries
            .iter()
            .filter(|(_, target)| is_mapped(target))
            .cloned()
            .collect()
    }
}

fn is_mapped(target: &str) -> bool {
    let target = target.trim();
    !target.is_empty() && target != SKIP
}

impl Serialize for ColumnMapping {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (header, target) in &self.entries {
            map.serialize_entry(header, target)?;
        }
        map.end()
    }
}

struct ColumnMappingVisitor;

impl<'de> Visitor<'de> for ColumnMappingVisitor {
    type Value = ColumnMapping;

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("an object of header -> column names")
    }

    fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
        let mut mapping = ColumnMapping::new();
        while let Some((header, target)) = access.next_entry::<String, Option<String>>()? {
            mapping.set(&header, target.as_deref().unwrap_or(""));
        }
        Ok(mapping)
    }
}

impl<'de> Deserialize<'de> for ColumnMapping {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_map(ColumnMappingVisitor)
    }
}

// --- Matching ---

/// Unit-cost Levenshtein distance over characters, ignoring case.
pub fn levenshtein_distance(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.to_lowercase().chars().collect();
    let b: Vec<char> = b.to_lowercase().chars().collect();
    if a.is_empty() {
        return b.len();
    }
    if b.is_empty() {
        return a.len();
    }

    let mut previous: Vec<usize> = (0..=b.len()).collect();
    let mut current = vec![0; b.len() + 1];
    for (i, ca) in a.iter().enumerate() {
        current[0] = i + 1;
        for (j, cb) in b.iter().enumerate() {
            let substitution = previous[j] + usize::from(ca != cb);
            current[j + 1] = substitution.min(previous[j + 1] + 1).min(current[j] + 1);
        }
        std::mem::swap(&mut previous, &mut current);
    }
    previous[b.len()]
}

fn similarity(source: &str, target: &str) -> Option<f64> {
    let max_len = source.chars().count().max(target.chars().count());
    if max_len == 0 {
        return None;
    }
    let mut score = 1.0 - levenshtein_distance(source, target) as f64 / max_len as f64;

    let (lower_source, lower_target) = (source.to_lowercase(), target.to_lowercase());
    if lower_target.contains(&lower_source) || lower_source.contains(&lower_target) {
        score += SUBSTRING_BONUS;
    }
    Some(score)
}

/// Highest-scoring target at or above `threshold`; the first one wins ties.
pub fn find_best_match<'a>(source: &str, targets: &'a [String], threshold: f64) -> Option<&'a str> {
    let mut best: Option<(&'a str, f64)> = None;
    for target in targets {
        let Some(score) = similarity(source, target) else {
            continue;
        };
        if score >= threshold && best.map_or(true, |(_, best_score)| score > best_score) {
            best = Some((target.as_str(), score));
        }
    }
    best.map(|(target, _)| target)
}

/// Lowercase and keep only `[a-z0-9]`.
pub fn normalize_name(name: &str) -> String {
    name.to_lowercase()
        .chars()
        .filter(|c| c.is_ascii_lowercase() || c.is_ascii_digit())
        .collect()
}

/// Exact (case-insensitive), then normalized, then fuzzy.
pub fn propose_column<'a>(header: &str, columns: &'a [String]) -> Option<&'a str> {
    let lower = header.to_lowercase();
    if let Some(column) = columns.iter().find(|c| c.to_lowercase() == lower) {
        return Some(column);
    }

    let normalized = normalize_name(header);
    if !normalized.is_empty() {
        if let Some(column) = columns.iter().find(|c| normalize_name(c) == normalized) {
            return Some(column);
        }
    }

    find_best_match(header, columns, FUZZY_THRESHOLD)
}

pub fn auto_map(headers: &[String], columns: &[String]) -> ColumnMapping {
    auto_map_onto(ColumnMapping::unmapped(headers), columns)
}

/// Fills every header that gains a proposal; others keep their current target.
pub fn auto_map_onto(mut mapping: ColumnMapping, columns: &[String]) -> ColumnMapping {
    let headers: Vec<String> = mapping.iter().map(|(h, _)| h.to_string()).collect();
    for header in headers {
        if let Some(column) = propose_column(&header, columns) {
            mapping.set(&header, column);
        }
    }
    mapping
}

#[cfg(test)]
mod tests;
