//! Subject records and the daily pool they are drawn from.

use serde::{Deserialize, Serialize};

/// One candidate as delivered by the pool source, before the daily blur.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SubjectRecord {
    pub display_name: String,
    pub source_image_ref: String,
    pub capital: String,
    pub region: String,
    pub population: u64,
}

impl SubjectRecord {
    /// Names the first required field that is blank, if any.
    pub fn missing_field(&self) -> Option<&'static str> {
        if self.display_name.trim().is_empty() {
            Some("displayName")
        } else if self.source_image_ref.trim().is_empty() {
            Some("sourceImageRef")
        } else {
            None
        }
    }
}

/// The subject of the day, with its obscured image materialized.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Subject {
    pub display_name: String,
    pub source_image_ref: String,
    pub obscured_image_ref: String,
    pub capital: String,
    pub region: String,
    pub population: u64,
}

impl Subject {
    pub fn from_record(record: SubjectRecord, obscured_image_ref: String) -> Self {
        Self {
            display_name: record.display_name,
            source_image_ref: record.source_image_ref,
            obscured_image_ref,
            capital: record.capital,
            region: record.region,
            population: record.population,
        }
    }

    pub fn is_obscured(&self) -> bool {
        self.obscured_image_ref != self.source_image_ref
    }
}

/// Ordered, non-empty candidate list. Selection indexes into it by position,
/// so the order must not change for the lifetime of the pool.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubjectPool {
    records: Vec<SubjectRecord>,
}

impl SubjectPool {
    /// Returns `None` for an empty list.
    pub fn new(records: Vec<SubjectRecord>) -> Option<Self> {
        if records.is_empty() {
            None
        } else {
            Some(Self { records })
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&SubjectRecord> {
        self.records.get(index)
    }

    /// Display names sorted for autocomplete.
    pub fn candidate_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .records
            .iter()
            .map(|record| record.display_name.clone())
            .collect();
        names.sort();
        names
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(name: &str, image: &str) -> SubjectRecord {
        SubjectRecord {
            display_name: name.into(),
            source_image_ref: image.into(),
            capital: "N/A".into(),
            region: "Unknown".into(),
            population: 1,
        }
    }

    #[test]
    fn empty_pool_is_rejected() {
        assert!(SubjectPool::new(Vec::new()).is_none());
    }

    #[test]
    fn candidate_names_are_sorted_without_reordering_pool() {
        let pool = SubjectPool::new(vec![
            record("Peru", "p.png"),
            record("Chile", "c.png"),
        ])
        .unwrap();

        assert_eq!(pool.candidate_names(), vec!["Chile", "Peru"]);
        assert_eq!(pool.get(0).unwrap().display_name, "Peru");
    }

    #[test]
    fn blank_fields_are_reported() {
        assert_eq!(record(" ", "x.png").missing_field(), Some("displayName"));
        assert_eq!(record("Peru", "").missing_field(), Some("sourceImageRef"));
        assert_eq!(record("Peru", "x.png").missing_field(), None);
    }
}
