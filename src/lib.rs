//! Bilingual (English/Chinese) dictionary of Minecraft mod localization terms.
//!
//! The crate ranks dictionary rows stored in SQLite against a query term and
//! serves them over HTTP. The pieces are layered leaves-first:
//! [`forms`] widens English queries, [`plan`] turns a query into weighted
//! match tiers, [`store`] executes a plan, and [`merge`] / [`pagination`]
//! shape a result page for display.

pub mod cache;
pub mod forms;
pub mod merge;
pub mod pagination;
pub mod plan;
pub mod store;
#[cfg(feature = "web")]
pub mod web;

use serde::{Deserialize, Serialize};
use std::fmt;

pub use cache::{LruResponseCache, NoCache, ResponseCache};
pub use forms::generate_forms;
pub use merge::{MergedRow, merge_rows};
pub use pagination::PageWindow;
pub use plan::SearchPlan;
pub use store::{DictionaryStore, StoreError};

/// Number of ranked entries returned per page.
pub const PAGE_SIZE: u32 = 50;

/// Search direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchMode {
    /// English source term to Chinese translation.
    #[default]
    En2Zh,
    /// Chinese translation to English source term.
    Zh2En,
}

impl SearchMode {
    /// Parses a request parameter, falling back to [`SearchMode::En2Zh`] for
    /// anything that is not a recognised mode.
    pub fn from_param(value: Option<&str>) -> Self {
        match value.map(str::trim) {
            Some("zh2en") => SearchMode::Zh2En,
            _ => SearchMode::En2Zh,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SearchMode::En2Zh => "en2zh",
            SearchMode::Zh2En => "zh2en",
        }
    }

    /// Column of the `dict` relation the query is matched against.
    pub fn target_column(&self) -> &'static str {
        match self {
            SearchMode::En2Zh => "origin_name",
            SearchMode::Zh2En => "trans_name",
        }
    }
}

impl fmt::Display for SearchMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One logical dictionary record.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DictionaryEntry {
    pub trans_name: String,
    pub origin_name: String,
    pub modid: String,
    pub version: String,
    pub key: String,
    pub curseforge: Option<String>,
}

/// A logical entry annotated with how many storage rows collapsed into it
/// and how closely it matched the query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RankedEntry {
    #[serde(flatten)]
    pub entry: DictionaryEntry,
    pub frequency: u64,
    pub match_weight: u8,
}

/// One page of ranked results plus the number of matching logical entries
/// across all pages.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchPage {
    pub results: Vec<RankedEntry>,
    pub total: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_modes_fall_back_to_en2zh() {
        assert_eq!(SearchMode::from_param(None), SearchMode::En2Zh);
        assert_eq!(SearchMode::from_param(Some("fr2de")), SearchMode::En2Zh);
        assert_eq!(SearchMode::from_param(Some("zh2en")), SearchMode::Zh2En);
        assert_eq!(SearchMode::Zh2En.target_column(), "trans_name");
    }

    #[test]
    fn ranked_entry_serializes_flat() {
        let row = RankedEntry {
            entry: DictionaryEntry {
                trans_name: "铁".into(),
                origin_name: "Iron".into(),
                modid: "thermal".into(),
                version: "1.18".into(),
                key: "material.thermal.iron".into(),
                curseforge: None,
            },
            frequency: 2,
            match_weight: 3,
        };
        let value = serde_json::to_value(&row).unwrap();
        assert_eq!(value["origin_name"], "Iron");
        assert_eq!(value["frequency"], 2);
        assert_eq!(value["match_weight"], 3);
        assert!(value["curseforge"].is_null());
    }
}
