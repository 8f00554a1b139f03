//! Collapses ranked rows that only differ by mod version or localization key
//! into one display row per `(trans_name, origin_name)` pair.

use crate::RankedEntry;
use indexmap::{IndexMap, IndexSet};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergedRow {
    pub trans_name: String,
    pub origin_name: String,
    /// Mod of the first contributing row.
    pub modid: String,
    pub versions: IndexSet<String>,
    pub keys: IndexSet<String>,
    /// First non-empty slug among the contributing rows.
    pub curseforge: Option<String>,
    pub frequency: u64,
}

impl MergedRow {
    fn new(row: &RankedEntry) -> Self {
        Self {
            trans_name: row.entry.trans_name.clone(),
            origin_name: row.entry.origin_name.clone(),
            modid: row.entry.modid.clone(),
            versions: IndexSet::new(),
            keys: IndexSet::new(),
            curseforge: None,
            frequency: 0,
        }
    }

    fn absorb(&mut self, row: &RankedEntry) {
        self.versions.insert(row.entry.version.clone());
        self.keys.insert(row.entry.key.clone());
        self.frequency += row.frequency;
        if self.curseforge.is_none() {
            self.curseforge = row
                .entry
                .curseforge
                .as_ref()
                .filter(|slug| !slug.is_empty())
                .cloned();
        }
    }

    pub fn versions_label(&self) -> String {
        join(&self.versions, ", ")
    }

    pub fn keys_label(&self) -> String {
        join(&self.keys, "\n")
    }
}

/// Merges rows in encounter order; the first occurrence of a pair fixes its
/// position in the output.
pub fn merge_rows<'a, I>(rows: I) -> Vec<MergedRow>
where
    I: IntoIterator<Item = &'a RankedEntry>,
{
    let mut merged: IndexMap<(&'a str, &'a str), MergedRow> = IndexMap::new();
    for row in rows {
        merged
            .entry((row.entry.trans_name.as_str(), row.entry.origin_name.as_str()))
            .or_insert_with(|| MergedRow::new(row))
            .absorb(row);
    }
    merged.into_values().collect()
}

fn join(values: &IndexSet<String>, separator: &str) -> String {
    values
        .iter()
        .map(String::as_str)
        .collect::<Vec<_>>()
        .join(separator)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::DictionaryEntry;

    fn row(
        trans_name: &str,
        origin_name: &str,
        modid: &str,
        version: &str,
        key: &str,
        curseforge: Option<&str>,
        frequency: u64,
    ) -> RankedEntry {
        RankedEntry {
            entry: DictionaryEntry {
                trans_name: trans_name.into(),
                origin_name: origin_name.into(),
                modid: modid.into(),
                version: version.into(),
                key: key.into(),
                curseforge: curseforge.map(Into::into),
            },
            frequency,
            match_weight: 3,
        }
    }

    #[test]
    fn versions_collapse_and_frequencies_sum() {
        let rows = vec![
            row("铁", "Iron", "thermal", "1.18", "material.iron", None, 2),
            row("铁", "Iron", "thermal", "1.19", "material.iron", None, 3),
        ];
        let merged = merge_rows(&rows);
        assert_eq!(merged.len(), 1);
        let only = &merged[0];
        assert_eq!(
            only.versions.iter().collect::<Vec<_>>(),
            vec!["1.18", "1.19"]
        );
        assert_eq!(only.keys.len(), 1);
        assert_eq!(only.frequency, 5);
        assert_eq!(only.versions_label(), "1.18, 1.19");
    }

    #[test]
    fn first_occurrence_fixes_order() {
        let rows = vec![
            row("铁", "Iron", "thermal", "1.18", "a", None, 1),
            row("铁锭", "Iron Ingot", "minecraft", "1.18", "b", None, 1),
            row("铁", "Iron", "mekanism", "1.19", "c", None, 1),
            row("铁矿石", "Iron Ore", "minecraft", "1.19", "d", None, 1),
        ];
        let merged = merge_rows(&rows);
        let names: Vec<_> = merged.iter().map(|r| r.origin_name.as_str()).collect();
        assert_eq!(names, vec!["Iron", "Iron Ingot", "Iron Ore"]);
        assert_eq!(merged[0].modid, "thermal");
        assert_eq!(merged[0].keys_label(), "a\nc");
    }

    #[test]
    fn first_non_empty_curseforge_wins() {
        let rows = vec![
            row("矿", "Mine", "create", "1.19", "a", None, 1),
            row("矿", "Mine", "create", "1.20", "a", Some(""), 1),
            row("矿", "Mine", "create", "1.21", "a", Some("create"), 1),
            row("矿", "Mine", "other", "1.21", "b", Some("other"), 1),
        ];
        let merged = merge_rows(&rows);
        assert_eq!(merged[0].curseforge.as_deref(), Some("create"));
    }

    #[test]
    fn same_origin_different_translation_stays_separate() {
        let rows = vec![
            row("铁", "Iron", "a", "1", "k", None, 1),
            row("铁块", "Iron", "b", "1", "k", None, 1),
        ];
        assert_eq!(merge_rows(&rows).len(), 2);
    }
}
