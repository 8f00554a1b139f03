//! Query planning.
//!
//! A [`SearchPlan`] is the single source of truth for which rows match a
//! query and how strongly. The store renders the same tiers into both the
//! ranked selection and the count, so `total` cannot drift from the rows a
//! client can page through.

use crate::forms::{generate_forms, is_single_word};
use crate::{PAGE_SIZE, SearchMode};

/// Highest page accepted before the offset would overflow.
pub const MAX_PAGE: u32 = u32::MAX / PAGE_SIZE;

pub const WEIGHT_EXACT: u8 = 3;
pub const WEIGHT_FORM: u8 = 2;
pub const WEIGHT_PREFIX: u8 = 1;

/// A case-insensitive predicate over the target column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Condition {
    Equals(String),
    AnyOf(Vec<String>),
    Prefix(String),
}

impl Condition {
    /// Evaluates the predicate against a column value the way SQLite's
    /// `LOWER()` does, which only folds ASCII.
    pub fn matches(&self, value: &str) -> bool {
        let value = value.to_ascii_lowercase();
        match self {
            Condition::Equals(term) => value == *term,
            Condition::AnyOf(terms) => terms.iter().any(|term| value == *term),
            Condition::Prefix(prefix) => value.starts_with(prefix.as_str()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tier {
    pub weight: u8,
    pub condition: Condition,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchPlan {
    query: String,
    mode: SearchMode,
    page: u32,
    tiers: Vec<Tier>,
}

impl SearchPlan {
    /// Plans a search for `query`, normalising it first. Tiers are ordered by
    /// descending weight and a row takes the weight of the first tier it
    /// satisfies.
    pub fn new(query: &str, mode: SearchMode, page: u32) -> Self {
        let query = normalize_query(query);
        let mut tiers = vec![Tier {
            weight: WEIGHT_EXACT,
            condition: Condition::Equals(query.clone()),
        }];

        match mode {
            SearchMode::En2Zh => {
                if is_single_word(&query) {
                    let forms: Vec<String> = generate_forms(&query)
                        .into_iter()
                        .filter(|form| *form != query)
                        .collect();
                    if !forms.is_empty() {
                        tiers.push(Tier {
                            weight: WEIGHT_FORM,
                            condition: Condition::AnyOf(forms),
                        });
                    }
                }
                tiers.push(Tier {
                    weight: WEIGHT_PREFIX,
                    condition: Condition::Prefix(query.clone()),
                });
            }
            SearchMode::Zh2En => tiers.push(Tier {
                weight: WEIGHT_FORM,
                condition: Condition::Prefix(query.clone()),
            }),
        }

        Self {
            query,
            mode,
            page: page.clamp(1, MAX_PAGE),
            tiers,
        }
    }

    pub fn query(&self) -> &str {
        &self.query
    }

    pub fn mode(&self) -> SearchMode {
        self.mode
    }

    pub fn page(&self) -> u32 {
        self.page
    }

    pub fn tiers(&self) -> &[Tier] {
        &self.tiers
    }

    pub fn column(&self) -> &'static str {
        self.mode.target_column()
    }

    pub fn limit(&self) -> u32 {
        PAGE_SIZE
    }

    pub fn offset(&self) -> u32 {
        (self.page - 1) * PAGE_SIZE
    }

    /// Weight a target-column value would receive; 0 means excluded.
    pub fn weight_of(&self, value: &str) -> u8 {
        self.tiers
            .iter()
            .find(|tier| tier.condition.matches(value))
            .map_or(0, |tier| tier.weight)
    }
}

/// Trims and lower-cases a raw query. Only ASCII is folded so the query
/// compares equal to SQLite's `LOWER()` of the same text.
pub fn normalize_query(raw: &str) -> String {
    raw.trim().to_ascii_lowercase()
}

/// Reads a page parameter the lenient way browsers send it: leading digits
/// are honoured ("3abc" and "+3" are page 3), anything else or anything
/// below 1 is page 1.
pub fn parse_page(raw: Option<&str>) -> u32 {
    let Some(raw) = raw.map(str::trim) else {
        return 1;
    };
    let raw = raw.strip_prefix('+').unwrap_or(raw);
    let digits: &str = {
        let end = raw
            .char_indices()
            .find(|(_, c)| !c.is_ascii_digit())
            .map_or(raw.len(), |(idx, _)| idx);
        &raw[..end]
    };
    if digits.is_empty() {
        return 1;
    }
    match digits.parse::<u64>() {
        Ok(0) => 1,
        Ok(page) => page.min(MAX_PAGE as u64) as u32,
        Err(_) => MAX_PAGE,
    }
}
