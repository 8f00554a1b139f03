//! SQLite-backed search executor.
//!
//! The dictionary lives in a single read-only relation:
//!
//! ```sql
//! CREATE TABLE dict (trans_name TEXT, origin_name TEXT, modid TEXT,
//!                    version TEXT, key TEXT, curseforge TEXT);
//! ```
//!
//! Both the ranked page and the total are computed from one `matched` CTE
//! built from the plan's tiers.

use crate::plan::{Condition, SearchPlan};
use crate::{DictionaryEntry, RankedEntry, SearchPage};
use chrono::{DateTime, Local};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::{QueryBuilder, Row, Sqlite};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

pub const DEFAULT_DATABASE: &str = "Dict-Sqlite.db";
pub const DEFAULT_QUERY_TIMEOUT: Duration = Duration::from_secs(10);
const MAX_CONNECTIONS: u32 = 8;
const GROUP_COLUMNS: &str = r#"trans_name, origin_name, modid, version, "key", curseforge"#;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("failed to open dictionary database {path}: {source}")]
    Connect {
        path: String,
        #[source]
        source: sqlx::Error,
    },
    #[error("{0}")]
    Query(#[from] sqlx::Error),
    #[error("query did not complete within {0:?}")]
    Timeout(Duration),
    #[error("database file metadata unavailable: {0}")]
    Metadata(#[from] std::io::Error),
    #[error("dictionary is not backed by a file")]
    NoBackingFile,
}

#[derive(Clone, Debug)]
pub struct DictionaryStore {
    pool: SqlitePool,
    path: Option<PathBuf>,
    timeout: Duration,
}

impl DictionaryStore {
    /// Opens the dictionary file read-only.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref().to_path_buf();
        let options = SqliteConnectOptions::new()
            .filename(&path)
            .read_only(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(MAX_CONNECTIONS)
            .connect_with(options)
            .await
            .map_err(|source| StoreError::Connect {
                path: path.display().to_string(),
                source,
            })?;
        info!(path = %path.display(), "Opened dictionary database (read-only)");
        Ok(Self {
            pool,
            path: Some(path),
            timeout: DEFAULT_QUERY_TIMEOUT,
        })
    }

    /// Wraps an existing pool. `last_updated` is unavailable for such stores.
    pub fn from_pool(pool: SqlitePool) -> Self {
        Self {
            pool,
            path: None,
            timeout: DEFAULT_QUERY_TIMEOUT,
        }
    }

    /// Sets the deadline shared by the selection and count queries.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }

    /// Runs the ranked selection and the count concurrently and returns the
    /// requested page. Failures are reported as-is; nothing is retried.
    pub async fn search(&self, plan: &SearchPlan) -> Result<SearchPage, StoreError> {
        let started = Instant::now();
        let queries = async { tokio::try_join!(self.select_page(plan), self.count_matches(plan)) };
        let (results, total) = match tokio::time::timeout(self.timeout, queries).await {
            Ok(Ok(pair)) => pair,
            Ok(Err(err)) => {
                warn!(query = plan.query(), mode = %plan.mode(), error = %err, "Search query failed");
                return Err(err.into());
            }
            Err(_) => {
                warn!(query = plan.query(), mode = %plan.mode(), timeout = ?self.timeout, "Search query timed out");
                return Err(StoreError::Timeout(self.timeout));
            }
        };
        debug!(
            query = plan.query(),
            mode = %plan.mode(),
            page = plan.page(),
            returned = results.len(),
            total,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Search complete"
        );
        Ok(SearchPage { results, total })
    }

    /// Local modification time of the dictionary file.
    pub async fn last_updated(&self) -> Result<DateTime<Local>, StoreError> {
        let path = self.path.as_ref().ok_or(StoreError::NoBackingFile)?;
        let modified = tokio::fs::metadata(path).await?.modified()?;
        Ok(DateTime::<Local>::from(modified))
    }

    async fn select_page(&self, plan: &SearchPlan) -> Result<Vec<RankedEntry>, sqlx::Error> {
        let mut builder = matched_query(plan);
        builder.push(format!(
            "SELECT {GROUP_COLUMNS}, frequency, match_weight FROM matched \
             WHERE match_weight > 0 \
             ORDER BY match_weight DESC, frequency DESC, \
             origin_name, trans_name, modid, version, \"key\" \
             LIMIT "
        ));
        builder.push_bind(i64::from(plan.limit()));
        builder.push(" OFFSET ");
        builder.push_bind(i64::from(plan.offset()));
        let rows = builder.build().fetch_all(&self.pool).await?;
        rows.iter().map(ranked_entry_from_row).collect()
    }

    async fn count_matches(&self, plan: &SearchPlan) -> Result<u64, sqlx::Error> {
        let mut builder = matched_query(plan);
        builder.push("SELECT COUNT(*) AS total FROM matched WHERE match_weight > 0");
        let row = builder.build().fetch_one(&self.pool).await?;
        let total: i64 = row.try_get("total")?;
        Ok(total.max(0) as u64)
    }
}

// WITH matched AS (SELECT <tuple>, COUNT(*) AS frequency,
//   CASE WHEN <tier> THEN <weight> ... ELSE 0 END AS match_weight
//   FROM dict WHERE <tier> OR ... GROUP BY <tuple>)
fn matched_query(plan: &SearchPlan) -> QueryBuilder<'_, Sqlite> {
    let column = plan.column();
    let mut builder = QueryBuilder::new(format!(
        "WITH matched AS (SELECT {GROUP_COLUMNS}, COUNT(*) AS frequency, CASE"
    ));
    for tier in plan.tiers() {
        builder.push(" WHEN ");
        push_condition(&mut builder, column, &tier.condition);
        builder.push(format!(" THEN {}", tier.weight));
    }
    builder.push(" ELSE 0 END AS match_weight FROM dict WHERE ");
    for (idx, tier) in plan.tiers().iter().enumerate() {
        if idx > 0 {
            builder.push(" OR ");
        }
        push_condition(&mut builder, column, &tier.condition);
    }
    builder.push(format!(" GROUP BY {GROUP_COLUMNS}) "));
    builder
}

fn push_condition<'a>(builder: &mut QueryBuilder<'a, Sqlite>, column: &str, condition: &'a Condition) {
    match condition {
        Condition::Equals(term) => {
            builder.push(format!("LOWER({column}) = "));
            builder.push_bind(term.as_str());
        }
        Condition::AnyOf(terms) => {
            builder.push(format!("LOWER({column}) IN ("));
            let mut separated = builder.separated(", ");
            for term in terms {
                separated.push_bind(term.as_str());
            }
            separated.push_unseparated(")");
        }
        Condition::Prefix(prefix) => {
            builder.push(format!("LOWER({column}) LIKE "));
            builder.push_bind(format!("{}%", escape_like(prefix)));
            builder.push(r" ESCAPE '\'");
        }
    }
}

/// Escapes LIKE wildcards so user input only ever matches literally.
pub fn escape_like(input: &str) -> String {
    let mut escaped = String::with_capacity(input.len());
    for ch in input.chars() {
        if matches!(ch, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    escaped
}

fn ranked_entry_from_row(row: &SqliteRow) -> Result<RankedEntry, sqlx::Error> {
    let text = |name: &str| -> Result<String, sqlx::Error> {
        Ok(row.try_get::<Option<String>, _>(name)?.unwrap_or_default())
    };
    let curseforge = row
        .try_get::<Option<String>, _>("curseforge")?
        .filter(|slug| !slug.is_empty());
    let frequency: i64 = row.try_get("frequency")?;
    let match_weight: i64 = row.try_get("match_weight")?;
    Ok(RankedEntry {
        entry: DictionaryEntry {
            trans_name: text("trans_name")?,
            origin_name: text("origin_name")?,
            modid: text("modid")?,
            version: text("version")?,
            key: text("key")?,
            curseforge,
        },
        frequency: frequency.max(0) as u64,
        match_weight: match_weight.clamp(0, u8::MAX as i64) as u8,
    })
}

/// In-memory fixtures for tests across the crate.
#[cfg(test)]
pub(crate) mod testing {
    use super::*;

    pub(crate) type FixtureRow<'a> = (&'a str, &'a str, &'a str, &'a str, &'a str, Option<&'a str>);

    pub(crate) const DICT_SCHEMA: &str = r#"CREATE TABLE dict (
        trans_name TEXT, origin_name TEXT, modid TEXT,
        version TEXT, "key" TEXT, curseforge TEXT)"#;

    pub(crate) const FIXTURE: &[FixtureRow<'static>] = &[
        ("铁锭", "Iron Ingot", "minecraft", "1.18", "item.minecraft.iron_ingot", None),
        ("铁锭", "Iron Ingot", "minecraft", "1.18", "item.minecraft.iron_ingot", None),
        ("铁锭", "Iron Ingot", "minecraft", "1.19", "item.minecraft.iron_ingot", None),
        ("铁", "Iron", "thermal", "1.18", "material.thermal.iron", Some("thermal-foundation")),
        ("铁", "Iron", "thermal", "1.19", "material.thermal.iron", Some("thermal-foundation")),
        ("铁矿石", "Iron Ore", "minecraft", "1.19", "block.minecraft.iron_ore", None),
        ("铁矿石", "Iron Ore", "minecraft", "1.19", "block.minecraft.iron_ore", None),
        ("铁矿石", "Iron Ore", "minecraft", "1.19", "block.minecraft.iron_ore", None),
        ("采矿", "Mining", "create", "1.20", "create.tooltip.mining", Some("create")),
        ("矿井", "Mines", "create", "1.20", "create.structure.mines", Some("create")),
        ("矿", "Mine", "create", "1.20", "create.block.mine", Some("create")),
        ("矿工", "Miner", "mca", "1.20", "mca.profession.miner", None),
        ("金锭", "Gold Ingot", "minecraft", "1.20", "item.minecraft.gold_ingot", None),
        ("百分百铁", "100% Iron", "alloy", "1.20", "alloy.pure_iron", None),
        ("一千铁", "1000 Iron", "alloy", "1.20", "alloy.iron_stack", None),
    ];

    pub(crate) async fn memory_pool() -> SqlitePool {
        SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect("sqlite::memory:")
            .await
            .expect("in-memory sqlite")
    }

    pub(crate) async fn seed(pool: &SqlitePool, rows: &[FixtureRow<'_>]) {
        sqlx::query(DICT_SCHEMA).execute(pool).await.expect("create dict");
        for (trans_name, origin_name, modid, version, key, curseforge) in rows {
            sqlx::query(
                r#"INSERT INTO dict (trans_name, origin_name, modid, version, "key", curseforge)
                   VALUES (?, ?, ?, ?, ?, ?)"#,
            )
            .bind(*trans_name)
            .bind(*origin_name)
            .bind(*modid)
            .bind(*version)
            .bind(*key)
            .bind(*curseforge)
            .execute(pool)
            .await
            .expect("insert fixture row");
        }
    }

    pub(crate) async fn fixture_store() -> DictionaryStore {
        let pool = memory_pool().await;
        seed(&pool, FIXTURE).await;
        DictionaryStore::from_pool(pool)
    }
}
