use std::error::Error;
use std::path::PathBuf;

use atty::Stream;
use clap::{Parser, Subcommand};
use mcdict::store::DEFAULT_DATABASE;
use mcdict::{DictionaryStore, MergedRow, SearchMode, SearchPlan, generate_forms, merge_rows};
use serde_json::json;

#[derive(Parser, Debug)]
#[command(
    name = "mcdict",
    about = "Search the Minecraft mod translation dictionary",
    version
)]
pub struct Cli {
    /// Emit JSON instead of human-readable tables.
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the HTTP search service.
    #[cfg(feature = "web")]
    Serve(serve::ServeArgs),
    /// Search the dictionary and print the merged rows of one page.
    Search {
        /// Term to look up.
        query: String,
        /// Search direction: en2zh or zh2en.
        #[arg(short, long, default_value = "en2zh")]
        mode: String,
        /// Result page, starting at 1.
        #[arg(short, long, default_value_t = 1)]
        page: u32,
        /// SQLite dictionary file.
        #[arg(long, env = "MCDICT_DB", default_value = DEFAULT_DATABASE)]
        database: PathBuf,
    },
    /// Print the word forms an English query is expanded to.
    Forms {
        /// Single English word.
        word: String,
    },
}

pub fn run() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();
    match cli.command {
        #[cfg(feature = "web")]
        Command::Serve(args) => serve::run(args),
        Command::Search {
            query,
            mode,
            page,
            database,
        } => handle_search(query, SearchMode::from_param(Some(&mode)), page, database, cli.json),
        Command::Forms { word } => handle_forms(word, cli.json),
    }
}

fn handle_search(
    query: String,
    mode: SearchMode,
    page: u32,
    database: PathBuf,
    as_json: bool,
) -> Result<(), Box<dyn Error>> {
    if query.trim().is_empty() {
        return Err("Search query cannot be empty".into());
    }
    let plan = SearchPlan::new(&query, mode, page);
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    let result = runtime.block_on(async {
        let store = DictionaryStore::open(&database).await?;
        let result = store.search(&plan).await;
        store.close().await;
        result
    })?;

    if as_json {
        let payload = json!({
            "query": query,
            "results": result.results,
            "total": result.total,
            "mode": mode,
        });
        println!("{}", serde_json::to_string_pretty(&payload)?);
    } else {
        let merged = merge_rows(&result.results);
        print_search_table(plan.query(), &merged, result.total, plan.page());
    }
    Ok(())
}

fn handle_forms(word: String, as_json: bool) -> Result<(), Box<dyn Error>> {
    let normalized = word.trim().to_lowercase();
    let forms = generate_forms(&normalized);
    if as_json {
        let payload = json!({ "word": normalized, "forms": forms });
        println!("{}", serde_json::to_string_pretty(&payload)?);
    } else if forms.is_empty() {
        println!("No forms for an empty word.");
    } else {
        for form in forms {
            println!("{form}");
        }
    }
    Ok(())
}

fn print_search_table(query: &str, rows: &[MergedRow], total: u64, page: u32) {
    if rows.is_empty() {
        println!("No entries matched \"{query}\" (page {page}, {total} total).");
        return;
    }
    let translation_width = column_width(rows.iter().map(|r| r.trans_name.as_str()), "TRANSLATION");
    let origin_width = column_width(rows.iter().map(|r| r.origin_name.as_str()), "ORIGINAL");
    println!(
        "{:<tw$}  {:<ow$}  {:>5}  MOD (VERSIONS)",
        "TRANSLATION",
        "ORIGINAL",
        "FREQ",
        tw = translation_width,
        ow = origin_width
    );
    println!(
        "{:-<tw$}  {:-<ow$}  -----  --------------",
        "",
        "",
        tw = translation_width,
        ow = origin_width
    );
    let emphasize = stdout_is_tty();
    for row in rows {
        let origin = pad(&row.origin_name, origin_width);
        let origin = if emphasize {
            emphasize_match(&origin, query)
        } else {
            origin
        };
        println!(
            "{}  {}  {:>5}  {} ({})",
            pad(&row.trans_name, translation_width),
            origin,
            row.frequency,
            row.modid,
            row.versions_label()
        );
    }
    println!("\nPage {page}: {} rows, {total} entries total.", rows.len());
}

fn column_width<'a>(values: impl Iterator<Item = &'a str>, header: &str) -> usize {
    values
        .map(display_width)
        .max()
        .unwrap_or(0)
        .max(header.len())
}

// CJK glyphs occupy two terminal cells.
fn display_width(value: &str) -> usize {
    value
        .chars()
        .map(|c| if c.is_ascii() { 1 } else { 2 })
        .sum()
}

fn pad(value: &str, width: usize) -> String {
    let fill = width.saturating_sub(display_width(value));
    format!("{value}{}", " ".repeat(fill))
}

fn emphasize_match(text: &str, query: &str) -> String {
    let needle = query.to_ascii_lowercase();
    if needle.is_empty() {
        return text.to_string();
    }
    let haystack = text.to_ascii_lowercase();
    let mut out = String::with_capacity(text.len() + 16);
    let mut cursor = 0;
    for (start, matched) in haystack.match_indices(needle.as_str()) {
        let end = start + matched.len();
        out.push_str(&text[cursor..start]);
        out.push_str("\x1b[1m");
        out.push_str(&text[start..end]);
        out.push_str("\x1b[0m");
        cursor = end;
    }
    out.push_str(&text[cursor..]);
    out
}

fn stdout_is_tty() -> bool {
    atty::is(Stream::Stdout)
}

#[cfg(feature = "web")]
mod serve {
    use clap::Args;
    use mcdict::cache::{DEFAULT_CACHE_CAPACITY, DEFAULT_CACHE_TTL};
    use mcdict::store::{DEFAULT_DATABASE, DEFAULT_QUERY_TIMEOUT};
    use mcdict::web::{self, WebConfig};
    use std::error::Error;
    use std::net::SocketAddr;
    use std::path::PathBuf;
    use std::time::Duration;
    use tracing_subscriber::EnvFilter;

    #[derive(Args, Debug)]
    pub struct ServeArgs {
        /// Address to bind.
        #[arg(long, env = "MCDICT_ADDR", default_value = "127.0.0.1:8080")]
        addr: SocketAddr,
        /// SQLite dictionary file, opened read-only.
        #[arg(long, env = "MCDICT_DB", default_value = DEFAULT_DATABASE)]
        database: PathBuf,
        /// Seconds a cached search response stays fresh.
        #[arg(long, env = "MCDICT_CACHE_TTL_SECS", default_value_t = DEFAULT_CACHE_TTL.as_secs())]
        cache_ttl_secs: u64,
        /// Maximum number of cached search responses.
        #[arg(long, env = "MCDICT_CACHE_CAPACITY", default_value_t = DEFAULT_CACHE_CAPACITY)]
        cache_capacity: usize,
        /// Disable the response cache.
        #[arg(long)]
        no_cache: bool,
        /// Deadline in seconds for the queries behind one search.
        #[arg(long, env = "MCDICT_QUERY_TIMEOUT_SECS", default_value_t = DEFAULT_QUERY_TIMEOUT.as_secs())]
        query_timeout_secs: u64,
    }

    impl From<ServeArgs> for WebConfig {
        fn from(args: ServeArgs) -> Self {
            Self {
                addr: args.addr,
                database: args.database,
                cache_enabled: !args.no_cache,
                cache_capacity: args.cache_capacity,
                cache_ttl: Duration::from_secs(args.cache_ttl_secs),
                query_timeout: Duration::from_secs(args.query_timeout_secs.max(1)),
            }
        }
    }

    pub fn run(args: ServeArgs) -> Result<(), Box<dyn Error>> {
        init_tracing();
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .build()?;
        runtime.block_on(web::serve(args.into()))?;
        Ok(())
    }

    fn init_tracing() {
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new("info,tower_http=info"));
        let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
    }
}
