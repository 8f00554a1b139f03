use crate::cache::{
    DEFAULT_CACHE_CAPACITY, DEFAULT_CACHE_TTL, LruResponseCache, NoCache, ResponseCache,
};
use crate::merge::{MergedRow, merge_rows};
use crate::pagination::PageWindow;
use crate::plan::{SearchPlan, parse_page};
use crate::store::{DEFAULT_DATABASE, DEFAULT_QUERY_TIMEOUT, DictionaryStore, StoreError};
use crate::{RankedEntry, SearchMode};
use askama::Template;
use axum::{
    Json, Router,
    extract::{Query, State},
    http::{HeaderValue, Method, StatusCode, Uri, header},
    response::{Html, IntoResponse, Response},
    routing::get,
};
use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::signal;
use tower_http::compression::CompressionLayer;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tracing::{debug, info, warn};

type SharedState = Arc<AppState>;

const LAST_UPDATED_FORMAT: &str = "%Y-%m-%d %H:%M:%S";
const CURSEFORGE_MOD_URL: &str = "https://www.curseforge.com/minecraft/mc-mods/";
// RFC 3986 unreserved characters stay readable in links.
const COMPONENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

#[derive(Clone)]
pub struct AppState {
    pub store: DictionaryStore,
    pub cache: Arc<dyn ResponseCache>,
}

#[derive(Debug, Clone)]
pub struct WebConfig {
    pub addr: SocketAddr,
    pub database: PathBuf,
    pub cache_enabled: bool,
    pub cache_capacity: usize,
    pub cache_ttl: Duration,
    pub query_timeout: Duration,
}

impl Default for WebConfig {
    fn default() -> Self {
        Self {
            addr: SocketAddr::from(([127, 0, 0, 1], 8080)),
            database: PathBuf::from(DEFAULT_DATABASE),
            cache_enabled: true,
            cache_capacity: DEFAULT_CACHE_CAPACITY,
            cache_ttl: DEFAULT_CACHE_TTL,
            query_timeout: DEFAULT_QUERY_TIMEOUT,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum WebError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Runs the service until Ctrl-C or SIGTERM.
pub async fn serve(config: WebConfig) -> Result<(), WebError> {
    serve_until(config, shutdown_signal()).await
}

/// Runs the service until `shutdown` resolves, then drains in-flight
/// requests and closes the store.
pub async fn serve_until<F>(config: WebConfig, shutdown: F) -> Result<(), WebError>
where
    F: Future<Output = ()> + Send + 'static,
{
    let store = DictionaryStore::open(&config.database)
        .await?
        .with_timeout(config.query_timeout);
    let cache: Arc<dyn ResponseCache> = if config.cache_enabled {
        Arc::new(LruResponseCache::new(config.cache_capacity, config.cache_ttl))
    } else {
        Arc::new(NoCache)
    };
    let router = build_router(Arc::new(AppState {
        store: store.clone(),
        cache,
    }));
    let listener = TcpListener::bind(config.addr).await?;
    info!(
        addr = %listener.local_addr()?,
        database = %config.database.display(),
        cache = config.cache_enabled,
        cache_ttl = ?config.cache_ttl,
        query_timeout = ?config.query_timeout,
        "Dictionary service listening"
    );
    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown)
        .await?;
    store.close().await;
    info!("Dictionary service stopped");
    Ok(())
}

#[derive(Debug)]
struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }

    fn not_found(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            message: message.into(),
        }
    }

    fn internal(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: message.into(),
        }
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        ApiError::internal(format!("database query failed: {err}"))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let payload = json!({ "error": self.message });
        (self.status, Json(payload)).into_response()
    }
}

fn build_router(state: SharedState) -> Router {
    Router::new()
        .route("/", get(search_html))
        .route("/search", get(api_search))
        .route("/api/search", get(api_search))
        .route("/lastUpdated", get(api_last_updated))
        .route("/api/lastUpdated", get(api_last_updated))
        .route("/healthz", get(health))
        .fallback(not_found)
        .with_state(state)
        .layer(cors_layer())
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().include_headers(true))
                .on_response(DefaultOnResponse::new().include_headers(true)),
        )
        .layer(CompressionLayer::new())
}

fn cors_layer() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE])
}

async fn shutdown_signal() {
    let interrupt = async {
        if let Err(err) = signal::ctrl_c().await {
            warn!(error = %err, "Ctrl-C handler unavailable");
            std::future::pending::<()>().await;
        }
        "SIGINT"
    };
    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(err) => {
                warn!(error = %err, "SIGTERM handler unavailable");
                std::future::pending::<()>().await;
            }
        }
        "SIGTERM"
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<&'static str>();

    let received = tokio::select! {
        name = interrupt => name,
        name = terminate => name,
    };
    info!(signal = received, "Draining connections before exit");
}

async fn health() -> impl IntoResponse {
    Json(json!({ "status": "ok", "service": "mcdict-web" }))
}

async fn not_found() -> ApiError {
    ApiError::not_found("Not Found")
}

#[derive(Debug, Deserialize)]
struct SearchParams {
    q: Option<String>,
    page: Option<String>,
    mode: Option<String>,
}

#[derive(Debug)]
struct SearchRequest {
    raw_query: String,
    page: u32,
    mode: SearchMode,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct SearchResponsePayload {
    query: String,
    results: Vec<RankedEntry>,
    total: u64,
    mode: SearchMode,
}

fn parse_search_params(params: &SearchParams) -> Result<SearchRequest, ApiError> {
    let raw_query = params
        .q
        .as_ref()
        .filter(|q| !q.trim().is_empty())
        .ok_or_else(|| ApiError::bad_request("Query parameter `q` is required"))?;
    Ok(SearchRequest {
        raw_query: raw_query.clone(),
        page: parse_page(params.page.as_deref()),
        mode: SearchMode::from_param(params.mode.as_deref()),
    })
}

async fn api_search(
    State(state): State<SharedState>,
    uri: Uri,
    Query(params): Query<SearchParams>,
) -> Result<Response, ApiError> {
    let request = parse_search_params(&params)?;
    let cache_key = uri.to_string();
    if let Some(body) = state.cache.get(&cache_key) {
        debug!(key = %cache_key, "Serving cached search response");
        return Ok(json_body(body));
    }

    let plan = SearchPlan::new(&request.raw_query, request.mode, request.page);
    let page = state.store.search(&plan).await?;
    let payload = SearchResponsePayload {
        query: request.raw_query,
        results: page.results,
        total: page.total,
        mode: request.mode,
    };
    let body: Arc<str> = serde_json::to_string(&payload)
        .map_err(|err| ApiError::internal(format!("failed to encode response: {err}")))?
        .into();
    state.cache.put(&cache_key, Arc::clone(&body));
    Ok(json_body(body))
}

fn json_body(body: Arc<str>) -> Response {
    (
        [(
            header::CONTENT_TYPE,
            HeaderValue::from_static("application/json"),
        )],
        body.to_string(),
    )
        .into_response()
}

async fn api_last_updated(
    State(state): State<SharedState>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let modified = state.store.last_updated().await.map_err(|err| {
        warn!(error = %err, "Unable to read dictionary modification time");
        ApiError::internal("Unable to read database file metadata")
    })?;
    Ok(Json(json!({
        "lastUpdated": modified.format(LAST_UPDATED_FORMAT).to_string()
    })))
}

struct DisplayRow {
    trans_name: String,
    origin_html: String,
    modid: String,
    versions: String,
    keys: String,
    curseforge_url: Option<String>,
    frequency: u64,
}

impl DisplayRow {
    fn new(row: &MergedRow, query: &str) -> Self {
        Self {
            trans_name: row.trans_name.clone(),
            origin_html: highlight(&row.origin_name, query),
            modid: row.modid.clone(),
            versions: row.versions_label(),
            keys: row.keys_label(),
            curseforge_url: row
                .curseforge
                .as_ref()
                .map(|slug| format!("{CURSEFORGE_MOD_URL}{}", encode_component(slug))),
            frequency: row.frequency,
        }
    }
}

struct PageLink {
    label: String,
    href: String,
    disabled: bool,
    active: bool,
}

fn page_links(window: &PageWindow, query: &str, mode: SearchMode) -> Vec<PageLink> {
    window
        .buttons()
        .into_iter()
        .map(|button| PageLink {
            href: search_path(query, mode, button.page),
            label: button.label,
            disabled: button.disabled,
            active: button.active,
        })
        .collect()
}

fn search_path(query: &str, mode: SearchMode, page: u32) -> String {
    format!(
        "/?q={}&mode={}&page={}",
        encode_component(query),
        mode,
        page
    )
}

async fn search_html(
    State(state): State<SharedState>,
    Query(params): Query<SearchParams>,
) -> (StatusCode, Html<String>) {
    let mode = SearchMode::from_param(params.mode.as_deref());
    let query = params.q.as_deref().unwrap_or_default().trim();
    let mut template = SearchTemplate {
        query,
        zh2en: mode == SearchMode::Zh2En,
        rows: Vec::new(),
        total: 0,
        pages: Vec::new(),
        message: None,
    };

    let mut status = StatusCode::OK;
    if !query.is_empty() {
        let plan = SearchPlan::new(query, mode, parse_page(params.page.as_deref()));
        match state.store.search(&plan).await {
            Ok(page) => {
                if page.results.is_empty() {
                    template.message = Some("No results".to_string());
                }
                template.rows = merge_rows(&page.results)
                    .iter()
                    .map(|row| DisplayRow::new(row, query))
                    .collect();
                template.total = page.total;
                template.pages = PageWindow::new(page.total, plan.page())
                    .map(|window| page_links(&window, query, mode))
                    .unwrap_or_default();
            }
            Err(err) => {
                template.message = Some(ApiError::from(err).message);
                status = StatusCode::INTERNAL_SERVER_ERROR;
            }
        }
    }

    match template.render() {
        Ok(html) => (status, Html(html)),
        Err(err) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Html(format!("<p>{}</p>", html_escape(&err.to_string()))),
        ),
    }
}

fn encode_component(value: &str) -> String {
    utf8_percent_encode(value, COMPONENT).to_string()
}

fn html_escape(input: &str) -> String {
    input
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#x27;")
}

/// Escapes `text` and wraps every ASCII-case-insensitive occurrence of
/// `query` in a highlight span.
fn highlight(text: &str, query: &str) -> String {
    let needle = query.to_ascii_lowercase();
    if needle.is_empty() {
        return html_escape(text);
    }
    // ASCII folding keeps byte offsets aligned with `text`.
    let haystack = text.to_ascii_lowercase();
    let mut out = String::with_capacity(text.len() + 32);
    let mut cursor = 0;
    for (start, matched) in haystack.match_indices(needle.as_str()) {
        let end = start + matched.len();
        out.push_str(&html_escape(&text[cursor..start]));
        out.push_str(r#"<span class="highlight">"#);
        out.push_str(&html_escape(&text[start..end]));
        out.push_str("</span>");
        cursor = end;
    }
    out.push_str(&html_escape(&text[cursor..]));
    out
}

#[derive(Template)]
#[template(
    source = r#"<!DOCTYPE html>
<html lang="zh-CN">
  <head>
    <meta charset="utf-8" />
    <meta name="viewport" content="width=device-width, initial-scale=1" />
    <title>Minecraft Mod Dictionary{% if query.len() > 0 %} • {{ query }}{% endif %}</title>
    <script src="https://cdn.jsdelivr.net/npm/@tailwindcss/browser@4"></script>
    <style>.highlight { background-color: #fde68a; }</style>
  </head>
  <body class="bg-slate-50 text-slate-900">
    <main class="min-h-screen flex flex-col items-center justify-start py-10 px-4">
      <div class="max-w-5xl w-full space-y-6">
        <form method="get" action="/" class="flex flex-wrap gap-3">
          <input type="text" name="q" value="{{ query }}" placeholder="Search a term" class="flex-1 rounded-md border border-slate-300 px-3 py-2" />
          <select name="mode" class="rounded-md border border-slate-300 px-3 py-2">
            <option value="en2zh"{% if !zh2en %} selected{% endif %}>English → 中文</option>
            <option value="zh2en"{% if zh2en %} selected{% endif %}>中文 → English</option>
          </select>
          <button type="submit" class="inline-flex items-center rounded-md bg-slate-900 px-4 py-2 text-white font-semibold shadow hover:bg-slate-800 transition-colors">Search</button>
        </form>

        {% if message.is_some() %}
        <p class="text-lg text-slate-600">{{ message.as_ref().unwrap() }}</p>
        {% endif %}

        {% if rows.len() > 0 %}
        <p class="text-sm text-slate-500">{{ total }} entries</p>
        <div class="bg-white shadow rounded overflow-hidden">
          <table class="min-w-full">
            <thead class="bg-slate-100 text-left">
              <tr>
                <th class="px-4 py-2">Translation</th>
                <th class="px-4 py-2">Original</th>
                <th class="px-4 py-2">Mod (versions)</th>
                <th class="px-4 py-2">Frequency</th>
              </tr>
            </thead>
            <tbody>
              {% for row in rows %}
              <tr class="border-b border-slate-200">
                <td class="px-4 py-2">{% if row.trans_name.is_empty() %}No translation{% else %}{{ row.trans_name }}{% endif %}</td>
                <td class="px-4 py-2">{{ row.origin_html|safe }}</td>
                <td class="px-4 py-2" title="{{ row.keys }}">
                  {% if row.modid.is_empty() %}Unknown mod{% else %}{{ row.modid }}{% endif %} ({{ row.versions }})
                  {% if row.curseforge_url.is_some() %}
                  <a href="{{ row.curseforge_url.as_ref().unwrap()|safe }}" target="_blank" rel="noopener noreferrer" title="View on CurseForge" class="text-blue-700 hover:underline">CurseForge</a>
                  {% endif %}
                </td>
                <td class="px-4 py-2">{{ row.frequency }}</td>
              </tr>
              {% endfor %}
            </tbody>
          </table>
        </div>
        {% endif %}

        {% if pages.len() > 0 %}
        <ul class="pagination flex flex-wrap gap-2">
          {% for link in pages %}
          <li class="page-item{% if link.disabled %} disabled{% endif %}{% if link.active %} active{% endif %}">
            {% if link.disabled || link.active %}
            <span class="page-link px-3 py-1 rounded border bg-slate-900 text-white">{{ link.label }}</span>
            {% else %}
            <a class="page-link px-3 py-1 rounded border bg-white" href="{{ link.href }}">{{ link.label }}</a>
            {% endif %}
          </li>
          {% endfor %}
        </ul>
        {% endif %}
      </div>
    </main>
  </body>
</html>"#,
    ext = "html"
)]
struct SearchTemplate<'a> {
    query: &'a str,
    zh2en: bool,
    rows: Vec<DisplayRow>,
    total: u64,
    pages: Vec<PageLink>,
    message: Option<String>,
}
