use std::ffi::OsString;
use std::path::Path;
use std::sync::{Arc, LazyLock};

use anyhow::{Context, Result};
use axum::body::Body;
use axum::extract::{Json, State};
use axum::http::header;
use axum::response::Response;
use axum::routing::{get, post};
use axum::Router;
use regex::Regex;
use serde::Deserialize;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::time::UtcTime;

use crate::config::Config;
use crate::error::ExportError;
use crate::filler::{self, TemplateStore};
use crate::lookup::{LookupStore, PgLookupStore};
use crate::template;

pub const XLSX_CONTENT_TYPE: &str =
    "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";
pub const XLSM_CONTENT_TYPE: &str = "application/vnd.ms-excel.sheet.macroEnabled.12";

static UNSAFE_FILENAME_CHARS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^A-Za-z0-9_.-]").expect("valid regex"));

#[derive(Debug, Deserialize)]
pub struct ExportRequest {
    pub table: String,
}

pub struct AppState<L, T> {
    pub config: Config,
    pub lookups: L,
    pub templates: T,
}

pub fn router<L: LookupStore, T: TemplateStore>(state: AppState<L, T>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/export", post(export_template::<L, T>))
        .route("/fill", post(fill_template::<L, T>))
        .with_state(Arc::new(state))
}

async fn health() -> &'static str {
    "ok"
}

/// `<table>_template.xlsx`, with anything unsafe in a header value replaced.
pub fn template_filename(table: &str) -> String {
    let table = if table.trim().is_empty() { "export" } else { table };
    let table = UNSAFE_FILENAME_CHARS.replace_all(table, "_");
    format!("{table}_template.xlsx")
}

/// Macro-enabled downloads are announced as such; everything else is plain xlsx.
pub fn content_type(filename: &str) -> &'static str {
    let is_xlsm = Path::new(filename)
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("xlsm"));
    if is_xlsm {
        XLSM_CONTENT_TYPE
    } else {
        XLSX_CONTENT_TYPE
    }
}

fn xlsx_response(bytes: Vec<u8>, filename: &str) -> Result<Response, ExportError> {
    Response::builder()
        .header(header::CONTENT_TYPE, content_type(filename))
        .header(
            header::CONTENT_DISPOSITION,
            format!("attachment; filename=\"{filename}\""),
        )
        .body(Body::from(bytes))
        .context("build download response")
        .map_err(ExportError::Unexpected)
}

async fn export_template<L: LookupStore, T: TemplateStore>(
    State(state): State<Arc<AppState<L, T>>>,
    Json(req): Json<ExportRequest>,
) -> Result<Response, ExportError> {
    let lookups = state
        .lookups
        .fetch_lookups()
        .await
        .map_err(ExportError::DependencyUnavailable)?;
    tracing::info!(
        table = %req.table,
        projects = lookups.projects.len(),
        tasks = lookups.tasks.len(),
        categories = lookups.categories.len(),
        units = lookups.units.len(),
        "building template"
    );

    let schema = state.config.schema;
    let prefill_rows = state.config.prefill_rows;
    let bytes = tokio::task::spawn_blocking(move || {
        let book = template::build_template(&schema, &lookups, prefill_rows)?;
        template::to_bytes(&book)
    })
    .await
    .map_err(ExportError::unexpected)??;

    xlsx_response(bytes, &template_filename(&req.table))
}

async fn fill_template<L: LookupStore, T: TemplateStore>(
    State(state): State<Arc<AppState<L, T>>>,
    Json(req): Json<ExportRequest>,
) -> Result<Response, ExportError> {
    let fill = &state.config.fill;
    tracing::info!(table = %req.table, sheet = %fill.sheet_name, "filling template");

    let raw = state
        .templates
        .load()
        .await
        .map_err(ExportError::DependencyUnavailable)?;
    filler::check_template(&raw, &fill.sheet_name)?;

    let values = state
        .lookups
        .fetch_column(&fill.query)
        .await
        .map_err(ExportError::DependencyUnavailable)?;
    tracing::info!(rows = values.len(), "overwriting column A");

    let sheet_name = fill.sheet_name.clone();
    let bytes = tokio::task::spawn_blocking(move || {
        filler::fill_template(&raw, &sheet_name, &values)
    })
    .await
    .map_err(ExportError::unexpected)??;

    xlsx_response(bytes, &fill.filename)
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_timer(UtcTime::rfc_3339())
        .with_env_filter(filter)
        .init();
}

async fn serve(config: Config) -> Result<()> {
    let bind = config.bind.clone();
    let state = AppState {
        lookups: PgLookupStore::new(config.database_url.clone()),
        templates: config.fill.template.clone(),
        config,
    };

    let listener = tokio::net::TcpListener::bind(&bind)
        .await
        .with_context(|| format!("bind {bind}"))?;
    tracing::info!(%bind, "listening");
    axum::serve(listener, router(state))
        .await
        .context("serve http")
}

/// Entry point of the binary. The optional first argument overrides the bind address.
pub fn run(args: impl IntoIterator<Item = OsString>) -> Result<()> {
    let mut args = args.into_iter();
    let _exe = args.next();

    init_logging();

    let mut config = Config::from_env()?;
    if let Some(bind) = args.next() {
        config.bind = bind.to_string_lossy().into_owned();
    }

    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("start tokio runtime")?
        .block_on(serve(config))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filenames_are_header_safe() {
        assert_eq!(template_filename("activities"), "activities_template.xlsx");
        assert_eq!(template_filename("a\"b; c"), "a_b__c_template.xlsx");
        assert_eq!(template_filename(""), "export_template.xlsx");
    }

    #[test]
    fn content_type_follows_the_extension() {
        assert_eq!(content_type("template.xlsx"), XLSX_CONTENT_TYPE);
        assert_eq!(content_type("template.xlsm"), XLSM_CONTENT_TYPE);
        assert_eq!(content_type("TEMPLATE.XLSM"), XLSM_CONTENT_TYPE);
        assert_eq!(content_type("template"), XLSX_CONTENT_TYPE);
    }
}
