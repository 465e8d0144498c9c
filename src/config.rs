use std::env;
use std::path::PathBuf;
use std::str::FromStr;

use anyhow::{Context, Result, anyhow};

use crate::filler::TemplateSource;
use crate::lookup::ColumnQuery;
use crate::schema::Schema;
use crate::template::{DEFAULT_PREFILL_ROWS, MAX_ROW};

pub const DEFAULT_BIND: &str = "0.0.0.0:8000";

#[derive(Debug, Clone)]
pub struct Config {
    pub bind: String,
    pub database_url: String,
    pub schema: Schema,
    pub prefill_rows: u32,
    pub fill: FillConfig,
}

/// Settings of the column filler pipeline.
#[derive(Debug, Clone)]
pub struct FillConfig {
    pub sheet_name: String,
    pub template: TemplateSource,
    pub query: ColumnQuery,
    pub filename: String,
}

impl Default for FillConfig {
    fn default() -> Self {
        Self {
            sheet_name: "Lookup".to_string(),
            template: TemplateSource::File(PathBuf::from("templates/base_template.xlsx")),
            query: ColumnQuery::new("projects", "project_code"),
            filename: "template.xlsx".to_string(),
        }
    }
}

impl Config {
    /// Everything but the database URL has a default.
    pub fn new(database_url: impl Into<String>) -> Self {
        Self {
            bind: DEFAULT_BIND.to_string(),
            database_url: database_url.into(),
            schema: Schema::default(),
            prefill_rows: DEFAULT_PREFILL_ROWS,
            fill: FillConfig::default(),
        }
    }

    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the config from any key lookup; `from_env` passes the process environment.
    pub fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let database_url = get("DATABASE_URL").ok_or_else(|| anyhow!("DATABASE_URL is not set"))?;
        let mut config = Self::new(database_url);

        if let Some(bind) = get("XLT_BIND") {
            config.bind = bind;
        }
        if let Some(v) = get("XLT_TASK_COUNT") {
            config.schema.task_count = parse("XLT_TASK_COUNT", &v)?;
        }
        if let Some(v) = get("XLT_CATEGORY_COUNT") {
            config.schema.category_count = parse("XLT_CATEGORY_COUNT", &v)?;
        }
        if let Some(v) = get("XLT_PREFILL_ROWS") {
            config.prefill_rows = parse("XLT_PREFILL_ROWS", &v)?;
            if config.prefill_rows >= MAX_ROW {
                return Err(anyhow!(
                    "invalid value for XLT_PREFILL_ROWS: {v} (at most {} rows fit under the header)",
                    MAX_ROW - 1
                ));
            }
        }

        let fill = &mut config.fill;
        if let Some(sheet) = get("XLT_FILL_SHEET") {
            fill.sheet_name = sheet;
        }
        if let Some(path) = get("XLT_FILL_TEMPLATE") {
            fill.template = TemplateSource::File(PathBuf::from(path));
        }
        if let Some(url) = get("XLT_FILL_TEMPLATE_URL") {
            fill.template = TemplateSource::Remote(url);
        }
        if let Some(table) = get("XLT_FILL_TABLE") {
            fill.query.table = table;
        }
        if let Some(column) = get("XLT_FILL_COLUMN") {
            fill.query.column = column;
        }
        if let Some(filename) = get("XLT_FILL_FILENAME") {
            fill.filename = filename;
        }

        Ok(config)
    }
}

fn parse<T>(key: &str, value: &str) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    value
        .trim()
        .parse()
        .with_context(|| format!("invalid value for {key}: {value}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn defaults() {
        let config = Config::from_lookup(lookup(&[("DATABASE_URL", "postgres://db/app")])).unwrap();
        assert_eq!(config.bind, "0.0.0.0:8000");
        assert_eq!(config.schema, Schema::new(3, 3));
        assert_eq!(config.prefill_rows, 1000);
        assert_eq!(config.fill.sheet_name, "Lookup");
        assert_eq!(
            config.fill.template,
            TemplateSource::File(PathBuf::from("templates/base_template.xlsx"))
        );
        assert_eq!(config.fill.query, ColumnQuery::new("projects", "project_code"));
    }

    #[test]
    fn overrides() {
        let config = Config::from_lookup(lookup(&[
            ("DATABASE_URL", "postgres://db/app"),
            ("XLT_TASK_COUNT", "5"),
            ("XLT_CATEGORY_COUNT", " 2 "),
            ("XLT_PREFILL_ROWS", "20"),
            ("XLT_FILL_TEMPLATE", "/srv/base.xlsm"),
            ("XLT_FILL_TEMPLATE_URL", "https://storage.example/base.xlsm"),
            ("XLT_FILL_COLUMN", "unit_name"),
        ]))
        .unwrap();
        assert_eq!(config.schema, Schema::new(5, 2));
        assert_eq!(config.prefill_rows, 20);
        assert_eq!(
            config.fill.template,
            TemplateSource::Remote("https://storage.example/base.xlsm".into())
        );
        assert_eq!(config.fill.query.column, "unit_name");
        assert_eq!(config.fill.query.table, "projects");
    }

    #[test]
    fn missing_database_url_and_bad_numbers_are_errors() {
        assert!(Config::from_lookup(lookup(&[])).is_err());

        let err = Config::from_lookup(lookup(&[
            ("DATABASE_URL", "postgres://db/app"),
            ("XLT_PREFILL_ROWS", "many"),
        ]))
        .unwrap_err();
        assert!(format!("{err:#}").contains("XLT_PREFILL_ROWS"));
    }

    #[test]
    fn prefill_rows_must_fit_under_the_header() {
        let rows = |v: &str| {
            Config::from_lookup(lookup(&[
                ("DATABASE_URL", "postgres://db/app"),
                ("XLT_PREFILL_ROWS", v),
            ]))
        };
        assert_eq!(rows("1048575").unwrap().prefill_rows, 1_048_575);
        assert!(rows("1048576").is_err());
        assert!(format!("{:#}", rows("4294967295").unwrap_err()).contains("XLT_PREFILL_ROWS"));
    }
}
