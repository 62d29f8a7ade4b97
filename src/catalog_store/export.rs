//! Full dumps of one entity kind as JSON or TSV.

use super::trait_def::CatalogEntity;
use anyhow::Result;
use rusqlite::types::Value;
use serde::Deserialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    #[default]
    Json,
    Tsv,
}

impl ExportFormat {
    pub fn content_type(&self) -> &'static str {
        match self {
            ExportFormat::Json => "application/json",
            ExportFormat::Tsv => "text/tab-separated-values; charset=utf-8",
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            ExportFormat::Json => "json",
            ExportFormat::Tsv => "tsv",
        }
    }
}

/// Escapes a TSV cell so it can't break the row/column structure.
pub fn escape_tsv(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '\\' => escaped.push_str("\\\\"),
            '\t' => escaped.push_str("\\t"),
            '\n' => escaped.push_str("\\n"),
            '\r' => escaped.push_str("\\r"),
            c => escaped.push(c),
        }
    }
    escaped
}

fn cell(value: &Value) -> String {
    match value {
        Value::Null | Value::Blob(_) => String::new(),
        Value::Integer(i) => i.to_string(),
        Value::Real(f) => f.to_string(),
        Value::Text(s) => escape_tsv(s),
    }
}

/// Header row plus one row per entity: `id`, the domain columns, any extra
/// columns of the kind, then the two version timestamps.
pub fn to_tsv<E: CatalogEntity>(entities: &[E]) -> String {
    let mut header: Vec<&str> = vec!["id"];
    header.extend(E::COLUMNS);
    header.extend(E::tsv_extra_headers());
    header.extend(["created_at", "updated_at"]);

    let mut out = header.join("\t");
    out.push('\n');

    for entity in entities {
        let mut cells = vec![escape_tsv(entity.id())];
        cells.extend(entity.column_values().iter().map(cell));
        cells.extend(entity.tsv_extra_values().iter().map(|v| escape_tsv(v)));
        cells.push(entity.created_at().to_string());
        cells.push(entity.version().to_string());
        out.push_str(&cells.join("\t"));
        out.push('\n');
    }
    out
}

pub fn to_json<E: CatalogEntity>(entities: &[E]) -> Result<String> {
    Ok(serde_json::to_string(entities)?)
}

pub fn render<E: CatalogEntity>(entities: &[E], format: ExportFormat) -> Result<String> {
    match format {
        ExportFormat::Json => to_json(entities),
        ExportFormat::Tsv => Ok(to_tsv(entities)),
    }
}
