// SPDX-License-Identifier: AGPL-3.0
// Artify Core - Mapping server image entries into ImageRecord
//
// The backend has shipped several spellings of the same fields. RawImageEntry
// accepts all of them; into_record normalizes URL, date and kind.

use crate::types::{AppError, ImageKind, ImageRecord};
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer};
use serde_json::Value;

/// One entry of a list response, as sent by the server
#[derive(Debug, Clone, Deserialize)]
pub struct RawImageEntry {
    #[serde(alias = "Id", deserialize_with = "string_or_number")]
    pub id: String,
    #[serde(alias = "stored_filepath", default)]
    pub public_url: Option<String>,
    #[serde(alias = "original_filename", default)]
    pub filename: Option<String>,
    #[serde(alias = "created_at", default)]
    pub date: Option<String>,
    #[serde(alias = "user_favorite", default)]
    pub favorite: Option<bool>,
    /// 0 = uploaded, 1 = processed; sent as a number or a numeric string
    #[serde(rename = "type", default, deserialize_with = "lenient_code")]
    pub kind: Option<i64>,
}

/// Envelope of `GET /images` and the `/processes` collections
#[derive(Debug, Deserialize)]
struct ListEnvelope {
    #[serde(default)]
    simplified: Option<Vec<RawImageEntry>>,
    #[serde(default)]
    images: Option<Vec<RawImageEntry>>,
}

fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::String(s) => Ok(s),
        Value::Number(n) => Ok(n.to_string()),
        other => Err(serde::de::Error::custom(format!(
            "expected string or number id, got {}",
            other
        ))),
    }
}

/// Anything that is not a whole number or numeric string becomes `None`
fn lenient_code<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    })
}

/// Options that control how raw entries become records
#[derive(Debug, Clone)]
pub struct RecordMapper {
    base_url: String,
    date_format: String,
    default_kind: ImageKind,
}

impl RecordMapper {
    pub fn new(base_url: &str, date_format: &str, default_kind: ImageKind) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            date_format: date_format.to_string(),
            default_kind,
        }
    }

    /// Same mapper with another default kind
    pub fn with_default_kind(&self, default_kind: ImageKind) -> Self {
        Self {
            default_kind,
            ..self.clone()
        }
    }

    /// Qualify relative paths against the API origin
    pub fn qualify_url(&self, raw: &str) -> String {
        let raw = raw.trim();
        if raw.starts_with("http://") || raw.starts_with("https://") {
            raw.to_string()
        } else {
            format!("{}/{}", self.base_url, raw.trim_start_matches('/'))
        }
    }

    pub fn into_record(&self, entry: RawImageEntry) -> ImageRecord {
        let created_at = entry.date.as_deref().and_then(parse_server_date);
        let created_at_display = created_at
            .map(|dt| dt.format(&self.date_format).to_string())
            .unwrap_or_default();

        let kind = entry
            .kind
            .and_then(ImageKind::from_code)
            .unwrap_or(self.default_kind);

        let uri = entry
            .public_url
            .as_deref()
            .map(|u| self.qualify_url(u))
            .unwrap_or_default();

        let filename = entry
            .filename
            .filter(|f| !f.trim().is_empty())
            .unwrap_or_else(|| derive_filename(&uri, &entry.id));

        ImageRecord {
            id: entry.id,
            uri,
            filename,
            created_at,
            created_at_display,
            is_favorite: entry.favorite.unwrap_or(false),
            kind,
        }
    }

    /// Parse a list envelope (`simplified` or `images`) into records
    pub fn parse_list(&self, body: Value) -> Result<Vec<ImageRecord>, AppError> {
        let envelope: ListEnvelope = serde_json::from_value(body)
            .map_err(|e| AppError::InvalidResponse(format!("Malformed image list: {}", e)))?;

        let entries = envelope
            .simplified
            .or(envelope.images)
            .ok_or_else(|| {
                AppError::InvalidResponse("image list has no 'simplified' array".to_string())
            })?;

        Ok(dedupe_by_id(
            entries.into_iter().map(|e| self.into_record(e)).collect(),
        ))
    }
}

/// Keep the first record for every id
pub fn dedupe_by_id(records: Vec<ImageRecord>) -> Vec<ImageRecord> {
    let mut seen = std::collections::HashSet::new();
    let before = records.len();
    let unique: Vec<ImageRecord> = records
        .into_iter()
        .filter(|r| seen.insert(r.id.clone()))
        .collect();

    if unique.len() != before {
        tracing::warn!(
            "Dropped {} duplicate image id(s) from server list",
            before - unique.len()
        );
    }
    unique
}

/// Accepts RFC 3339, naive ISO datetimes (assumed UTC) and plain dates
pub fn parse_server_date(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }

    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, format) {
            return Some(naive.and_utc());
        }
    }

    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

fn derive_filename(uri: &str, id: &str) -> String {
    uri.rsplit('/')
        .next()
        .filter(|name| !name.is_empty())
        .map(|name| name.split('?').next().unwrap_or(name).to_string())
        .unwrap_or_else(|| format!("image-{}", id))
}
