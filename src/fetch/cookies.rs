//! Harvested cookie file: seeds the session's cookie jar (typically Cloudflare clearance cookies
//! captured from a real browser session).
//!
//! Accepted shapes: a JSON array of `{"name", "value", "domain", ...}` objects, or an object
//! `{"cookies": [...]}` wrapping such an array. Entries without a string `name` and `value` are
//! skipped.

use crate::config::Settings;
use serde_json::Value;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CookieFileError {
    #[error("Cannot read cookie file {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Invalid cookie file {path}: {source}")]
    Json {
        path: PathBuf,
        source: serde_json::Error,
    },
}

/// One cookie from the harvested file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HarvestedCookie {
    pub name: String,
    pub value: String,
    pub domain: Option<String>,
}

/// Extract cookies from a parsed JSON payload.
pub fn cookies_from_json(payload: &Value) -> Vec<HarvestedCookie> {
    let items = match payload {
        Value::Array(items) => items.as_slice(),
        Value::Object(map) => match map.get("cookies") {
            Some(Value::Array(items)) => items.as_slice(),
            _ => &[],
        },
        _ => &[],
    };
    items
        .iter()
        .filter_map(|item| {
            let name = item.get("name")?.as_str()?;
            let value = item.get("value")?.as_str()?;
            Some(HarvestedCookie {
                name: name.to_string(),
                value: value.to_string(),
                domain: item
                    .get("domain")
                    .and_then(Value::as_str)
                    .map(String::from),
            })
        })
        .collect()
}

/// Load the cookie file. A missing file is `Ok(None)`, not an error.
pub fn load_cookie_file(path: &Path) -> Result<Option<Vec<HarvestedCookie>>, CookieFileError> {
    let text = match std::fs::read_to_string(path) {
        Ok(t) => t,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => {
            return Err(CookieFileError::Io {
                path: path.to_path_buf(),
                source: e,
            })
        }
    };
    let payload: Value = serde_json::from_str(&text).map_err(|e| CookieFileError::Json {
        path: path.to_path_buf(),
        source: e,
    })?;
    Ok(Some(cookies_from_json(&payload)))
}

/// Layer harvested cookies over the settings' seeded cookies. Returns how many were applied.
pub fn apply_cookies(settings: &mut Settings, cookies: &[HarvestedCookie]) -> usize {
    for cookie in cookies {
        settings
            .cookies
            .insert(cookie.name.clone(), cookie.value.clone());
    }
    cookies.len()
}

/// Load `settings.cookie_file` (if present) into `settings`. Returns how many cookies were applied.
pub fn load_into(settings: &mut Settings) -> Result<usize, CookieFileError> {
    let path = settings.cookie_file.clone();
    match load_cookie_file(&path)? {
        Some(cookies) => {
            let applied = apply_cookies(settings, &cookies);
            if applied > 0 {
                log::info!("Loaded {} cookie(s) from {}", applied, path.display());
            }
            Ok(applied)
        }
        None => Ok(0),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_plain_array() {
        let payload = json!([
            {"name": "cf_clearance", "value": "abc", "domain": ".pro-football-reference.com", "path": "/"},
            {"name": "__cf_bm", "value": "xyz"}
        ]);
        let cookies = cookies_from_json(&payload);
        assert_eq!(cookies.len(), 2);
        assert_eq!(cookies[0].name, "cf_clearance");
        assert_eq!(
            cookies[0].domain.as_deref(),
            Some(".pro-football-reference.com")
        );
        assert_eq!(cookies[1].domain, None);
    }

    #[test]
    fn parses_wrapped_object_and_skips_incomplete() {
        let payload = json!({"cookies": [
            {"name": "a", "value": "1"},
            {"name": "missing_value"},
            {"value": "missing_name"},
            "not an object"
        ]});
        let cookies = cookies_from_json(&payload);
        assert_eq!(cookies.len(), 1);
        assert_eq!(cookies[0].value, "1");
    }

    #[test]
    fn unexpected_shape_yields_nothing() {
        assert!(cookies_from_json(&json!({"other": []})).is_empty());
        assert!(cookies_from_json(&json!("x")).is_empty());
    }

    #[test]
    fn missing_file_is_none() {
        let result = load_cookie_file(Path::new("/nonexistent_dir_pfrscrape_xyz/c.json")).unwrap();
        assert!(result.is_none());
    }

    #[test]
    fn load_into_layers_over_seeded_cookies() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cookies.json");
        std::fs::write(
            &path,
            r#"[{"name": "cf_clearance", "value": "fresh"}, {"name": "x", "value": "1"}]"#,
        )
        .unwrap();
        let mut settings = Settings {
            cookie_file: path,
            ..Settings::default()
        };
        settings
            .cookies
            .insert("cf_clearance".to_string(), "stale".to_string());
        assert_eq!(load_into(&mut settings).unwrap(), 2);
        assert_eq!(
            settings.cookies.get("cf_clearance").map(String::as_str),
            Some("fresh")
        );
        assert_eq!(settings.cookies.len(), 2);
    }

    #[test]
    fn invalid_json_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cookies.json");
        std::fs::write(&path, "[{").unwrap();
        assert!(matches!(
            load_cookie_file(&path),
            Err(CookieFileError::Json { .. })
        ));
    }
}
