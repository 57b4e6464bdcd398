use std::env;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use reqwest::Url;

use crate::error::{AppError, AppResult};

pub const API_URL_VAR: &str = "BUGZILLA_API_URL";
pub const API_KEY_VAR: &str = "BUGZILLA_API_KEY";
const TIMEOUT_VAR: &str = "BUGZILLA_TIMEOUT_SECS";
const PAGE_SIZE_VAR: &str = "BUGZILLA_PAGE_SIZE";
const MAX_PAGES_VAR: &str = "BUGZILLA_MAX_PAGES";
const RETRY_VAR: &str = "BUGZILLA_RETRY_TRANSIENT";
const KEY_IN_QUERY_VAR: &str = "BUGZILLA_API_KEY_IN_QUERY";
const INVALID_CERTS_VAR: &str = "BUGZILLA_ACCEPT_INVALID_CERTS";

const DEFAULT_TIMEOUT_SECS: u64 = 30;
const DEFAULT_PAGE_SIZE: usize = 100;
const DEFAULT_MAX_PAGES: usize = 10;

#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    base_url: String,
    api_key: String,
}

impl Credentials {
    pub fn new(base_url: &str, api_key: &str) -> AppResult<Self> {
        let trimmed = base_url.trim();
        let parsed = Url::parse(trimmed).map_err(|err| {
            AppError::Configuration(format!("{API_URL_VAR} is not a valid URL: {err}"))
        })?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(AppError::Configuration(format!(
                "{API_URL_VAR} must use http or https, got '{}'",
                parsed.scheme()
            )));
        }
        let api_key = api_key.trim();
        if api_key.is_empty() {
            return Err(AppError::Configuration(format!(
                "{API_KEY_VAR} must not be empty"
            )));
        }

        Ok(Self {
            base_url: trimmed.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
        })
    }

    /// Base URL without a trailing slash, e.g. `https://bugzilla.example.org/rest`.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn api_key(&self) -> &str {
        &self.api_key
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("base_url", &self.base_url)
            .field("api_key", &mask_secret(&self.api_key))
            .finish()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApiKeyPlacement {
    Header,
    Query,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub credentials: Credentials,
    pub timeout: Duration,
    pub page_size: usize,
    pub max_pages: usize,
    pub retry_transient: bool,
    pub api_key_placement: ApiKeyPlacement,
    pub accept_invalid_certs: bool,
}

impl AppConfig {
    pub fn load() -> AppResult<Self> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> AppResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let read = |name: &str| lookup(name).filter(|value| !value.trim().is_empty());

        let base_url = read(API_URL_VAR).ok_or_else(|| {
            AppError::Configuration(format!("{API_URL_VAR} environment variable is required"))
        })?;
        let api_key = read(API_KEY_VAR).ok_or_else(|| {
            AppError::Configuration(format!("{API_KEY_VAR} environment variable is required"))
        })?;
        let credentials = Credentials::new(&base_url, &api_key)?;

        let timeout_secs = parse_number(TIMEOUT_VAR, read(TIMEOUT_VAR), DEFAULT_TIMEOUT_SECS)?;
        let page_size = parse_number(PAGE_SIZE_VAR, read(PAGE_SIZE_VAR), DEFAULT_PAGE_SIZE)?;
        let max_pages = parse_number(MAX_PAGES_VAR, read(MAX_PAGES_VAR), DEFAULT_MAX_PAGES)?;
        let retry_transient = parse_flag(RETRY_VAR, read(RETRY_VAR), true)?;
        let key_in_query = parse_flag(KEY_IN_QUERY_VAR, read(KEY_IN_QUERY_VAR), false)?;
        let accept_invalid_certs = parse_flag(INVALID_CERTS_VAR, read(INVALID_CERTS_VAR), false)?;

        Ok(Self {
            credentials,
            timeout: Duration::from_secs(timeout_secs),
            page_size,
            max_pages,
            retry_transient,
            api_key_placement: if key_in_query {
                ApiKeyPlacement::Query
            } else {
                ApiKeyPlacement::Header
            },
            accept_invalid_certs,
        })
    }

    pub fn new(credentials: Credentials) -> Self {
        Self {
            credentials,
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            page_size: DEFAULT_PAGE_SIZE,
            max_pages: DEFAULT_MAX_PAGES,
            retry_transient: true,
            api_key_placement: ApiKeyPlacement::Header,
            accept_invalid_certs: false,
        }
    }
}

fn parse_number<T>(name: &str, raw: Option<String>, default: T) -> AppResult<T>
where
    T: FromStr + PartialOrd + From<u8>,
{
    let Some(raw) = raw else {
        return Ok(default);
    };
    let value = raw
        .trim()
        .parse::<T>()
        .map_err(|_| AppError::Configuration(format!("{name} must be a number, got '{raw}'")))?;
    if value < T::from(1) {
        return Err(AppError::Configuration(format!(
            "{name} must be at least 1"
        )));
    }
    Ok(value)
}

fn parse_flag(name: &str, raw: Option<String>, default: bool) -> AppResult<bool> {
    match raw.as_deref().map(|v| v.trim().to_lowercase()) {
        None => Ok(default),
        Some(value) => match value.as_str() {
            "1" | "true" | "yes" | "on" => Ok(true),
            "0" | "false" | "no" | "off" => Ok(false),
            _ => Err(AppError::Configuration(format!(
                "{name} must be true or false, got '{value}'"
            ))),
        },
    }
}

pub fn mask_secret(value: &str) -> String {
    let chars = value.chars().collect::<Vec<_>>();
    match chars.len() {
        0 => "<not set>".to_string(),
        len if len > 6 => {
            let prefix = chars[..3].iter().collect::<String>();
            let suffix = chars[len - 3..].iter().collect::<String>();
            format!("{prefix}***{suffix}")
        }
        _ => "***".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn loads_required_settings_with_defaults() {
        let config = AppConfig::from_lookup(lookup(&[
            (API_URL_VAR, "https://bugzilla.example.org/rest/"),
            (API_KEY_VAR, "abcdef123456"),
        ]))
        .unwrap();

        assert_eq!(
            config.credentials.base_url(),
            "https://bugzilla.example.org/rest"
        );
        assert_eq!(config.timeout, Duration::from_secs(30));
        assert_eq!(config.page_size, 100);
        assert_eq!(config.max_pages, 10);
        assert!(config.retry_transient);
        assert_eq!(config.api_key_placement, ApiKeyPlacement::Header);
        assert!(!config.accept_invalid_certs);
    }

    #[test]
    fn missing_api_key_fails_startup() {
        let err = AppConfig::from_lookup(lookup(&[(
            API_URL_VAR,
            "https://bugzilla.example.org/rest",
        )]))
        .unwrap_err();
        assert!(matches!(err, AppError::Configuration(msg) if msg.contains(API_KEY_VAR)));
    }

    #[test]
    fn blank_base_url_counts_as_missing() {
        let err = AppConfig::from_lookup(lookup(&[(API_URL_VAR, "  "), (API_KEY_VAR, "key")]))
            .unwrap_err();
        assert!(matches!(err, AppError::Configuration(msg) if msg.contains(API_URL_VAR)));
    }

    #[test]
    fn rejects_non_http_base_url() {
        let err = AppConfig::from_lookup(lookup(&[
            (API_URL_VAR, "ftp://bugzilla.example.org"),
            (API_KEY_VAR, "key"),
        ]))
        .unwrap_err();
        assert!(matches!(err, AppError::Configuration(_)));
    }

    #[test]
    fn parses_optional_overrides() {
        let config = AppConfig::from_lookup(lookup(&[
            (API_URL_VAR, "http://localhost:8080/rest"),
            (API_KEY_VAR, "key"),
            (TIMEOUT_VAR, "5"),
            (PAGE_SIZE_VAR, "20"),
            (MAX_PAGES_VAR, "3"),
            (RETRY_VAR, "off"),
            (KEY_IN_QUERY_VAR, "true"),
        ]))
        .unwrap();

        assert_eq!(config.timeout, Duration::from_secs(5));
        assert_eq!(config.page_size, 20);
        assert_eq!(config.max_pages, 3);
        assert!(!config.retry_transient);
        assert_eq!(config.api_key_placement, ApiKeyPlacement::Query);
    }

    #[test]
    fn rejects_zero_page_size() {
        let err = AppConfig::from_lookup(lookup(&[
            (API_URL_VAR, "http://localhost/rest"),
            (API_KEY_VAR, "key"),
            (PAGE_SIZE_VAR, "0"),
        ]))
        .unwrap_err();
        assert!(matches!(err, AppError::Configuration(msg) if msg.contains(PAGE_SIZE_VAR)));
    }

    #[test]
    fn debug_output_masks_api_key() {
        let credentials = Credentials::new("https://b.example.org/rest", "secret-key-999").unwrap();
        let rendered = format!("{credentials:?}");
        assert!(!rendered.contains("secret-key-999"));
        assert!(rendered.contains("sec***999"));
    }
}
