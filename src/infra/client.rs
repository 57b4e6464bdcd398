use std::collections::HashSet;
use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, warn};

use crate::config::{ApiKeyPlacement, AppConfig, Credentials};
use crate::error::{AppError, AppResult};
use crate::infra::http::{HttpMethod, HttpRequest, HttpResponse, HttpTransport, TransportError};

const API_KEY_HEADER: &str = "x-bugzilla-api-key";
const API_KEY_PARAM: &str = "api_key";
const MAX_DETAIL_CHARS: usize = 512;

/// Authenticated JSON client for the remote tracker's REST root.
pub struct RestClient {
    transport: Arc<dyn HttpTransport>,
    credentials: Credentials,
    placement: ApiKeyPlacement,
    retry_transient: bool,
    page_size: usize,
    max_pages: usize,
}

impl RestClient {
    pub fn new(config: &AppConfig, transport: Arc<dyn HttpTransport>) -> Self {
        Self {
            transport,
            credentials: config.credentials.clone(),
            placement: config.api_key_placement,
            retry_transient: config.retry_transient,
            page_size: config.page_size,
            max_pages: config.max_pages,
        }
    }

    pub async fn get(&self, path: &str, query: &[(String, String)]) -> AppResult<Value> {
        self.execute(HttpMethod::Get, path, query.to_vec(), None)
            .await
    }

    pub async fn post(&self, path: &str, body: &Value) -> AppResult<Value> {
        self.execute(HttpMethod::Post, path, Vec::new(), Some(body.clone()))
            .await
    }

    pub async fn put(&self, path: &str, body: &Value) -> AppResult<Value> {
        self.execute(HttpMethod::Put, path, Vec::new(), Some(body.clone()))
            .await
    }

    /// Follows `limit`/`offset` pages of `collection` until the listing is
    /// exhausted, the caller's `limit` is met, or the page ceiling is hit.
    /// Records already seen on an earlier page (by `id`) are dropped so
    /// offsets that shift between calls never duplicate results.
    ///
    /// Bugzilla silently caps `limit` at `max_search_results`, so a page
    /// shorter than requested only ends the listing when it is empty or
    /// shorter than an earlier page.
    pub async fn get_paginated(
        &self,
        path: &str,
        query: &[(String, String)],
        collection: &str,
        limit: Option<usize>,
    ) -> AppResult<Vec<Value>> {
        let mut records: Vec<Value> = Vec::new();
        let mut seen = HashSet::new();
        let mut offset = 0usize;
        let mut largest_page = 0usize;

        for page in 0..self.max_pages {
            let wanted = match limit {
                Some(limit) => (limit - records.len()).min(self.page_size),
                None => self.page_size,
            };

            let mut page_query = query.to_vec();
            page_query.push(("limit".to_string(), wanted.to_string()));
            page_query.push(("offset".to_string(), offset.to_string()));

            let body = self.get(path, &page_query).await?;
            let batch = match body.get(collection) {
                Some(Value::Array(items)) => items.clone(),
                _ => {
                    return Err(AppError::Remote {
                        status: 200,
                        message: format!("response is missing the '{collection}' list"),
                    });
                }
            };

            let received = batch.len();
            for record in batch {
                let fresh = match record.get("id") {
                    Some(id) => seen.insert(id.to_string()),
                    None => true,
                };
                if fresh {
                    records.push(record);
                }
            }
            offset += received;
            debug!(path, page, received, total = records.len(), "fetched page");

            let limit_reached = limit.is_some_and(|limit| records.len() >= limit);
            let exhausted = received == 0 || (received < wanted && received < largest_page);
            if exhausted || limit_reached {
                return Ok(records);
            }
            if received < wanted {
                debug!(path, received, wanted, "short page, assuming a server-side cap");
            }
            largest_page = largest_page.max(received);
        }

        warn!(path, pages = self.max_pages, "pagination ceiling reached");
        Err(AppError::TruncatedResult {
            pages: self.max_pages,
            fetched: records.len(),
        })
    }

    async fn execute(
        &self,
        method: HttpMethod,
        path: &str,
        query: Vec<(String, String)>,
        body: Option<Value>,
    ) -> AppResult<Value> {
        let request = self.build_request(method, path, query, body);
        let attempts = if self.retry_transient { 2 } else { 1 };
        let mut attempt = 1;

        loop {
            match self.transport.send(request.clone()).await {
                Ok(response) => {
                    debug!(
                        method = method.as_str(),
                        path,
                        status = response.status,
                        "remote responded"
                    );
                    return parse_response(response);
                }
                Err(err) if err.is_transient() && attempt < attempts => {
                    warn!(
                        method = method.as_str(),
                        path,
                        error = err.detail(),
                        "transient transport failure, retrying once"
                    );
                    attempt += 1;
                }
                Err(err) => {
                    warn!(
                        method = method.as_str(),
                        path,
                        error = err.detail(),
                        "transport failure"
                    );
                    return Err(translate_transport(&err));
                }
            }
        }
    }

    fn build_request(
        &self,
        method: HttpMethod,
        path: &str,
        mut query: Vec<(String, String)>,
        body: Option<Value>,
    ) -> HttpRequest {
        let mut headers = Vec::new();
        match self.placement {
            ApiKeyPlacement::Header => {
                headers.push((API_KEY_HEADER, self.credentials.api_key().to_string()))
            }
            ApiKeyPlacement::Query => query.push((
                API_KEY_PARAM.to_string(),
                self.credentials.api_key().to_string(),
            )),
        }

        HttpRequest {
            method,
            url: format!(
                "{}/{}",
                self.credentials.base_url(),
                path.trim_start_matches('/')
            ),
            query,
            headers,
            body,
        }
    }
}

/// Bugzilla's error envelope: `{"error": true, "code": 101, "message": "..."}`.
#[derive(Debug, PartialEq)]
struct RemoteFault {
    code: Option<i64>,
    message: String,
}

impl RemoteFault {
    fn from_value(value: &Value) -> Option<Self> {
        if value.get("error").and_then(Value::as_bool) != Some(true) {
            return None;
        }
        let message = value
            .get("message")
            .and_then(Value::as_str)
            .unwrap_or("remote reported an error without a message")
            .to_string();
        Some(Self {
            code: value.get("code").and_then(Value::as_i64),
            message,
        })
    }

    fn parse(body: &str) -> Option<Self> {
        serde_json::from_str::<Value>(body)
            .ok()
            .and_then(|value| Self::from_value(&value))
    }

    fn classify(&self, status: Option<u16>) -> Option<AppError> {
        let message = self.message.clone();
        match self.code? {
            101 => Some(AppError::NotFound { message, status }),
            102 | 305 | 306 | 410 => Some(AppError::Auth { message, status }),
            _ => None,
        }
    }
}

fn parse_response(response: HttpResponse) -> AppResult<Value> {
    let status = response.status;
    if !(200..300).contains(&status) {
        return Err(translate_status(status, &response.body));
    }

    let value: Value = serde_json::from_str(&response.body).map_err(|err| {
        debug!(status, error = %err, "unparseable response body");
        AppError::Remote {
            status,
            message: "remote returned a response that is not valid JSON".to_string(),
        }
    })?;

    if let Some(fault) = RemoteFault::from_value(&value) {
        let classified = fault.classify(Some(status));
        return Err(classified.unwrap_or(AppError::Validation {
            message: fault.message,
            status: Some(status),
        }));
    }

    Ok(value)
}

fn translate_status(status: u16, body: &str) -> AppError {
    let fault = RemoteFault::parse(body);
    if (400..500).contains(&status) {
        if let Some(error) = fault.as_ref().and_then(|fault| fault.classify(Some(status))) {
            return error;
        }
    }

    let message = match fault {
        Some(fault) => fault.message,
        None if (400..500).contains(&status) && !body.trim().is_empty() => truncate(body.trim()),
        None => format!("remote responded with HTTP {status}"),
    };
    let status_code = Some(status);

    match status {
        401 | 403 => AppError::Auth {
            message,
            status: status_code,
        },
        404 => AppError::NotFound {
            message,
            status: status_code,
        },
        400 | 422 => AppError::Validation {
            message,
            status: status_code,
        },
        408 | 429 | 500..=599 => AppError::RemoteUnavailable {
            message,
            status: status_code,
        },
        _ => AppError::Remote { status, message },
    }
}

fn translate_transport(err: &TransportError) -> AppError {
    let message = match err {
        TransportError::Timeout(_) => "request to the issue tracker timed out",
        TransportError::Connect(_) => "could not connect to the issue tracker",
        TransportError::Other(_) => "request to the issue tracker failed",
    };
    AppError::RemoteUnavailable {
        message: message.to_string(),
        status: None,
    }
}

fn truncate(text: &str) -> String {
    if text.chars().count() <= MAX_DETAIL_CHARS {
        return text.to_string();
    }
    let mut cut = text.chars().take(MAX_DETAIL_CHARS).collect::<String>();
    cut.push('…');
    cut
}
