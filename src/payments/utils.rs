use crate::payments::error::{PaymentError, PaymentResult};
use reqwest::{Client, Method};
use serde::de::DeserializeOwned;
use serde_json::Value as JsonValue;
use std::time::Duration;
use tracing::warn;

/// Thin reqwest wrapper with a hard per-call timeout.
///
/// Every call goes out once. The payment URL poller owns the read budget of
/// the checkout path and stops on the first non-timeout error, so nothing
/// underneath it may retry. Only `get_json_retrying`, used for reads outside
/// the checkout path, retries on 429 and 5xx with exponential backoff.
#[derive(Clone)]
pub struct PaymentHttpClient {
    client: Client,
    timeout: Duration,
    max_retries: u32,
}

impl PaymentHttpClient {
    pub fn new(timeout: Duration, max_retries: u32) -> PaymentResult<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| PaymentError::upstream(format!("failed to initialize HTTP client: {}", e)))?;

        Ok(Self {
            client,
            timeout,
            max_retries,
        })
    }

    pub async fn get_json<T: DeserializeOwned>(
        &self,
        url: &str,
        bearer_token: Option<&str>,
    ) -> PaymentResult<T> {
        self.request_json(Method::GET, url, bearer_token, None, 0)
            .await
    }

    /// GET with up to `max_retries` extra attempts on 429/5xx.
    pub async fn get_json_retrying<T: DeserializeOwned>(
        &self,
        url: &str,
        bearer_token: Option<&str>,
    ) -> PaymentResult<T> {
        self.request_json(Method::GET, url, bearer_token, None, self.max_retries)
            .await
    }

    pub async fn post_json<T: DeserializeOwned>(
        &self,
        url: &str,
        bearer_token: Option<&str>,
        body: &JsonValue,
    ) -> PaymentResult<T> {
        self.request_json(Method::POST, url, bearer_token, Some(body), 0)
            .await
    }

    async fn request_json<T: DeserializeOwned>(
        &self,
        method: Method,
        url: &str,
        bearer_token: Option<&str>,
        body: Option<&JsonValue>,
        retries: u32,
    ) -> PaymentResult<T> {
        let mut attempt = 0;
        loop {
            let mut request = self.client.request(method.clone(), url).timeout(self.timeout);
            if let Some(token) = bearer_token {
                request = request.bearer_auth(token);
            }
            if let Some(payload) = body {
                request = request.json(payload);
            }

            let response = request.send().await.map_err(|e| PaymentError::UpstreamUnavailable {
                message: format!("processor request failed: {}", e),
                timed_out: e.is_timeout(),
            })?;

            let status = response.status();
            let text = response.text().await.map_err(|e| PaymentError::UpstreamUnavailable {
                message: format!("failed to read processor response: {}", e),
                timed_out: e.is_timeout(),
            })?;

            if status.is_success() {
                return serde_json::from_str::<T>(&text).map_err(|e| {
                    PaymentError::upstream(format!("invalid processor JSON response: {}", e))
                });
            }

            let transient = status.as_u16() == 429 || status.is_server_error();
            if transient && attempt < retries {
                warn!(
                    status = %status,
                    attempt = attempt + 1,
                    url = %url,
                    "processor returned a transient error, retrying"
                );
                tokio::time::sleep(Duration::from_millis(250 << attempt)).await;
                attempt += 1;
                continue;
            }

            if transient {
                return Err(PaymentError::upstream(format!("HTTP {}: {}", status, text)));
            }

            return Err(PaymentError::ProcessorRejected {
                reason: rejection_reason(&text),
                provider_code: Some(status.as_u16().to_string()),
            });
        }
    }
}

/// Best-effort human readable reason from a processor error body.
///
/// The processor answers with `{"error": {"type", "reason"?, "messages"?}}`;
/// anything else is passed through verbatim (truncated).
pub fn rejection_reason(body: &str) -> String {
    let parsed: Option<JsonValue> = serde_json::from_str(body).ok();
    let error = parsed.as_ref().and_then(|v| v.get("error"));

    if let Some(error) = error {
        if let Some(reason) = error.get("reason").and_then(|v| v.as_str()) {
            return reason.to_string();
        }
        if let Some(messages) = error.get("messages").and_then(|v| v.as_object()) {
            let mut parts: Vec<String> = messages
                .iter()
                .map(|(field, detail)| match detail {
                    JsonValue::Array(items) => {
                        let joined = items
                            .iter()
                            .filter_map(|item| item.as_str())
                            .collect::<Vec<_>>()
                            .join(", ");
                        format!("{}: {}", field, joined)
                    }
                    other => format!("{}: {}", field, other),
                })
                .collect();
            parts.sort();
            if !parts.is_empty() {
                return parts.join("; ");
            }
        }
        if let Some(kind) = error.get("type").and_then(|v| v.as_str()) {
            return kind.to_string();
        }
    }

    let trimmed = body.trim();
    if trimmed.is_empty() {
        "processor returned an empty error response".to_string()
    } else {
        trimmed.chars().take(200).collect()
    }
}
