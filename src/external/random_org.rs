use crate::config::RandomOrgConfig;
use crate::error::AppResult;
use reqwest::Client;
use serde::Deserialize;
use serde_json::value::RawValue;
use std::time::Duration;
use thiserror::Error;

const SIGN_VERIFY_ENDPOINT: &str = "https://api.random.org/sign";

/// Why the signed source could not produce a value. Every variant means
/// "use the local fallback"; none of them is surfaced to API callers.
#[derive(Debug, Error)]
pub enum RandomOrgError {
    #[error("RANDOM_API_KEY not set")]
    Unconfigured,
    #[error("request timed out")]
    Timeout,
    #[error("transport error: {0}")]
    Transport(String),
    #[error("random.org error {code}: {message}")]
    Service { code: i64, message: String },
    #[error("malformed response: {0}")]
    Malformed(String),
}

impl From<reqwest::Error> for RandomOrgError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            RandomOrgError::Timeout
        } else {
            RandomOrgError::Transport(e.to_string())
        }
    }
}

/// One signed integer plus the material needed to verify it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedInteger {
    pub value: i64,
    /// The `random` object exactly as returned (the signature covers these bytes)
    pub random_json: String,
    pub signature: String,
}

impl SignedInteger {
    /// Public verification page on random.org for this draw.
    pub fn verification_url(&self) -> Option<String> {
        reqwest::Url::parse_with_params(
            SIGN_VERIFY_ENDPOINT,
            &[
                ("random", self.random_json.as_str()),
                ("signature", self.signature.as_str()),
                ("format", "html"),
            ],
        )
        .ok()
        .map(String::from)
    }
}

#[derive(Debug, Deserialize)]
struct RpcResponse {
    #[serde(default)]
    result: Option<RpcResult>,
    #[serde(default)]
    error: Option<RpcError>,
}

#[derive(Debug, Deserialize)]
struct RpcResult {
    random: Box<RawValue>,
    signature: String,
}

#[derive(Debug, Deserialize)]
struct RpcError {
    code: i64,
    message: String,
}

#[derive(Debug, Deserialize)]
struct RandomPayload {
    data: Vec<i64>,
}

/// Parse a `generateSignedIntegers` reply and check the value lies in `[1, max]`.
pub fn parse_signed_response(body: &str, max: i64) -> Result<SignedInteger, RandomOrgError> {
    let resp: RpcResponse =
        serde_json::from_str(body).map_err(|e| RandomOrgError::Malformed(e.to_string()))?;

    if let Some(err) = resp.error {
        return Err(RandomOrgError::Service {
            code: err.code,
            message: err.message,
        });
    }

    let result = resp
        .result
        .ok_or_else(|| RandomOrgError::Malformed("missing result".into()))?;

    let payload: RandomPayload = serde_json::from_str(result.random.get())
        .map_err(|e| RandomOrgError::Malformed(format!("random object: {e}")))?;

    let value = *payload
        .data
        .first()
        .ok_or_else(|| RandomOrgError::Malformed("empty data".into()))?;

    if value < 1 || value > max {
        return Err(RandomOrgError::Malformed(format!(
            "value {value} outside [1, {max}]"
        )));
    }
    if result.signature.is_empty() {
        return Err(RandomOrgError::Malformed("empty signature".into()));
    }

    Ok(SignedInteger {
        value,
        random_json: result.random.get().to_string(),
        signature: result.signature,
    })
}

#[derive(Clone)]
pub struct RandomOrgClient {
    http: Client,
    api_key: String,
    endpoint: String,
}

impl RandomOrgClient {
    pub fn new(cfg: &RandomOrgConfig) -> AppResult<Self> {
        let http = Client::builder()
            .user_agent("lottery-backend/random-org")
            .timeout(Duration::from_secs(cfg.timeout_secs))
            .build()?;
        Ok(Self {
            http,
            api_key: cfg.api_key.clone(),
            endpoint: cfg.endpoint.clone(),
        })
    }

    pub fn is_enabled(&self) -> bool {
        !self.api_key.is_empty()
    }

    /// Request a single signed integer in `[1, max]`.
    pub async fn generate_signed_integer(&self, max: i64) -> Result<SignedInteger, RandomOrgError> {
        if !self.is_enabled() {
            return Err(RandomOrgError::Unconfigured);
        }

        let payload = serde_json::json!({
            "jsonrpc": "2.0",
            "method": "generateSignedIntegers",
            "params": {
                "apiKey": self.api_key,
                "n": 1,
                "min": 1,
                "max": max,
                "replacement": false
            },
            "id": uuid::Uuid::new_v4().to_string(),
        });

        let resp = self.http.post(&self.endpoint).json(&payload).send().await?;
        let status = resp.status();
        let body = resp.text().await?;

        parse_signed_response(&body, max).map_err(|e| match e {
            RandomOrgError::Malformed(msg) if !status.is_success() => {
                RandomOrgError::Malformed(format!("HTTP {}: {msg}", status.as_u16()))
            }
            other => other,
        })
    }
}
