use std::sync::Arc;
use std::time::Duration;

use serde_json::{Map, Value};
use tokio::time::sleep;
use tracing::{debug, warn};

use crate::config::Config;
use crate::error::{classify_http_error, Error};
use crate::transport::Transport;

pub(crate) const MODERATION_PATH: &str = "/v1/moderation";
pub(crate) const HEALTH_PATH: &str = "/health";

/// Per-request options for a moderation call.
///
/// Optional body keys are sent only when set; `mode`, `risk`, `debug` and
/// `player_id` travel as `X-Moderyo-*` headers instead of body fields.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ModerationOptions {
    /// Overrides the config's default model for this request.
    pub model: Option<String>,
    pub long_text_mode: bool,
    pub long_text_threshold: Option<u32>,
    pub skip_profanity: bool,
    pub skip_threat: bool,
    pub skip_masked_word: bool,
    /// `enforce` or `shadow`.
    pub mode: Option<String>,
    /// `conservative`, `balanced` or `aggressive`.
    pub risk: Option<String>,
    pub debug: bool,
    pub player_id: Option<String>,
}

impl ModerationOptions {
    pub fn new() -> Self {
        Self::default()
    }
}

/// Builds wire requests and executes them with bounded retry.
///
/// 4xx responses are classified and surfaced immediately; 5xx and
/// connectivity failures are retried with exponential backoff until the
/// attempt budget (`max_retries + 1`) is spent.
pub(crate) struct RequestPipeline {
    transport: Arc<dyn Transport>,
    max_retries: u32,
    retry_delay_secs: f64,
    default_model: String,
}

impl RequestPipeline {
    pub(crate) fn new(config: &Config, transport: Arc<dyn Transport>) -> Self {
        Self {
            transport,
            max_retries: config.max_retries,
            retry_delay_secs: config.retry_delay_secs,
            default_model: config.default_model.clone(),
        }
    }

    pub(crate) async fn moderate_raw(
        &self,
        input: &str,
        options: &ModerationOptions,
    ) -> Result<Value, Error> {
        let body = self.build_body(input, options);
        let headers = build_headers(options);
        self.execute_post(MODERATION_PATH, &body, &headers).await
    }

    pub(crate) async fn health(&self) -> bool {
        matches!(self.transport.get(HEALTH_PATH).await, Ok(resp) if resp.status == 200)
    }

    pub(crate) fn build_body(&self, input: &str, options: &ModerationOptions) -> Value {
        let mut body = Map::new();
        body.insert("input".into(), Value::String(input.to_string()));
        let model = options
            .model
            .clone()
            .unwrap_or_else(|| self.default_model.clone());
        body.insert("model".into(), Value::String(model));

        if options.long_text_mode {
            body.insert("long_text_mode".into(), Value::Bool(true));
        }
        if let Some(threshold) = options.long_text_threshold {
            body.insert("long_text_threshold".into(), Value::from(threshold));
        }
        if options.skip_profanity {
            body.insert("skip_profanity".into(), Value::Bool(true));
        }
        if options.skip_threat {
            body.insert("skip_threat".into(), Value::Bool(true));
        }
        if options.skip_masked_word {
            body.insert("skip_masked_word".into(), Value::Bool(true));
        }

        Value::Object(body)
    }

    async fn execute_post(
        &self,
        path: &str,
        body: &Value,
        headers: &[(&'static str, String)],
    ) -> Result<Value, Error> {
        let mut last_failure: Option<Error> = None;

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                sleep(backoff_delay(self.retry_delay_secs, attempt - 1)).await;
            }

            match self.transport.post_json(path, body, headers).await {
                Ok(resp) if (200..300).contains(&resp.status) => {
                    debug!(status = resp.status, attempt, "moderation request succeeded");
                    return serde_json::from_str(&resp.body).map_err(|err| {
                        Error::Decode(format!("response body is not valid JSON: {err}"))
                    });
                }
                Ok(resp) if (400..500).contains(&resp.status) => {
                    return Err(classify_http_error(
                        resp.status,
                        &resp.body,
                        resp.retry_after.as_deref(),
                    ));
                }
                Ok(resp) => {
                    warn!(status = resp.status, attempt, "server error");
                    last_failure = Some(classify_http_error(resp.status, &resp.body, None));
                }
                Err(err) => {
                    warn!(error = %err, attempt, "connection failure");
                    last_failure = Some(err);
                }
            }
        }

        let attempts = self.max_retries + 1;
        Err(Error::NetworkExhausted {
            attempts,
            source: Box::new(last_failure.unwrap_or(Error::Connectivity {
                message: "no attempt completed".into(),
            })),
        })
    }
}

pub(crate) fn build_headers(options: &ModerationOptions) -> Vec<(&'static str, String)> {
    let mut headers = Vec::new();
    if let Some(mode) = &options.mode {
        headers.push(("X-Moderyo-Mode", mode.clone()));
    }
    if let Some(risk) = &options.risk {
        headers.push(("X-Moderyo-Risk", risk.clone()));
    }
    if options.debug {
        headers.push(("X-Moderyo-Debug", "true".to_string()));
    }
    if let Some(player_id) = &options.player_id {
        headers.push(("X-Moderyo-Player-Id", player_id.clone()));
    }
    headers
}

/// Delay before the retry that follows `failed_attempt` (0-based):
/// `retry_delay × 2^failed_attempt`.
fn backoff_delay(base_secs: f64, failed_attempt: u32) -> Duration {
    let factor = 2f64.powi(failed_attempt.min(32) as i32);
    Duration::from_secs_f64(base_secs * factor)
}
