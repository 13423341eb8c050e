use std::sync::Arc;

use tracing::instrument;

use crate::config::Config;
use crate::error::Error;
use crate::model::{BatchModerationResult, ModerationResult};
use crate::pipeline::{ModerationOptions, RequestPipeline};
use crate::transport::{HttpTransport, Transport};

/// Moderation API client: owns the configuration and the request pipeline.
///
/// The client holds no mutable state and can be shared freely across tasks;
/// concurrent calls only share the transport's connection pool.
pub struct Client {
    config: Config,
    pipeline: RequestPipeline,
}

impl Client {
    /// Client backed by an HTTP transport built from `config`.
    pub fn new(config: Config) -> Result<Self, Error> {
        let transport = Arc::new(HttpTransport::new(&config)?);
        Ok(Self::with_transport(config, transport))
    }

    /// Client over a caller-supplied transport. Mostly useful for testing
    /// against a stub wire.
    pub fn with_transport(config: Config, transport: Arc<dyn Transport>) -> Self {
        let pipeline = RequestPipeline::new(&config, transport);
        Self { config, pipeline }
    }

    /// Client configured from `MODERYO_*` environment variables.
    pub fn from_env() -> Result<Self, Error> {
        Self::new(Config::from_env()?)
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Moderate a single input, blocking the calling task for the duration of
    /// the (possibly retried) request.
    #[instrument(name = "moderate", skip(self, input, options), fields(input_len = input.len()))]
    pub async fn moderate(
        &self,
        input: &str,
        options: &ModerationOptions,
    ) -> Result<ModerationResult, Error> {
        let raw = self.pipeline.moderate_raw(input, options).await?;
        ModerationResult::from_value(&raw)
    }

    /// Moderate several inputs sequentially, in input order.
    ///
    /// The first failure propagates immediately and aborts the remaining
    /// inputs; there is no partial-success aggregation.
    pub async fn moderate_batch<I, S>(
        &self,
        inputs: I,
        options: &ModerationOptions,
    ) -> Result<BatchModerationResult, Error>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut results = Vec::new();
        for input in inputs {
            results.push(self.moderate(input.as_ref(), options).await?);
        }
        Ok(BatchModerationResult::new(results))
    }

    /// True only when `GET /health` answers 200. Never errors: any failure,
    /// including connectivity problems, reports an unhealthy service.
    pub async fn health_check(&self) -> bool {
        self.pipeline.health().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::testing::{refused, response, ScriptedTransport};

    fn client(max_retries: u32, transport: Arc<ScriptedTransport>) -> Client {
        let config = Config::builder("test-key")
            .max_retries(max_retries)
            .retry_delay_secs(0.0)
            .build()
            .unwrap();
        Client::with_transport(config, transport)
    }

    fn blocked_body() -> &'static str {
        r#"{"id":"mod-2","flagged":true,"policy_decision":{"decision":"BLOCK","reason":"threats"}}"#
    }

    #[tokio::test]
    async fn moderate_decodes_the_success_body() {
        let transport = Arc::new(ScriptedTransport::new(vec![response(
            200,
            r#"{"id":"mod-1","model":"omni-moderation-latest","results":[{"flagged":false}]}"#,
        )]));
        let client = client(3, Arc::clone(&transport));

        let result = client
            .moderate("hello", &ModerationOptions::default())
            .await
            .unwrap();
        assert_eq!(result.id, "mod-1");
        assert!(result.is_allowed());
        assert_eq!(transport.post_count(), 1);
    }

    #[tokio::test]
    async fn moderate_sends_options_as_body_and_headers() {
        let transport = Arc::new(ScriptedTransport::new(vec![response(200, "{}")]));
        let client = client(0, Arc::clone(&transport));

        let options = ModerationOptions {
            model: Some("custom-model".into()),
            long_text_mode: true,
            player_id: Some("player-42".into()),
            ..Default::default()
        };
        client.moderate("hello", &options).await.unwrap();

        let body = transport.last_body().unwrap();
        assert_eq!(body["input"], "hello");
        assert_eq!(body["model"], "custom-model");
        assert_eq!(body["long_text_mode"], true);
        assert_eq!(
            transport.last_headers(),
            vec![("X-Moderyo-Player-Id", "player-42".to_string())]
        );
    }

    #[tokio::test]
    async fn moderate_recovers_after_transient_server_errors() {
        let transport = Arc::new(ScriptedTransport::new(vec![
            response(500, "{}"),
            response(500, "{}"),
            response(200, r#"{"id":"mod-1"}"#),
        ]));
        let client = client(3, Arc::clone(&transport));

        let result = client
            .moderate("hello", &ModerationOptions::default())
            .await
            .unwrap();
        assert_eq!(result.id, "mod-1");
        assert_eq!(transport.post_count(), 3);
    }

    #[tokio::test]
    async fn moderate_gives_up_after_the_attempt_budget() {
        let transport = Arc::new(ScriptedTransport::new(vec![refused(), refused(), refused()]));
        let client = client(2, Arc::clone(&transport));

        let err = client
            .moderate("hello", &ModerationOptions::default())
            .await
            .unwrap_err();
        assert_eq!(transport.post_count(), 3);
        assert!(matches!(err, Error::NetworkExhausted { attempts: 3, .. }));
    }

    #[tokio::test]
    async fn batch_preserves_input_order() {
        let transport = Arc::new(ScriptedTransport::new(vec![
            response(200, r#"{"id":"mod-a"}"#),
            response(200, blocked_body()),
            response(200, r#"{"id":"mod-c"}"#),
        ]));
        let client = client(0, Arc::clone(&transport));

        let batch = client
            .moderate_batch(["first", "second", "third"], &ModerationOptions::default())
            .await
            .unwrap();
        assert_eq!(batch.len(), 3);
        assert_eq!(batch.results()[0].id, "mod-a");
        assert_eq!(batch.results()[1].id, "mod-2");
        assert_eq!(batch.results()[2].id, "mod-c");
        assert_eq!(batch.blocked().len(), 1);
        assert!(batch.has_blocked());
        assert_eq!(batch.flagged().len(), 1);
    }

    #[tokio::test]
    async fn batch_aborts_on_the_first_failure() {
        let transport = Arc::new(ScriptedTransport::new(vec![
            response(200, r#"{"id":"mod-a"}"#),
            response(401, r#"{"message":"bad key"}"#),
        ]));
        let client = client(0, Arc::clone(&transport));

        let err = client
            .moderate_batch(["one", "two", "three"], &ModerationOptions::default())
            .await
            .unwrap_err();
        // The third input is never sent.
        assert_eq!(transport.post_count(), 2);
        assert!(matches!(err, Error::Authentication { .. }));
    }

    #[tokio::test]
    async fn health_check_swallows_failures() {
        let transport = Arc::new(ScriptedTransport::new(vec![refused()]));
        let client = client(3, Arc::clone(&transport));
        assert!(!client.health_check().await);
        // No retries for health probes.
        assert_eq!(transport.get_count(), 1);
    }

    #[tokio::test]
    async fn health_check_accepts_200() {
        let transport = Arc::new(ScriptedTransport::new(vec![response(200, "")]));
        let client = client(0, Arc::clone(&transport));
        assert!(client.health_check().await);
    }
}
