use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::{info_span, warn, Instrument};

use crate::error::ModelError;
use crate::resilience::{with_retry, CircuitBreakerRegistry, RetryConfig};
use crate::types::{Message, ModelResponse, QueryParams};

/// Contract: uniform async request/response to a model gateway, with
/// retries, a circuit breaker per model id, and cooperative cancellation
/// (spec §4.6).
#[async_trait]
pub trait ModelClient: Send + Sync {
    async fn query(
        &self,
        model_id: &str,
        messages: &[Message],
        params: &QueryParams,
        cancel: CancellationToken,
    ) -> Result<ModelResponse, ModelError>;

    /// Fans out to every model id concurrently. Never raises: each entry is
    /// either `Ok` or the error that model ultimately failed with.
    async fn query_parallel(
        &self,
        model_ids: &[String],
        messages: &[Message],
        params: &QueryParams,
        cancel: CancellationToken,
    ) -> HashMap<String, Result<ModelResponse, ModelError>> {
        let futures = model_ids.iter().map(|model_id| {
            let cancel = cancel.clone();
            async move {
                let result = self.query(model_id, messages, params, cancel).await;
                (model_id.clone(), result)
            }
        });
        futures::future::join_all(futures).await.into_iter().collect()
    }
}

/// HTTP-backed client talking to an OpenAI-compatible chat completion
/// gateway.
pub struct HttpModelClient {
    client: reqwest::Client,
    base_url: String,
    retry: RetryConfig,
    breakers: CircuitBreakerRegistry,
}

impl HttpModelClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
            retry: RetryConfig::default(),
            breakers: CircuitBreakerRegistry::default(),
        }
    }

    pub fn with_retry_config(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    fn classify_transport_error(err: &reqwest::Error) -> ModelError {
        if err.is_timeout() || err.is_connect() {
            return ModelError::Transient(err.to_string());
        }
        match err.status() {
            Some(status) if status.is_server_error() || status.as_u16() == 429 => {
                ModelError::Transient(format!("status {status}"))
            }
            Some(status) => ModelError::Permanent(format!("status {status}")),
            None => ModelError::Transient(err.to_string()),
        }
    }

    async fn send_once(
        &self,
        model_id: &str,
        messages: &[Message],
        params: &QueryParams,
    ) -> Result<ModelResponse, ModelError> {
        let body = serde_json::json!({
            "model": model_id,
            "messages": messages.iter().map(|m| serde_json::json!({
                "role": match m.role {
                    crate::types::Role::System => "system",
                    crate::types::Role::User => "user",
                    crate::types::Role::Assistant => "assistant",
                },
                "content": m.content,
            })).collect::<Vec<_>>(),
            "temperature": params.temperature,
            "max_tokens": params.max_tokens,
        });

        let response = self
            .client
            .post(format!("{}/v1/chat/completions", self.base_url))
            .timeout(Duration::from_millis(params.timeout_ms))
            .json(&body)
            .send()
            .await
            .map_err(|e| Self::classify_transport_error(&e))?;

        if !response.status().is_success() {
            let status = response.status();
            return if status.is_server_error() || status.as_u16() == 429 {
                Err(ModelError::Transient(format!("gateway status {status}")))
            } else if status.as_u16() == 401 || status.as_u16() == 403 {
                Err(ModelError::Permanent(format!("auth rejected: {status}")))
            } else {
                Err(ModelError::Permanent(format!("gateway status {status}")))
            };
        }

        let parsed: serde_json::Value = response
            .json()
            .await
            .map_err(|e| ModelError::Permanent(format!("malformed response: {e}")))?;
        let content = parsed["choices"][0]["message"]["content"]
            .as_str()
            .ok_or_else(|| ModelError::Permanent("missing choices[0].message.content".to_string()))?
            .to_string();

        Ok(ModelResponse { content, model_id: model_id.to_string() })
    }
}

#[async_trait]
impl ModelClient for HttpModelClient {
    async fn query(
        &self,
        model_id: &str,
        messages: &[Message],
        params: &QueryParams,
        cancel: CancellationToken,
    ) -> Result<ModelResponse, ModelError> {
        let span = info_span!("model_query", model_id = %model_id);
        async {
            let breaker = self.breakers.get(model_id);
            breaker.admit()?;

            let attempt_result = with_retry(&self.retry, |_attempt| {
                let cancel = cancel.clone();
                async {
                    tokio::select! {
                        biased;
                        _ = cancel.cancelled() => Err(ModelError::Cancelled),
                        result = self.send_once(model_id, messages, params) => result,
                    }
                }
            })
            .await;

            match &attempt_result {
                Ok(_) => breaker.record_success(),
                Err(ModelError::Cancelled) => {}
                Err(_) => breaker.record_failure(),
            }
            if let Err(err) = &attempt_result {
                warn!(model_id = %model_id, error = %err, "model query failed");
            }
            attempt_result
        }
        .instrument(span)
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    struct CountingStub {
        calls: Arc<AtomicU32>,
        fail_times: u32,
    }

    #[async_trait]
    impl ModelClient for CountingStub {
        async fn query(
            &self,
            model_id: &str,
            _messages: &[Message],
            _params: &QueryParams,
            _cancel: CancellationToken,
        ) -> Result<ModelResponse, ModelError> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            if n < self.fail_times {
                Err(ModelError::Transient("not yet".into()))
            } else {
                Ok(ModelResponse { content: "ok".into(), model_id: model_id.to_string() })
            }
        }
    }

    #[tokio::test]
    async fn query_parallel_returns_partial_results_without_raising() {
        struct FlakyClient;

        #[async_trait]
        impl ModelClient for FlakyClient {
            async fn query(
                &self,
                model_id: &str,
                _messages: &[Message],
                _params: &QueryParams,
                _cancel: CancellationToken,
            ) -> Result<ModelResponse, ModelError> {
                if model_id == "bad-model" {
                    Err(ModelError::Permanent("quota exhausted".into()))
                } else {
                    Ok(ModelResponse { content: "ok".into(), model_id: model_id.to_string() })
                }
            }
        }

        let client = FlakyClient;
        let model_ids = vec!["good-model".to_string(), "bad-model".to_string()];
        let results = client
            .query_parallel(&model_ids, &[Message::user("hi")], &QueryParams::default(), CancellationToken::new())
            .await;

        assert!(results["good-model"].is_ok());
        assert!(results["bad-model"].is_err());
    }

    #[tokio::test]
    async fn cancelled_token_wins_the_select_over_a_pending_call() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        let pending = std::future::pending::<Result<ModelResponse, ModelError>>();
        let result = tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(ModelError::Cancelled),
            result = pending => result,
        };
        assert!(matches!(result, Err(ModelError::Cancelled)));
    }

    #[tokio::test]
    async fn stub_retries_until_it_stops_failing() {
        let stub = CountingStub { calls: Arc::new(AtomicU32::new(0)), fail_times: 1 };
        let result = with_retry(&RetryConfig { max_retries: 3, base_delay_ms: 1, max_delay_ms: 2 }, |_attempt| {
            stub.query("m1", &[], &QueryParams::default(), CancellationToken::new())
        })
        .await;
        assert!(result.is_ok());
    }
}
