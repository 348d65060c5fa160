use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::header::RETRY_AFTER;
use reqwest::Client;
use secrecy::ExposeSecret;
use tracing::{debug, info, instrument};

use gantt_core::{Catalog, GatewayError, LlmGateway, Message, NormalizedReply};
use gantt_settings::{ApiKey, LlmSettings};

use crate::converter;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Non-streaming chat-completions client for OpenAI-compatible endpoints.
pub struct OpenAiGateway {
    client: Client,
    endpoint: String,
    api_key: ApiKey,
    model: String,
    reasoning_effort: Option<String>,
    timeout: Duration,
}

impl OpenAiGateway {
    pub fn new(settings: &LlmSettings, api_key: ApiKey) -> Result<Self, GatewayError> {
        let timeout = Duration::from_millis(settings.timeout_ms);
        let client = Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .timeout(timeout)
            .build()
            .map_err(|e| GatewayError::NetworkError(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            endpoint: format!("{}/chat/completions", settings.base_url.trim_end_matches('/')),
            api_key,
            model: settings.model.clone(),
            reasoning_effort: settings.reasoning_effort.clone(),
            timeout,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl LlmGateway for OpenAiGateway {
    fn name(&self) -> &str {
        "openai"
    }

    fn model(&self) -> &str {
        &self.model
    }

    #[instrument(skip_all, fields(model = %self.model))]
    async fn complete(
        &self,
        messages: &[Message],
        catalog: &Catalog,
    ) -> Result<NormalizedReply, GatewayError> {
        let body = converter::build_request_body(
            messages,
            catalog,
            &self.model,
            self.reasoning_effort.as_deref(),
        );

        info!(messages = messages.len(), "calling llm");
        let started = Instant::now();

        let resp = self
            .client
            .post(&self.endpoint)
            .bearer_auth(self.api_key.0.expose_secret())
            .json(&body)
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;

        let status = resp.status();
        if !status.is_success() {
            let retry_after = resp
                .headers()
                .get(RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.trim().parse::<u64>().ok())
                .map(Duration::from_secs);
            let body = resp.text().await.unwrap_or_default();
            return Err(match GatewayError::from_status(status.as_u16(), body) {
                GatewayError::RateLimited { .. } => GatewayError::RateLimited { retry_after },
                other => other,
            });
        }

        let text = resp.text().await.map_err(|e| self.transport_error(e))?;
        let reply = converter::parse_response(&text)?;

        info!(
            elapsed_ms = started.elapsed().as_millis() as u64,
            has_text = reply.assistant_text.is_some(),
            tool = reply.tool_call.as_ref().map(|c| c.name.as_str()),
            "got llm reply"
        );
        if let Some(usage) = &reply.usage {
            info!(
                prompt_tokens = usage.prompt_tokens,
                completion_tokens = usage.completion_tokens,
                total_tokens = usage.total_tokens,
                "token usage"
            );
        }
        debug!(text = ?reply.assistant_text, call = ?reply.tool_call, "llm output");

        Ok(reply)
    }
}

impl OpenAiGateway {
    fn transport_error(&self, e: reqwest::Error) -> GatewayError {
        if e.is_timeout() {
            GatewayError::Timeout(self.timeout)
        } else {
            GatewayError::NetworkError(e.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::SecretString;
    use serde_json::json;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn gateway(base_url: &str, timeout_ms: u64) -> OpenAiGateway {
        let settings = LlmSettings {
            base_url: base_url.to_string(),
            model: "gpt-5-nano".into(),
            reasoning_effort: Some("low".into()),
            timeout_ms,
        };
        OpenAiGateway::new(&settings, ApiKey(SecretString::from("sk-test"))).unwrap()
    }

    fn history() -> Vec<Message> {
        vec![Message::priming("p"), Message::user("zoom to weeks")]
    }

    #[test]
    fn endpoint_strips_trailing_slash() {
        let gw = gateway("http://localhost:9/v1/", 1000);
        assert_eq!(gw.endpoint(), "http://localhost:9/v1/chat/completions");
        assert_eq!(gw.name(), "openai");
        assert_eq!(gw.model(), "gpt-5-nano");
    }

    #[tokio::test]
    async fn tool_call_reply() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .and(header("authorization", "Bearer sk-test"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "choices": [{"message": {"role": "assistant", "content": null, "tool_calls": [{
                    "id": "call_1",
                    "type": "function",
                    "function": {"name": "zoom", "arguments": "{\"level\":\"week\"}"}
                }]}}],
                "usage": {"prompt_tokens": 100, "completion_tokens": 10, "total_tokens": 110}
            })))
            .expect(1)
            .mount(&server)
            .await;

        let gw = gateway(&format!("{}/v1", server.uri()), 5000);
        let catalog = Catalog::builtin().unwrap();
        let reply = gw.complete(&history(), &catalog).await.unwrap();

        let call = reply.tool_call.unwrap();
        assert_eq!(call.name, "zoom");
        assert_eq!(call.arguments, json!({"level": "week"}));
        assert_eq!(reply.usage.unwrap().total_tokens, 110);

        let requests = server.received_requests().await.unwrap();
        let sent: serde_json::Value = serde_json::from_slice(&requests[0].body).unwrap();
        assert_eq!(sent["model"], "gpt-5-nano");
        assert_eq!(sent["reasoning_effort"], "low");
        assert_eq!(sent["messages"][0]["role"], "system");
        assert_eq!(sent["messages"][1]["content"], "zoom to weeks");
        assert_eq!(sent["tools"].as_array().unwrap().len(), catalog.len());
    }

    #[tokio::test]
    async fn unauthorized_maps_to_authentication_failed() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(401).set_body_string("bad key"))
            .mount(&server)
            .await;

        let gw = gateway(&server.uri(), 5000);
        let err = gw
            .complete(&history(), &Catalog::builtin().unwrap())
            .await
            .unwrap_err();
        assert!(matches!(err, GatewayError::AuthenticationFailed(body) if body == "bad key"));
    }

    #[tokio::test]
    async fn rate_limit_carries_retry_after() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(429).insert_header("retry-after", "7"))
            .mount(&server)
            .await;

        let gw = gateway(&server.uri(), 5000);
        let err = gw
            .complete(&history(), &Catalog::builtin().unwrap())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            GatewayError::RateLimited { retry_after: Some(d) } if d == Duration::from_secs(7)
        ));
    }

    #[tokio::test]
    async fn server_error_and_single_attempt() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(503).set_body_string("overloaded"))
            .expect(1)
            .mount(&server)
            .await;

        let gw = gateway(&server.uri(), 5000);
        let err = gw
            .complete(&history(), &Catalog::builtin().unwrap())
            .await
            .unwrap_err();
        assert!(matches!(err, GatewayError::ServerError { status: 503, .. }));
    }

    #[tokio::test]
    async fn slow_provider_times_out() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_delay(Duration::from_secs(3))
                    .set_body_json(json!({"choices": []})),
            )
            .mount(&server)
            .await;

        let gw = gateway(&server.uri(), 200);
        let err = gw
            .complete(&history(), &Catalog::builtin().unwrap())
            .await
            .unwrap_err();
        assert!(matches!(err, GatewayError::Timeout(_)), "{err:?}");
    }

    #[tokio::test]
    async fn garbage_body_is_invalid_response() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>oops</html>"))
            .mount(&server)
            .await;

        let gw = gateway(&server.uri(), 5000);
        let err = gw
            .complete(&history(), &Catalog::builtin().unwrap())
            .await
            .unwrap_err();
        assert!(matches!(err, GatewayError::InvalidResponse(_)));
    }

    #[tokio::test]
    async fn unreachable_host_is_network_error() {
        let gw = gateway("http://127.0.0.1:1", 2000);
        let err = gw
            .complete(&history(), &Catalog::builtin().unwrap())
            .await
            .unwrap_err();
        assert!(matches!(err, GatewayError::NetworkError(_) | GatewayError::Timeout(_)));
    }
}
