//! OpenAI-compatible upstream provider.
//!
//! Forwards completions to any HTTP endpoint that speaks the OpenAI chat
//! API (`POST {base_url}/chat/completions`, `GET {base_url}/models`).
//! Streaming responses are decoded from SSE frames back into provider
//! events, so the gateway re-frames them under its own ids.

use async_stream::stream;
use async_trait::async_trait;
use futures::StreamExt;
use serde_json::Value;

use crate::api::models::Usage;
use crate::core::error::{GatewayError, Result};
use crate::core::sse::SseParser;
use crate::services::provider::{
    ChatProvider, ProviderCompletion, ProviderEvent, ProviderEventStream, ProviderRequest,
};

const DEFAULT_FINISH_REASON: &str = "stop";

#[derive(Debug)]
pub struct OpenAiProvider {
    name: String,
    base_url: String,
    api_key: Option<String>,
    models: Vec<String>,
    client: reqwest::Client,
}

impl OpenAiProvider {
    pub fn new(
        name: impl Into<String>,
        base_url: impl Into<String>,
        api_key: Option<String>,
        models: Vec<String>,
        client: reqwest::Client,
    ) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        OpenAiProvider {
            name: name.into(),
            base_url,
            api_key,
            models,
            client,
        }
    }

    /// Build the upstream request body. Passthrough parameters come first so
    /// the resolved model name and stream flag always win.
    fn request_body(&self, request: &ProviderRequest, stream: bool) -> Result<Value> {
        let mut body = serde_json::Map::new();
        for (key, value) in &request.params {
            body.insert(key.clone(), value.clone());
        }
        body.insert("model".to_string(), Value::String(request.model.clone()));
        body.insert("messages".to_string(), serde_json::to_value(&request.messages)?);
        body.insert("stream".to_string(), Value::Bool(stream));
        Ok(Value::Object(body))
    }

    async fn post_chat(&self, body: &Value) -> Result<reqwest::Response> {
        let url = format!("{}/chat/completions", self.base_url);
        let mut builder = self.client.post(&url).json(body);
        if let Some(key) = &self.api_key {
            builder = builder.bearer_auth(key);
        }

        let response = builder.send().await?;
        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            tracing::warn!(
                provider = %self.name,
                status = %status,
                detail = %truncate(&detail, 512),
                "Upstream completion request failed"
            );
            return Err(GatewayError::Upstream(format!(
                "upstream returned status {}",
                status
            )));
        }

        Ok(response)
    }
}

#[async_trait]
impl ChatProvider for OpenAiProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> &'static str {
        "openai"
    }

    async fn list_models(&self) -> Result<Vec<String>> {
        // Statically configured model lists avoid an upstream round trip.
        if !self.models.is_empty() {
            return Ok(self.models.clone());
        }

        let url = format!("{}/models", self.base_url);
        let mut builder = self.client.get(&url);
        if let Some(key) = &self.api_key {
            builder = builder.bearer_auth(key);
        }

        let response = builder.send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(GatewayError::Upstream(format!(
                "upstream returned status {}",
                status
            )));
        }

        let payload: Value = response.json().await?;
        let names = payload
            .get("data")
            .and_then(Value::as_array)
            .map(|models| {
                models
                    .iter()
                    .filter_map(|m| m.get("id").and_then(Value::as_str))
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();
        Ok(names)
    }

    async fn complete(&self, request: ProviderRequest) -> Result<ProviderCompletion> {
        let body = self.request_body(&request, false)?;
        let response = self.post_chat(&body).await?;
        let payload: Value = response.json().await?;

        let choice = payload
            .get("choices")
            .and_then(|c| c.get(0))
            .ok_or_else(|| {
                GatewayError::Upstream("upstream response is missing choices".to_string())
            })?;

        let content = choice
            .pointer("/message/content")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        let finish_reason = choice
            .get("finish_reason")
            .and_then(Value::as_str)
            .unwrap_or(DEFAULT_FINISH_REASON)
            .to_string();
        let usage = payload
            .get("usage")
            .filter(|u| !u.is_null())
            .and_then(|u| serde_json::from_value::<Usage>(u.clone()).ok());

        Ok(ProviderCompletion {
            content,
            finish_reason,
            usage,
        })
    }

    async fn complete_stream(&self, request: ProviderRequest) -> Result<ProviderEventStream> {
        let body = self.request_body(&request, true)?;
        // The request is sent here, so connection failures surface before
        // the gateway commits to an SSE response.
        let response = self.post_chat(&body).await?;
        let mut upstream = response.bytes_stream();

        let events = stream! {
            let mut parser = SseParser::new();
            let mut finish_reason: Option<String> = None;
            let mut usage: Option<Usage> = None;

            while let Some(chunk) = upstream.next().await {
                let bytes = match chunk {
                    Ok(bytes) => bytes,
                    Err(e) => {
                        yield Err(GatewayError::from(e));
                        return;
                    }
                };

                for event in parser.parse(&bytes) {
                    if event.is_done() {
                        yield Ok(ProviderEvent::Done {
                            finish_reason: finish_reason
                                .take()
                                .unwrap_or_else(|| DEFAULT_FINISH_REASON.to_string()),
                            usage: usage.take(),
                        });
                        return;
                    }

                    let data = match event.data {
                        Some(data) => data,
                        None => continue,
                    };
                    let payload: Value = match serde_json::from_str(&data) {
                        Ok(value) => value,
                        Err(_) => {
                            yield Err(GatewayError::Upstream(
                                "upstream sent a malformed stream payload".to_string(),
                            ));
                            return;
                        }
                    };

                    // Usage may arrive in its own chunk with empty choices.
                    if let Some(parsed) = payload
                        .get("usage")
                        .filter(|u| !u.is_null())
                        .and_then(|u| serde_json::from_value::<Usage>(u.clone()).ok())
                    {
                        usage = Some(parsed);
                    }

                    let choice = match payload.get("choices").and_then(|c| c.get(0)) {
                        Some(choice) => choice,
                        None => continue,
                    };

                    if let Some(text) = choice.pointer("/delta/content").and_then(Value::as_str) {
                        if !text.is_empty() {
                            yield Ok(ProviderEvent::Delta(text.to_string()));
                        }
                    }

                    if let Some(reason) = choice.get("finish_reason").and_then(Value::as_str) {
                        finish_reason = Some(reason.to_string());
                    }
                }
            }

            // Upstream closed without [DONE]; end the stream cleanly anyway.
            yield Ok(ProviderEvent::Done {
                finish_reason: finish_reason
                    .take()
                    .unwrap_or_else(|| DEFAULT_FINISH_REASON.to_string()),
                usage: usage.take(),
            });
        };

        Ok(Box::pin(events))
    }
}

fn truncate(text: &str, max: usize) -> &str {
    match text.char_indices().nth(max) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}
