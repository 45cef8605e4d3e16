//! OpenAI-compatible chat completions client.
//!
//! `complete` posts a non-streaming request capped at `llm.timeout_secs`.
//! `stream` posts with `"stream": true` and parses the Server-Sent Events
//! body line by line: `data: {json}` lines carry `choices[0].delta.content`
//! fragments and `data: [DONE]` ends the answer. The same timeout bounds
//! the wait for response headers and every gap between body chunks.
//!
//! A body that errors, stalls, or closes before `[DONE]` ends the fragment
//! stream with [`RagError::StreamInterrupted`]. Fragments already yielded
//! stay valid.

use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use serde_json::Value;

use mishkat_core::llm::{CompletionRequest, FragmentStream, LanguageModel};
use mishkat_core::{RagError, Result};

use crate::config::LlmConfig;
use crate::http;

const SERVICE: &str = "llm";

pub struct OpenAIChat {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
    model: String,
    timeout: Duration,
}

impl OpenAIChat {
    pub fn new(config: &LlmConfig) -> anyhow::Result<Self> {
        let api_key = config.require_api_key()?;
        Ok(Self {
            // No client-wide timeout: it would cut off long streams.
            client: http::build_client(SERVICE, None)?,
            endpoint: format!("{}/chat/completions", config.base_url.trim_end_matches('/')),
            api_key,
            model: config.model.clone(),
            timeout: Duration::from_secs(config.timeout_secs),
        })
    }

    fn request_body(&self, request: &CompletionRequest, stream: bool) -> Value {
        serde_json::json!({
            "model": self.model,
            "messages": request.messages,
            "temperature": request.temperature,
            "stream": stream,
        })
    }
}

#[async_trait]
impl LanguageModel for OpenAIChat {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn complete(&self, request: &CompletionRequest) -> Result<String> {
        let body = self.request_body(request, false);
        let response = http::send_with_retry(SERVICE, self.timeout, 0, || {
            self.client
                .post(&self.endpoint)
                .bearer_auth(&self.api_key)
                .timeout(self.timeout)
                .json(&body)
        })
        .await?;
        let json = http::read_json(SERVICE, response).await?;
        parse_completion(&json)
    }

    async fn stream(&self, request: &CompletionRequest) -> Result<FragmentStream> {
        let body = self.request_body(request, true);
        let send = http::send_with_retry(SERVICE, self.timeout, 0, || {
            self.client
                .post(&self.endpoint)
                .bearer_auth(&self.api_key)
                .json(&body)
        });
        let response = tokio::time::timeout(self.timeout, send)
            .await
            .map_err(|_| RagError::TimedOut {
                service: SERVICE,
                after: self.timeout,
            })??;

        let idle = self.timeout;
        let mut body = Box::pin(response.bytes_stream());

        let fragments = async_stream::stream! {
            let mut buffer: Vec<u8> = Vec::new();
            loop {
                let next = match tokio::time::timeout(idle, body.next()).await {
                    Ok(next) => next,
                    Err(_) => {
                        yield Err(RagError::StreamInterrupted(format!("no data received for {:?}", idle)));
                        return;
                    }
                };
                match next {
                    Some(Ok(bytes)) => {
                        buffer.extend_from_slice(&bytes);
                        // Decode whole lines only so multi-byte characters never split.
                        while let Some(pos) = buffer.iter().position(|b| *b == b'\n') {
                            let raw: Vec<u8> = buffer.drain(..=pos).collect();
                            let line = String::from_utf8_lossy(&raw);
                            match parse_sse_line(&line) {
                                SseLine::Fragment(text) => yield Ok(text),
                                SseLine::Skip => {}
                                SseLine::Done => return,
                                SseLine::Error(message) => {
                                    yield Err(RagError::StreamInterrupted(message));
                                    return;
                                }
                            }
                        }
                    }
                    Some(Err(e)) => {
                        yield Err(RagError::StreamInterrupted(e.to_string()));
                        return;
                    }
                    None => {
                        let line = String::from_utf8_lossy(&buffer).into_owned();
                        match parse_sse_line(&line) {
                            SseLine::Fragment(text) => yield Ok(text),
                            SseLine::Done => return,
                            _ => {}
                        }
                        yield Err(RagError::StreamInterrupted(
                            "stream closed before [DONE]".to_string(),
                        ));
                        return;
                    }
                }
            }
        };

        Ok(Box::pin(fragments))
    }
}

fn parse_completion(json: &Value) -> Result<String> {
    if let Some(message) = api_error(json) {
        return Err(RagError::service(SERVICE, None, message));
    }
    json.pointer("/choices/0/message/content")
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| RagError::service(SERVICE, None, "response has no choices[0].message.content"))
}

fn api_error(json: &Value) -> Option<String> {
    let err = json.get("error")?;
    Some(
        err.get("message")
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| err.to_string()),
    )
}

#[derive(Debug, PartialEq, Eq)]
enum SseLine {
    Fragment(String),
    Skip,
    Done,
    Error(String),
}

fn parse_sse_line(line: &str) -> SseLine {
    let line = line.trim_end_matches(['\r', '\n']);
    let Some(data) = line.strip_prefix("data:") else {
        // Blank separators, comments, `event:` and `id:` fields.
        return SseLine::Skip;
    };
    let data = data.strip_prefix(' ').unwrap_or(data);
    if data.trim() == "[DONE]" {
        return SseLine::Done;
    }

    let json: Value = match serde_json::from_str(data) {
        Ok(json) => json,
        Err(e) => return SseLine::Error(format!("malformed stream event: {}", e)),
    };
    if let Some(message) = api_error(&json) {
        return SseLine::Error(message);
    }
    match json
        .pointer("/choices/0/delta/content")
        .and_then(Value::as_str)
    {
        Some(text) if !text.is_empty() => SseLine::Fragment(text.to_string()),
        _ => SseLine::Skip,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mishkat_core::models::ChatMessage;

    #[test]
    fn parses_content_delta() {
        let line = r#"data: {"id":"1","choices":[{"index":0,"delta":{"content":"Sal"}}]}"#;
        assert_eq!(parse_sse_line(line), SseLine::Fragment("Sal".to_string()));
    }

    #[test]
    fn preserves_whitespace_in_fragments() {
        let line = "data: {\"choices\":[{\"delta\":{\"content\":\" ah \"}}]}\r\n";
        assert_eq!(parse_sse_line(line), SseLine::Fragment(" ah ".to_string()));
    }

    #[test]
    fn role_only_and_empty_deltas_are_skipped() {
        let line = r#"data: {"choices":[{"delta":{"role":"assistant"}}]}"#;
        assert_eq!(parse_sse_line(line), SseLine::Skip);
        let line = r#"data: {"choices":[{"delta":{"content":""},"finish_reason":"stop"}]}"#;
        assert_eq!(parse_sse_line(line), SseLine::Skip);
    }

    #[test]
    fn done_and_non_data_lines() {
        assert_eq!(parse_sse_line("data: [DONE]"), SseLine::Done);
        assert_eq!(parse_sse_line("data:[DONE]\n"), SseLine::Done);
        assert_eq!(parse_sse_line(""), SseLine::Skip);
        assert_eq!(parse_sse_line(": keep-alive"), SseLine::Skip);
        assert_eq!(parse_sse_line("event: message"), SseLine::Skip);
    }

    #[test]
    fn error_events_interrupt() {
        let line = r#"data: {"error":{"message":"overloaded","type":"server_error"}}"#;
        assert_eq!(parse_sse_line(line), SseLine::Error("overloaded".to_string()));
        assert!(matches!(parse_sse_line("data: {not json"), SseLine::Error(_)));
    }

    #[test]
    fn parses_non_streaming_completion() {
        let json = serde_json::json!({
            "choices": [{"index": 0, "message": {"role": "assistant", "content": "Answer."}}]
        });
        assert_eq!(parse_completion(&json).unwrap(), "Answer.");
        let err = parse_completion(&serde_json::json!({"error": {"message": "bad"}})).unwrap_err();
        assert!(err.to_string().contains("bad"));
    }

    #[test]
    fn request_body_carries_system_prompt_per_call() {
        let config = LlmConfig {
            api_key: Some("sk-test".to_string()),
            ..LlmConfig::default()
        };
        let llm = OpenAIChat::new(&config).unwrap();
        let request = CompletionRequest::new(
            vec![ChatMessage::system("sys"), ChatMessage::user("q")],
            0.7,
        );
        let body = llm.request_body(&request, true);
        assert_eq!(body["model"], "gpt-4o");
        assert_eq!(body["stream"], true);
        assert_eq!(body["messages"][0]["role"], "system");
        assert_eq!(body["messages"][0]["content"], "sys");
        assert_eq!(body["messages"][1]["role"], "user");
    }
}
