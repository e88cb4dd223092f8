//! Minimal GRS AI API client.
//!
//! This crate provides a focused client for the two GRS AI endpoints the
//! story engine talks to:
//! - OpenAI-style chat completions, with text and image-url message parts
//! - The nano-banana draw endpoint, which answers with an SSE progress stream

use futures::StreamExt;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use serde::{Deserialize, Serialize};
use std::pin::Pin;
use std::time::Duration;
use thiserror::Error;
use tokio_stream::Stream;

const DEFAULT_BASE_URL: &str = "https://api.grsai.com";
const DEFAULT_CHAT_MODEL: &str = "gemini-2.5-flash-lite";
const DEFAULT_DRAW_MODEL: &str = "nano-banana-fast";
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(120);

/// Errors that can occur when using the GRS AI client.
#[derive(Debug, Error)]
pub enum Error {
    #[error("API key not configured")]
    NoApiKey,

    #[error("Network error: {0}")]
    Network(String),

    #[error("Request timed out")]
    Timeout,

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("Failed to parse response: {0}")]
    Parse(String),

    #[error("Draw task failed: {0}")]
    Draw(String),

    #[error("Invalid configuration: {0}")]
    Config(String),
}

impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            Error::Timeout
        } else {
            Error::Network(e.to_string())
        }
    }
}

/// GRS AI API client.
#[derive(Clone)]
pub struct GrsAi {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    chat_model: String,
    draw_model: String,
}

impl GrsAi {
    /// Create a new client with the given API key and the default timeout.
    pub fn new(api_key: impl Into<String>) -> Self {
        Self::with_timeout(api_key, DEFAULT_TIMEOUT)
    }

    /// Create a new client whose requests give up after `timeout`.
    pub fn with_timeout(api_key: impl Into<String>, timeout: Duration) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .connect_timeout(Duration::from_secs(30))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self {
            client,
            api_key: api_key.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
            chat_model: DEFAULT_CHAT_MODEL.to_string(),
            draw_model: DEFAULT_DRAW_MODEL.to_string(),
        }
    }

    /// Create a client from the GRS_AI_API_KEY environment variable.
    pub fn from_env() -> Result<Self, Error> {
        let api_key = std::env::var("GRS_AI_API_KEY").map_err(|_| Error::NoApiKey)?;
        Ok(Self::new(api_key))
    }

    /// Point the client at a different API host.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// Set the default chat model.
    pub fn with_chat_model(mut self, model: impl Into<String>) -> Self {
        self.chat_model = model.into();
        self
    }

    /// Set the default draw model.
    pub fn with_draw_model(mut self, model: impl Into<String>) -> Self {
        self.draw_model = model.into();
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Send a chat completion request and return the full response.
    pub async fn chat(&self, request: ChatRequest) -> Result<ChatResponse, Error> {
        let api_request = self.build_chat_request(&request);
        let headers = self.build_headers()?;

        let response = self
            .client
            .post(format!("{}/v1/chat/completions", self.base_url))
            .headers(headers)
            .json(&api_request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Api {
                status,
                message: body,
            });
        }

        let api_response: ApiChatResponse = response
            .json()
            .await
            .map_err(|e| Error::Parse(e.to_string()))?;

        Ok(parse_chat_response(api_response))
    }

    /// Start a draw task and stream its progress events.
    pub async fn draw(
        &self,
        request: DrawRequest,
    ) -> Result<Pin<Box<dyn Stream<Item = Result<DrawEvent, Error>> + Send>>, Error> {
        let api_request = ApiDrawRequest {
            model: request.model.unwrap_or_else(|| self.draw_model.clone()),
            prompt: request.prompt,
        };
        let headers = self.build_headers()?;

        let response = self
            .client
            .post(format!("{}/v1/draw/nano-banana", self.base_url))
            .headers(headers)
            .json(&api_request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Api {
                status,
                message: body,
            });
        }

        // Keep a buffer across chunks so events split mid-line are not lost
        let stream = response
            .bytes_stream()
            .scan(Vec::<u8>::new(), |buffer, result| {
                let events = match result {
                    Ok(bytes) => {
                        buffer.extend_from_slice(&bytes);
                        parse_draw_events_buffered(buffer)
                    }
                    Err(e) => vec![Err(Error::from(e))],
                };
                futures::future::ready(Some(events))
            })
            .flat_map(futures::stream::iter);

        Ok(Box::pin(stream))
    }

    /// Run a draw task to completion and return the first result URL.
    ///
    /// Progress events are consumed silently; only the terminal status matters.
    pub async fn draw_to_completion(&self, request: DrawRequest) -> Result<String, Error> {
        let mut stream = self.draw(request).await?;

        while let Some(event) = stream.next().await {
            match event? {
                DrawEvent::Progress { task_id, percent } => {
                    tracing::trace!(?task_id, percent, "draw progress");
                }
                DrawEvent::Succeeded { urls, .. } => {
                    return urls
                        .into_iter()
                        .next()
                        .ok_or_else(|| Error::Draw("no result url".to_string()));
                }
                DrawEvent::Failed { message, .. } => return Err(Error::Draw(message)),
            }
        }

        Err(Error::Draw("stream ended without a result".to_string()))
    }

    fn build_headers(&self) -> Result<HeaderMap, Error> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {}", self.api_key))
                .map_err(|e| Error::Config(format!("Invalid API key: {e}")))?,
        );
        Ok(headers)
    }

    fn build_chat_request(&self, request: &ChatRequest) -> ApiChatRequest {
        let messages = request
            .messages
            .iter()
            .map(|m| ApiMessage {
                role: match m.role {
                    Role::System => "system".to_string(),
                    Role::User => "user".to_string(),
                    Role::Assistant => "assistant".to_string(),
                },
                content: m.content.iter().map(ApiContentPart::from).collect(),
            })
            .collect();

        ApiChatRequest {
            model: request
                .model
                .clone()
                .unwrap_or_else(|| self.chat_model.clone()),
            messages,
            temperature: request.temperature,
            max_tokens: request.max_tokens,
        }
    }
}

fn parse_chat_response(api_response: ApiChatResponse) -> ChatResponse {
    let content = api_response
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.message.content)
        .unwrap_or_default();

    ChatResponse {
        id: api_response.id.unwrap_or_default(),
        model: api_response.model.unwrap_or_default(),
        content,
        usage: api_response.usage.map(|u| Usage {
            prompt_tokens: u.prompt_tokens,
            completion_tokens: u.completion_tokens,
        }),
    }
}

// ============================================================================
// Public types
// ============================================================================

/// A chat completion request.
#[derive(Debug, Clone)]
pub struct ChatRequest {
    pub model: Option<String>,
    pub messages: Vec<Message>,
    pub temperature: Option<f32>,
    pub max_tokens: Option<usize>,
}

impl ChatRequest {
    /// Create a new request with the given messages.
    pub fn new(messages: Vec<Message>) -> Self {
        Self {
            model: None,
            messages,
            temperature: None,
            max_tokens: None,
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: usize) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }
}

/// A message in the conversation.
#[derive(Debug, Clone)]
pub struct Message {
    pub role: Role,
    pub content: Vec<ContentPart>,
}

impl Message {
    /// Create a user message with text content.
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: vec![ContentPart::Text { text: text.into() }],
        }
    }

    /// Create a user message carrying text followed by an image reference.
    pub fn user_with_image(text: impl Into<String>, image_url: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: vec![
                ContentPart::Text { text: text.into() },
                ContentPart::ImageUrl {
                    url: image_url.into(),
                },
            ],
        }
    }

    /// Create a system message.
    pub fn system(text: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: vec![ContentPart::Text { text: text.into() }],
        }
    }
}

/// The role of a message sender.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    System,
    User,
    Assistant,
}

/// A part of a message body.
#[derive(Debug, Clone)]
pub enum ContentPart {
    Text { text: String },
    ImageUrl { url: String },
}

/// A chat completion response.
#[derive(Debug, Clone)]
pub struct ChatResponse {
    pub id: String,
    pub model: String,
    /// Text of the first choice. Empty when the API returned no choices.
    pub content: String,
    pub usage: Option<Usage>,
}

/// Token usage information.
#[derive(Debug, Clone)]
pub struct Usage {
    pub prompt_tokens: usize,
    pub completion_tokens: usize,
}

/// A draw request.
#[derive(Debug, Clone)]
pub struct DrawRequest {
    pub model: Option<String>,
    pub prompt: String,
}

impl DrawRequest {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            model: None,
            prompt: prompt.into(),
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }
}

/// Events from a draw task stream.
#[derive(Debug, Clone, PartialEq)]
pub enum DrawEvent {
    Progress {
        task_id: Option<String>,
        percent: u8,
    },
    Succeeded {
        task_id: Option<String>,
        urls: Vec<String>,
    },
    Failed {
        task_id: Option<String>,
        message: String,
    },
}

// ============================================================================
// Internal API types
// ============================================================================

#[derive(Debug, Serialize)]
struct ApiChatRequest {
    model: String,
    messages: Vec<ApiMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<usize>,
}

#[derive(Debug, Serialize)]
struct ApiMessage {
    role: String,
    content: Vec<ApiContentPart>,
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ApiContentPart {
    Text { text: String },
    ImageUrl { image_url: ApiImageUrl },
}

impl From<&ContentPart> for ApiContentPart {
    fn from(part: &ContentPart) -> Self {
        match part {
            ContentPart::Text { text } => ApiContentPart::Text { text: text.clone() },
            ContentPart::ImageUrl { url } => ApiContentPart::ImageUrl {
                image_url: ApiImageUrl { url: url.clone() },
            },
        }
    }
}

#[derive(Debug, Serialize)]
struct ApiImageUrl {
    url: String,
}

#[derive(Debug, Deserialize)]
struct ApiChatResponse {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    model: Option<String>,
    #[serde(default)]
    choices: Vec<ApiChoice>,
    #[serde(default)]
    usage: Option<ApiUsage>,
}

#[derive(Debug, Deserialize)]
struct ApiChoice {
    message: ApiChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ApiChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiUsage {
    #[serde(default)]
    prompt_tokens: usize,
    #[serde(default)]
    completion_tokens: usize,
}

#[derive(Debug, Serialize)]
struct ApiDrawRequest {
    model: String,
    prompt: String,
}

#[derive(Debug, Deserialize)]
struct ApiDrawEvent {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    progress: Option<f64>,
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    results: Vec<ApiDrawResult>,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    failure_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiDrawResult {
    url: String,
}

/// Parse draw events from a byte buffer, consuming complete lines and
/// leaving incomplete data for the next chunk.
///
/// Lines are decoded only once complete, so multi-byte characters split
/// across chunks survive. Lines that are not `data:` lines, or whose payload
/// is not valid JSON, are dropped. The draw endpoint interleaves keep-alive
/// noise with its events.
fn parse_draw_events_buffered(buffer: &mut Vec<u8>) -> Vec<Result<DrawEvent, Error>> {
    let mut events = Vec::new();

    while let Some(newline_pos) = buffer.iter().position(|&b| b == b'\n') {
        let line: Vec<u8> = buffer.drain(..=newline_pos).collect();
        let line = String::from_utf8_lossy(&line);
        let line = line.trim_end_matches(['\n', '\r']);

        let Some(json_str) = line.strip_prefix("data:").map(str::trim_start) else {
            continue;
        };
        if json_str.is_empty() || json_str == "[DONE]" {
            continue;
        }

        match serde_json::from_str::<ApiDrawEvent>(json_str) {
            Ok(event) => {
                if let Some(event) = convert_draw_event(event) {
                    events.push(Ok(event));
                }
            }
            Err(e) => tracing::debug!(error = %e, line = json_str, "skipping unparsable draw event"),
        }
    }

    events
}

fn convert_draw_event(event: ApiDrawEvent) -> Option<DrawEvent> {
    match event.status.as_deref() {
        Some("succeeded") => Some(DrawEvent::Succeeded {
            task_id: event.id,
            urls: event.results.into_iter().map(|r| r.url).collect(),
        }),
        Some("failed") => Some(DrawEvent::Failed {
            task_id: event.id,
            message: event
                .message
                .filter(|m| !m.is_empty())
                .or(event.failure_reason)
                .unwrap_or_else(|| "unknown error".to_string()),
        }),
        _ => event.progress.map(|p| DrawEvent::Progress {
            task_id: event.id,
            // The API reports either a 0-1 fraction or a 0-100 percentage
            percent: (if p <= 1.0 { p * 100.0 } else { p }).clamp(0.0, 100.0) as u8,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_creation() {
        let client = GrsAi::new("test-key");
        assert_eq!(client.chat_model, DEFAULT_CHAT_MODEL);
        assert_eq!(client.draw_model, DEFAULT_DRAW_MODEL);
        assert_eq!(client.base_url(), DEFAULT_BASE_URL);
    }

    #[test]
    fn test_client_builders() {
        let client = GrsAi::new("test-key")
            .with_base_url("http://localhost:9000/")
            .with_chat_model("gemini-2.5-pro")
            .with_draw_model("nano-banana");
        assert_eq!(client.base_url(), "http://localhost:9000");
        assert_eq!(client.chat_model, "gemini-2.5-pro");
        assert_eq!(client.draw_model, "nano-banana");
    }

    #[test]
    fn test_chat_request_serialization() {
        let client = GrsAi::new("test-key");
        let request = ChatRequest::new(vec![Message::user_with_image(
            "Describe this",
            "https://example.com/cat.png",
        )])
        .with_temperature(0.7)
        .with_max_tokens(2000);

        let json = serde_json::to_value(client.build_chat_request(&request)).unwrap();
        assert_eq!(json["model"], DEFAULT_CHAT_MODEL);
        assert_eq!(json["max_tokens"], 2000);
        assert_eq!(json["messages"][0]["role"], "user");
        assert_eq!(json["messages"][0]["content"][0]["type"], "text");
        assert_eq!(json["messages"][0]["content"][1]["type"], "image_url");
        assert_eq!(
            json["messages"][0]["content"][1]["image_url"]["url"],
            "https://example.com/cat.png"
        );
    }

    #[test]
    fn test_parse_chat_response_without_choices() {
        let api: ApiChatResponse = serde_json::from_str(r#"{"id":"x","choices":[]}"#).unwrap();
        let response = parse_chat_response(api);
        assert_eq!(response.id, "x");
        assert!(response.content.is_empty());
    }

    #[test]
    fn test_draw_events_across_chunks() {
        let mut buffer = b"data: {\"id\":\"t1\",\"progress\":0.5,\"status\":\"running\"}\n".to_vec();
        buffer.extend_from_slice(b"data: {\"id\":\"t1\",\"status\":\"succ");

        let events = parse_draw_events_buffered(&mut buffer);
        assert_eq!(events.len(), 1);
        assert!(matches!(
            events[0],
            Ok(DrawEvent::Progress { percent: 50, .. })
        ));

        buffer.extend_from_slice(b"eeded\",\"results\":[{\"url\":\"https://img/1.png\"}]}\n");
        let events = parse_draw_events_buffered(&mut buffer);
        assert_eq!(events.len(), 1);
        match &events[0] {
            Ok(DrawEvent::Succeeded { urls, .. }) => assert_eq!(urls, &["https://img/1.png"]),
            other => panic!("unexpected event: {other:?}"),
        }
        assert!(buffer.is_empty());
    }

    #[test]
    fn test_truncated_event_line_does_not_block_later_events() {
        let mut buffer = b"data: {\"id\":\"t1\",\"progress\":\n".to_vec();
        buffer.extend_from_slice(
            b"data: {\"id\":\"t1\",\"status\":\"succeeded\",\"results\":[{\"url\":\"https://img/2.png\"}]}\n",
        );

        let events = parse_draw_events_buffered(&mut buffer);
        assert_eq!(events.len(), 1);
        match &events[0] {
            Ok(DrawEvent::Succeeded { urls, .. }) => assert_eq!(urls, &["https://img/2.png"]),
            other => panic!("unexpected event: {other:?}"),
        }
        assert!(buffer.is_empty());
    }

    #[test]
    fn test_multibyte_text_split_across_chunks() {
        let line = "data: {\"status\":\"failed\",\"failure_reason\":\"内容违规\"}\n".as_bytes();
        // Split inside the first CJK character.
        let split = line.iter().position(|&b| b >= 0x80).unwrap() + 1;

        let mut buffer = line[..split].to_vec();
        assert!(parse_draw_events_buffered(&mut buffer).is_empty());

        buffer.extend_from_slice(&line[split..]);
        let events = parse_draw_events_buffered(&mut buffer);
        assert_eq!(
            events[0].as_ref().unwrap(),
            &DrawEvent::Failed {
                task_id: None,
                message: "内容违规".to_string()
            }
        );
    }

    #[test]
    fn test_draw_failure_event() {
        let mut buffer =
            b"data: {\"status\":\"failed\",\"failure_reason\":\"moderation\"}\n".to_vec();
        let events = parse_draw_events_buffered(&mut buffer);
        assert_eq!(
            events[0].as_ref().unwrap(),
            &DrawEvent::Failed {
                task_id: None,
                message: "moderation".to_string()
            }
        );
    }

    #[test]
    fn test_draw_skips_noise() {
        let mut buffer = b": keep-alive\n\ndata: not json\n".to_vec();
        let events = parse_draw_events_buffered(&mut buffer);
        assert!(events.is_empty());
        assert!(buffer.is_empty());
    }
}
