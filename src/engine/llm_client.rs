use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use reqwest::blocking::Client;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::config::settings::{Backend, Settings};

/// Anything that can turn a chat request into generated text.
///
/// The story engine only talks to the model through this trait, so tests can
/// swap in a scripted double.
pub trait CompletionClient {
    fn complete(&self, request: &CompletionRequest) -> Result<String, CompletionError>;
}

#[derive(Debug, Error)]
pub enum CompletionError {
    #[error("request to the model server failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("model server answered {status}: {body}")]
    Status { status: u16, body: String },

    #[error("could not decode model server reply: {0}")]
    Decode(#[source] reqwest::Error),

    #[error("model server returned no completion")]
    EmptyResponse,

    #[error("could not read image {}: {source}", path.display())]
    Attachment {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{} is not a recognised image format", path.display())]
    UnsupportedImage { path: PathBuf },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
    pub images: Vec<PathBuf>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CompletionRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
}

impl CompletionRequest {
    /// A single user turn with no attachments.
    pub fn user(model: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            messages: vec![ChatMessage {
                role: Role::User,
                content: content.into(),
                images: Vec::new(),
            }],
        }
    }

    /// Attaches an image to the last message.
    pub fn with_image(mut self, path: impl Into<PathBuf>) -> Self {
        if let Some(message) = self.messages.last_mut() {
            message.images.push(path.into());
        }
        self
    }

    pub fn has_images(&self) -> bool {
        self.messages.iter().any(|m| !m.images.is_empty())
    }

    /// All message text joined, mostly useful for logging and assertions.
    pub fn prompt_text(&self) -> String {
        self.messages
            .iter()
            .map(|m| m.content.as_str())
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/* =========================
   Wire format: Ollama
   ========================= */

#[derive(Serialize)]
struct OllamaChatRequest<'a> {
    model: &'a str,
    messages: Vec<OllamaMessage<'a>>,
    stream: bool,
    options: OllamaOptions,
}

#[derive(Serialize)]
struct OllamaMessage<'a> {
    role: Role,
    content: &'a str,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    images: Vec<String>,
}

#[derive(Serialize)]
struct OllamaOptions {
    temperature: f32,
}

#[derive(Deserialize)]
struct OllamaChatResponse {
    message: ChatMessageResponse,
}

#[derive(Deserialize)]
struct OllamaTags {
    #[serde(default)]
    models: Vec<serde_json::Value>,
}

/* =========================
   Wire format: OpenAI-compatible (LM Studio)
   ========================= */

#[derive(Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: Vec<OpenAiMessage<'a>>,
    temperature: f32,
}

#[derive(Serialize)]
struct OpenAiMessage<'a> {
    role: Role,
    content: OpenAiContent<'a>,
}

#[derive(Serialize)]
#[serde(untagged)]
enum OpenAiContent<'a> {
    Text(&'a str),
    Parts(Vec<ContentPart<'a>>),
}

#[derive(Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ContentPart<'a> {
    Text { text: &'a str },
    ImageUrl { image_url: ImageUrl },
}

#[derive(Serialize)]
struct ImageUrl {
    url: String,
}

#[derive(Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    choices: Vec<CompletionChoice>,
}

#[derive(Deserialize)]
struct CompletionChoice {
    message: ChatMessageResponse,
}

#[derive(Deserialize)]
struct ChatMessageResponse {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Deserialize)]
struct OpenAiModels {
    #[serde(default)]
    data: Vec<serde_json::Value>,
}

struct EncodedImage {
    mime: &'static str,
    data: String,
}

fn encode_image(path: &Path) -> Result<EncodedImage, CompletionError> {
    let bytes = fs::read(path).map_err(|source| CompletionError::Attachment {
        path: path.to_path_buf(),
        source,
    })?;

    let format = image::guess_format(&bytes).map_err(|_| CompletionError::UnsupportedImage {
        path: path.to_path_buf(),
    })?;

    Ok(EncodedImage {
        mime: format.to_mime_type(),
        data: STANDARD.encode(&bytes),
    })
}

fn ollama_body<'a>(
    request: &'a CompletionRequest,
    temperature: f32,
) -> Result<OllamaChatRequest<'a>, CompletionError> {
    let messages = request
        .messages
        .iter()
        .map(|message| -> Result<OllamaMessage<'a>, CompletionError> {
            let images = message
                .images
                .iter()
                .map(|path| encode_image(path).map(|img| img.data))
                .collect::<Result<Vec<_>, _>>()?;

            Ok(OllamaMessage {
                role: message.role,
                content: &message.content,
                images,
            })
        })
        .collect::<Result<Vec<_>, _>>()?;

    Ok(OllamaChatRequest {
        model: &request.model,
        messages,
        stream: false,
        options: OllamaOptions { temperature },
    })
}

fn openai_body<'a>(
    request: &'a CompletionRequest,
    temperature: f32,
) -> Result<ChatCompletionRequest<'a>, CompletionError> {
    let messages = request
        .messages
        .iter()
        .map(|message| -> Result<OpenAiMessage<'a>, CompletionError> {
            if message.images.is_empty() {
                return Ok(OpenAiMessage {
                    role: message.role,
                    content: OpenAiContent::Text(&message.content),
                });
            }

            let mut parts = vec![ContentPart::Text {
                text: &message.content,
            }];
            for path in &message.images {
                let img = encode_image(path)?;
                parts.push(ContentPart::ImageUrl {
                    image_url: ImageUrl {
                        url: format!("data:{};base64,{}", img.mime, img.data),
                    },
                });
            }

            Ok(OpenAiMessage {
                role: message.role,
                content: OpenAiContent::Parts(parts),
            })
        })
        .collect::<Result<Vec<_>, _>>()?;

    Ok(ChatCompletionRequest {
        model: &request.model,
        messages,
        temperature,
    })
}

fn non_empty(content: Option<String>) -> Result<String, CompletionError> {
    match content {
        Some(text) if !text.trim().is_empty() => Ok(text),
        _ => Err(CompletionError::EmptyResponse),
    }
}

fn openai_content(resp: ChatCompletionResponse) -> Result<String, CompletionError> {
    let first = resp
        .choices
        .into_iter()
        .next()
        .ok_or(CompletionError::EmptyResponse)?;
    non_empty(first.message.content)
}

/// Blocking HTTP client for a local model server.
pub struct HttpCompletionClient {
    http: Client,
    backend: Backend,
    base_url: String,
    temperature: f32,
}

impl HttpCompletionClient {
    pub fn new(settings: &Settings) -> Result<Self, CompletionError> {
        let http = Client::builder()
            .timeout(Duration::from_secs(settings.timeout_secs))
            .build()?;

        Ok(Self {
            http,
            backend: settings.backend,
            base_url: settings.base_url().trim_end_matches('/').to_string(),
            temperature: settings.temperature,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Ask the server which models it has, as a quick reachability probe.
    pub fn check_connection(&self) -> Result<String, CompletionError> {
        let count = match self.backend {
            Backend::Ollama => {
                let tags: OllamaTags = self.get(&format!("{}/api/tags", self.base_url))?;
                tags.models.len()
            }
            Backend::OpenAi => {
                let models: OpenAiModels = self.get(&format!("{}/v1/models", self.base_url))?;
                models.data.len()
            }
        };

        Ok(format!(
            "Connected to {} ({} models available)",
            self.base_url, count
        ))
    }

    fn get<T: DeserializeOwned>(&self, url: &str) -> Result<T, CompletionError> {
        let resp = self.http.get(url).send()?;
        Self::decode(resp)
    }

    fn post<T: DeserializeOwned>(
        &self,
        url: &str,
        body: &impl Serialize,
    ) -> Result<T, CompletionError> {
        let resp = self.http.post(url).json(body).send()?;
        Self::decode(resp)
    }

    fn decode<T: DeserializeOwned>(resp: reqwest::blocking::Response) -> Result<T, CompletionError> {
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().unwrap_or_default();
            return Err(CompletionError::Status {
                status: status.as_u16(),
                body,
            });
        }
        resp.json::<T>().map_err(CompletionError::Decode)
    }
}

impl CompletionClient for HttpCompletionClient {
    fn complete(&self, request: &CompletionRequest) -> Result<String, CompletionError> {
        debug!(
            backend = ?self.backend,
            model = %request.model,
            images = request.has_images(),
            prompt_len = request.prompt_text().len(),
            "sending completion request"
        );

        match self.backend {
            Backend::Ollama => {
                let body = ollama_body(request, self.temperature)?;
                let resp: OllamaChatResponse =
                    self.post(&format!("{}/api/chat", self.base_url), &body)?;
                non_empty(resp.message.content)
            }
            Backend::OpenAi => {
                let body = openai_body(request, self.temperature)?;
                let resp: ChatCompletionResponse =
                    self.post(&format!("{}/v1/chat/completions", self.base_url), &body)?;
                openai_content(resp)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use base64::Engine as _;
    use serde_json::{json, Value};
    use std::io::Write;
    use tempfile::NamedTempFile;

    const PNG_SIGNATURE: [u8; 8] = [0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];

    fn png_file() -> NamedTempFile {
        let mut file = tempfile::Builder::new().suffix(".png").tempfile().unwrap();
        file.write_all(&PNG_SIGNATURE).unwrap();
        file
    }

    #[test]
    fn ollama_body_embeds_base64_images() {
        let image = png_file();
        let request = CompletionRequest::user("llava", "Describe this").with_image(image.path());

        let body = serde_json::to_value(ollama_body(&request, 0.5).unwrap()).unwrap();

        assert_eq!(body["model"], "llava");
        assert_eq!(body["stream"], false);
        assert_eq!(body["options"]["temperature"], 0.5);
        assert_eq!(body["messages"][0]["role"], "user");
        assert_eq!(body["messages"][0]["content"], "Describe this");
        assert_eq!(
            body["messages"][0]["images"],
            json!([STANDARD.encode(PNG_SIGNATURE)])
        );
    }

    #[test]
    fn text_only_ollama_body_omits_images() {
        let request = CompletionRequest::user("llama2", "Continue");
        let body = serde_json::to_value(ollama_body(&request, 0.7).unwrap()).unwrap();
        assert!(body["messages"][0].get("images").is_none());
    }

    #[test]
    fn openai_body_uses_content_parts_for_images() {
        let image = png_file();
        let request = CompletionRequest::user("local-model", "Describe this").with_image(image.path());

        let body = serde_json::to_value(openai_body(&request, 0.7).unwrap()).unwrap();
        let content = &body["messages"][0]["content"];

        assert_eq!(content[0], json!({"type": "text", "text": "Describe this"}));
        assert_eq!(content[1]["type"], "image_url");
        let url = content[1]["image_url"]["url"].as_str().unwrap();
        assert!(url.starts_with("data:image/png;base64,"));

        let plain = CompletionRequest::user("local-model", "Hello");
        let body = serde_json::to_value(openai_body(&plain, 0.7).unwrap()).unwrap();
        assert_eq!(body["messages"][0]["content"], Value::from("Hello"));
    }

    #[test]
    fn missing_attachment_is_reported() {
        let request = CompletionRequest::user("llava", "x").with_image("/nonexistent/cat.png");
        let err = ollama_body(&request, 0.7).err().unwrap();
        assert!(matches!(err, CompletionError::Attachment { .. }));
    }

    #[test]
    fn non_image_attachment_is_rejected() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(b"just some text").unwrap();
        let request = CompletionRequest::user("llava", "x").with_image(file.path());
        let err = openai_body(&request, 0.7).err().unwrap();
        assert!(matches!(err, CompletionError::UnsupportedImage { .. }));
    }

    #[test]
    fn empty_openai_choices_is_an_error() {
        let resp: ChatCompletionResponse = serde_json::from_str(r#"{"choices": []}"#).unwrap();
        assert!(matches!(
            openai_content(resp),
            Err(CompletionError::EmptyResponse)
        ));

        let resp: ChatCompletionResponse =
            serde_json::from_str(r#"{"choices": [{"message": {"content": "Once upon"}}]}"#).unwrap();
        assert_eq!(openai_content(resp).unwrap(), "Once upon");
    }

    #[test]
    fn ollama_reply_decodes() {
        let resp: OllamaChatResponse =
            serde_json::from_str(r#"{"model":"llava","message":{"role":"assistant","content":"A cat."},"done":true}"#)
                .unwrap();
        assert_eq!(non_empty(resp.message.content).unwrap(), "A cat.");
    }
}
