//! Hazard-description assist: asks a multimodal language model to turn a
//! hazard photo and description into a suggested hazardous event.

use async_trait::async_trait;
use base64::{engine::general_purpose, Engine};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::config::AssistConfig;

#[derive(Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AssistRequest {
    /// `data:<mime>;base64,<payload>`
    pub photo: String,
    pub description: String,
}
#[derive(Debug, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct AssistResponse {
    pub suggested_event: String,
}

#[derive(Debug, thiserror::Error)]
pub enum AssistError {
    #[error("Photo is not a base64 image data URI: {0}")]
    InvalidPhoto(String),
    #[error("Assist service unreachable: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("Assist service answered {status}: {body}")]
    Status { status: u16, body: String },
    #[error("Assist service returned unusable output: {0}")]
    MalformedOutput(String),
}

impl AssistError {
    pub fn code(&self) -> &'static str {
        match self {
            AssistError::InvalidPhoto(_) => "INVALID_PHOTO",
            AssistError::Transport(_) | AssistError::Status { .. } => "ASSIST_SERVICE_FAILED",
            AssistError::MalformedOutput(_) => "ASSIST_OUTPUT_MALFORMED",
        }
    }
}

#[async_trait]
pub trait HazardAssist: Send + Sync {
    async fn suggest_hazardous_event(
        &self,
        request: &AssistRequest,
    ) -> Result<AssistResponse, AssistError>;
}

/// Image payload split out of a data URI.
#[derive(Debug, PartialEq, Eq)]
pub struct InlineImage<'a> {
    pub mime_type: &'a str,
    pub data: &'a str,
}

pub fn parse_data_uri(photo: &str) -> Result<InlineImage<'_>, AssistError> {
    let rest = photo
        .strip_prefix("data:")
        .ok_or_else(|| AssistError::InvalidPhoto("missing `data:` prefix".to_string()))?;
    let (mime_type, data) = rest
        .split_once(";base64,")
        .ok_or_else(|| AssistError::InvalidPhoto("missing `;base64,` marker".to_string()))?;
    if !mime_type.starts_with("image/") {
        return Err(AssistError::InvalidPhoto(format!(
            "`{mime_type}` is not an image type"
        )));
    }
    general_purpose::STANDARD
        .decode(data)
        .map_err(|error| AssistError::InvalidPhoto(error.to_string()))?;
    Ok(InlineImage { mime_type, data })
}

pub fn encode_data_uri(mime_type: &str, bytes: &[u8]) -> String {
    format!(
        "data:{mime_type};base64,{}",
        general_purpose::STANDARD.encode(bytes)
    )
}

const INSTRUCTIONS: &str = "You are a workplace safety officer completing a HIRAC \
(Hazard Identification, Risk Assessment and Control) register. Look at the photo and \
the hazard description, then state the hazardous event: the specific incident through \
which the hazard could cause harm, in one short sentence. Answer as JSON of the form \
{\"hazardousEvent\": \"...\"}.";

pub fn generate_content_body(image: &InlineImage<'_>, description: &str) -> serde_json::Value {
    json!({
        "contents": [{
            "role": "user",
            "parts": [
                { "text": INSTRUCTIONS },
                { "text": format!("Hazard description: {description}") },
                { "inline_data": { "mime_type": image.mime_type, "data": image.data } },
            ]
        }],
        "generationConfig": { "responseMimeType": "application/json" }
    })
}

#[derive(Debug, Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}
#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<Content>,
}
#[derive(Debug, Deserialize)]
struct Content {
    #[serde(default)]
    parts: Vec<Part>,
}
#[derive(Debug, Deserialize)]
struct Part {
    text: Option<String>,
}
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Suggestion {
    hazardous_event: String,
}

/// Pulls the suggested event out of a `generateContent` response body.
pub fn extract_suggestion(body: &str) -> Result<AssistResponse, AssistError> {
    let response: GenerateContentResponse = serde_json::from_str(body)
        .map_err(|error| AssistError::MalformedOutput(error.to_string()))?;
    let text = response
        .candidates
        .into_iter()
        .filter_map(|candidate| candidate.content)
        .flat_map(|content| content.parts)
        .find_map(|part| part.text)
        .ok_or_else(|| AssistError::MalformedOutput("no text candidate".to_string()))?;
    let suggestion: Suggestion = serde_json::from_str(text.trim())
        .map_err(|error| AssistError::MalformedOutput(error.to_string()))?;
    let suggested_event = suggestion.hazardous_event.trim().to_string();
    if suggested_event.is_empty() {
        return Err(AssistError::MalformedOutput(
            "empty hazardous event".to_string(),
        ));
    }
    Ok(AssistResponse { suggested_event })
}

/// Calls a Gemini-compatible `generateContent` endpoint.
pub struct GeminiAssist {
    client: Client,
    url: String,
    api_key: String,
}

impl GeminiAssist {
    pub fn new(config: &AssistConfig) -> Result<Self, AssistError> {
        let client = Client::builder().user_agent(&config.user_agent).build()?;
        Ok(Self {
            client,
            url: format!(
                "{}/models/{}:generateContent",
                config.endpoint.trim_end_matches('/'),
                config.model
            ),
            api_key: config.api_key.clone(),
        })
    }
}

#[async_trait]
impl HazardAssist for GeminiAssist {
    #[tracing::instrument(skip_all)]
    async fn suggest_hazardous_event(
        &self,
        request: &AssistRequest,
    ) -> Result<AssistResponse, AssistError> {
        let image = parse_data_uri(&request.photo)?;
        let response = self
            .client
            .post(&self.url)
            .header("x-goog-api-key", &self.api_key)
            .json(&generate_content_body(&image, &request.description))
            .send()
            .await?;
        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            tracing::error!(status = status.as_u16(), "assist service rejected the request");
            return Err(AssistError::Status {
                status: status.as_u16(),
                body,
            });
        }
        extract_suggestion(&body)
    }
}
