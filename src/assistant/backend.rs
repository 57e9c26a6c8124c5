use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;

use crate::config::AssistantSettings;
use crate::error::{Error, Result};

const FALLBACK_MODELS: &[&str] = &["gemini-2.5-flash", "gemini-2.0-flash", "gemini-flash-latest"];
const FALLBACK_VERSION: &str = "v1beta";

#[derive(Debug, thiserror::Error)]
pub enum AssistantError {
    #[error("request failed: {0}")]
    RequestFailed(String),

    #[error("empty response")]
    Empty,
}

/// Generated text and a label naming what produced it.
#[derive(Debug, Clone, PartialEq)]
pub struct Generated {
    pub text: String,
    pub source: String,
}

/// A text generation backend.
#[async_trait]
pub trait AssistantBackend: Send + Sync {
    async fn generate(
        &self,
        prompt: &str,
        temperature: Option<f32>,
    ) -> std::result::Result<Generated, AssistantError>;
}

/// Gemini `generateContent` client. Tries the configured model and API
/// version first, then the fallback models.
pub struct GeminiBackend {
    client: Client,
    base_url: String,
    api_key: String,
    versions: Vec<String>,
    models: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
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

fn dedup(items: impl IntoIterator<Item = String>) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for item in items {
        let item = item.trim().to_string();
        if !item.is_empty() && !out.contains(&item) {
            out.push(item);
        }
    }
    out
}

impl GeminiBackend {
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        model: &str,
        api_version: &str,
        timeout: Duration,
    ) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::Config(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            versions: dedup([api_version.to_string(), FALLBACK_VERSION.to_string()]),
            models: dedup(
                std::iter::once(model.to_string())
                    .chain(FALLBACK_MODELS.iter().map(|m| m.to_string())),
            ),
        })
    }

    /// Builds a backend from settings, or None when no API key is configured.
    pub fn from_settings(settings: &AssistantSettings) -> Result<Option<Self>> {
        match settings.gemini_api_key.as_deref().filter(|k| !k.trim().is_empty()) {
            Some(key) => Ok(Some(Self::new(
                settings.gemini_base_url.clone(),
                key,
                &settings.gemini_model,
                &settings.gemini_api_version,
                settings.timeout(),
            )?)),
            None => Ok(None),
        }
    }

    async fn try_model(
        &self,
        version: &str,
        model: &str,
        body: &serde_json::Value,
    ) -> std::result::Result<String, AssistantError> {
        let url = format!(
            "{}/{}/models/{}:generateContent?key={}",
            self.base_url, version, model, self.api_key
        );
        let response = self
            .client
            .post(&url)
            .json(body)
            .send()
            .await
            .map_err(|e| AssistantError::RequestFailed(e.to_string()))?;

        if !response.status().is_success() {
            return Err(AssistantError::RequestFailed(format!(
                "HTTP {}",
                response.status()
            )));
        }

        let parsed: GenerateResponse = response
            .json()
            .await
            .map_err(|e| AssistantError::RequestFailed(e.to_string()))?;

        let text = parsed
            .candidates
            .into_iter()
            .next()
            .and_then(|c| c.content)
            .map(|c| {
                c.parts
                    .into_iter()
                    .filter_map(|p| p.text)
                    .collect::<Vec<_>>()
                    .join("\n")
            })
            .unwrap_or_default();

        let text = text.trim();
        if text.is_empty() {
            return Err(AssistantError::Empty);
        }
        Ok(text.to_string())
    }
}

#[async_trait]
impl AssistantBackend for GeminiBackend {
    async fn generate(
        &self,
        prompt: &str,
        temperature: Option<f32>,
    ) -> std::result::Result<Generated, AssistantError> {
        let mut body = json!({
            "contents": [{ "role": "user", "parts": [{ "text": prompt }] }],
        });
        if let Some(t) = temperature {
            body["generationConfig"] = json!({ "temperature": t });
        }

        let mut last_error = AssistantError::Empty;
        for version in &self.versions {
            for model in &self.models {
                match self.try_model(version, model, &body).await {
                    Ok(text) => {
                        return Ok(Generated {
                            text,
                            source: format!("gemini ({model}/{version})"),
                        });
                    }
                    Err(e) => {
                        tracing::debug!(model = %model, version = %version, error = %e, "gemini attempt failed");
                        last_error = e;
                    }
                }
            }
        }
        Err(last_error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn reply(text: &str) -> ResponseTemplate {
        ResponseTemplate::new(200).set_body_json(json!({
            "candidates": [{ "content": { "parts": [{ "text": text }] } }]
        }))
    }

    #[test]
    fn test_model_order_is_deduplicated() {
        let backend = GeminiBackend::new(
            "http://localhost",
            "k",
            "gemini-2.0-flash",
            "v1",
            Duration::from_secs(1),
        )
        .unwrap();
        assert_eq!(
            backend.models,
            vec!["gemini-2.0-flash", "gemini-2.5-flash", "gemini-flash-latest"]
        );
        assert_eq!(backend.versions, vec!["v1", "v1beta"]);
    }

    #[tokio::test]
    async fn test_falls_through_to_next_model() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1beta/models/gemini-2.5-flash:generateContent"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/v1beta/models/gemini-2.0-flash:generateContent"))
            .and(query_param("key", "secret"))
            .respond_with(reply("  Try cycling twice a week.  "))
            .mount(&server)
            .await;

        let backend = GeminiBackend::new(
            server.uri(),
            "secret",
            "gemini-2.5-flash",
            "v1beta",
            Duration::from_secs(5),
        )
        .unwrap();
        let generated = backend.generate("hello", Some(0.3)).await.unwrap();
        assert_eq!(generated.text, "Try cycling twice a week.");
        assert_eq!(generated.source, "gemini (gemini-2.0-flash/v1beta)");
    }

    #[tokio::test]
    async fn test_all_models_failing_is_an_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(reply("   "))
            .mount(&server)
            .await;

        let backend = GeminiBackend::new(
            server.uri(),
            "secret",
            "gemini-2.5-flash",
            "v1beta",
            Duration::from_secs(5),
        )
        .unwrap();
        assert!(backend.generate("hello", None).await.is_err());
    }
}
