//! Text generation providers.
//!
//! Two variants sit behind [`GenerationProvider`]:
//! - **[`GeminiProvider`]**: one `generateContent` call per prompt to the
//!   Gemini REST API, credential in the query string.
//! - **[`OfflineProvider`]**: returns [`OFFLINE_MESSAGE`] for every prompt so
//!   the rest of the application stays usable without a credential.
//!
//! Providers never fail: HTTP errors, network errors, and malformed responses
//! come back as a descriptive string in place of generated text. There is no
//! retry, streaming, or token budgeting.

use async_trait::async_trait;
use std::time::Duration;

use crate::config::GenerationConfig;

/// Response of the offline provider.
pub const OFFLINE_MESSAGE: &str = "I am running in Offline Mode. Semantic search is active, \
but generative explanations require an API Key. Please enter a Google Gemini API Key in your \
settings to unlock full generative capabilities.";

/// Returned when the API answers successfully but without any candidate.
pub const NO_CONTENT_MESSAGE: &str = "No content generated.";

/// Shortest string accepted as a credential.
const MIN_CREDENTIAL_LEN: usize = 8;

#[async_trait]
pub trait GenerationProvider: Send + Sync {
    fn name(&self) -> &str;

    /// Generate text for `prompt`. Failures are reported in the returned text.
    async fn generate(&self, prompt: &str) -> String;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderKind {
    Gemini,
    Offline,
}

/// A credential is plausible when, once trimmed, it is at least
/// [`MIN_CREDENTIAL_LEN`] characters of URL-safe ASCII (letters, digits,
/// `-`, `_`). No network check is made.
pub fn is_plausible_credential(credential: &str) -> bool {
    let key = credential.trim();
    key.len() >= MIN_CREDENTIAL_LEN
        && key
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

pub fn provider_kind(credential: Option<&str>) -> ProviderKind {
    match credential {
        Some(key) if is_plausible_credential(key) => ProviderKind::Gemini,
        _ => ProviderKind::Offline,
    }
}

/// Pick the provider for `credential`.
pub fn select_provider(
    credential: Option<&str>,
    config: &GenerationConfig,
) -> Box<dyn GenerationProvider> {
    match (provider_kind(credential), credential) {
        (ProviderKind::Gemini, Some(key)) => Box::new(GeminiProvider::new(key.trim(), config)),
        _ => {
            if credential.is_some_and(|k| !k.trim().is_empty()) {
                tracing::warn!("Ignoring implausible API key, using offline mode");
            }
            Box::new(OfflineProvider)
        }
    }
}

// ============ Offline Provider ============

pub struct OfflineProvider;

#[async_trait]
impl GenerationProvider for OfflineProvider {
    fn name(&self) -> &str {
        "offline"
    }

    async fn generate(&self, _prompt: &str) -> String {
        OFFLINE_MESSAGE.to_string()
    }
}

// ============ Gemini Provider ============

pub struct GeminiProvider {
    client: reqwest::Client,
    api_key: String,
    model: String,
    base_url: String,
}

impl GeminiProvider {
    pub fn new(api_key: &str, config: &GenerationConfig) -> Self {
        Self {
            client: build_client(config),
            api_key: api_key.to_string(),
            model: config.model.clone(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
        }
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/{}:generateContent?key={}",
            self.base_url, self.model, self.api_key
        )
    }

    async fn request(&self, prompt: &str) -> anyhow::Result<String> {
        let body = serde_json::json!({
            "contents": [{
                "parts": [{ "text": prompt }]
            }]
        });

        let response = self
            .client
            .post(self.endpoint())
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body_text = response.text().await.unwrap_or_default();
            tracing::error!("Gemini API Error: {} - {}", status.as_u16(), body_text);
            return Ok(format!("API Error ({}): {}", status.as_u16(), body_text));
        }

        let json: serde_json::Value = response.json().await?;
        parse_generate_response(&json)
    }
}

#[async_trait]
impl GenerationProvider for GeminiProvider {
    fn name(&self) -> &str {
        "gemini"
    }

    async fn generate(&self, prompt: &str) -> String {
        match self.request(prompt).await {
            Ok(text) => text,
            Err(e) => {
                tracing::error!("Gemini API error: {}", e);
                format!("Error connecting to Gemini API: {}", e)
            }
        }
    }
}

fn build_client(config: &GenerationConfig) -> reqwest::Client {
    let mut builder = reqwest::Client::builder();
    if let Some(secs) = config.timeout_secs {
        builder = builder.timeout(Duration::from_secs(secs));
    }
    builder.build().unwrap_or_else(|e| {
        tracing::warn!("Falling back to default HTTP client: {}", e);
        reqwest::Client::new()
    })
}

/// Extract `candidates[0].content.parts[0].text`.
///
/// A response without candidates yields [`NO_CONTENT_MESSAGE`]; a candidate
/// without the text path is an error.
fn parse_generate_response(json: &serde_json::Value) -> anyhow::Result<String> {
    let first = match json
        .get("candidates")
        .and_then(|c| c.as_array())
        .and_then(|c| c.first())
    {
        Some(candidate) => candidate,
        None => return Ok(NO_CONTENT_MESSAGE.to_string()),
    };

    first
        .pointer("/content/parts/0/text")
        .and_then(|t| t.as_str())
        .map(|t| t.to_string())
        .ok_or_else(|| anyhow::anyhow!("malformed response: candidate has no text part"))
}

/// List the models available to `api_key` that support `generateContent`.
///
/// Diagnostic helper for checking which model names a key can use.
pub async fn list_models(api_key: &str, config: &GenerationConfig) -> anyhow::Result<Vec<String>> {
    let url = format!(
        "{}?key={}",
        config.base_url.trim_end_matches('/'),
        api_key.trim()
    );
    let response = build_client(config).get(url).send().await?;

    let status = response.status();
    if !status.is_success() {
        let body_text = response.text().await.unwrap_or_default();
        anyhow::bail!("Error listing models: {} - {}", status.as_u16(), body_text);
    }

    let json: serde_json::Value = response.json().await?;
    Ok(parse_model_list(&json))
}

fn parse_model_list(json: &serde_json::Value) -> Vec<String> {
    json.get("models")
        .and_then(|m| m.as_array())
        .map(|models| {
            models
                .iter()
                .filter(|m| {
                    m.get("supportedGenerationMethods")
                        .and_then(|s| s.as_array())
                        .is_some_and(|methods| {
                            methods.iter().any(|v| v.as_str() == Some("generateContent"))
                        })
                })
                .filter_map(|m| m.get("name").and_then(|n| n.as_str()).map(String::from))
                .collect()
        })
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn credential_plausibility() {
        assert!(is_plausible_credential("AIzaSyA1b2C3d4E5f6G7h8I9j0"));
        assert!(is_plausible_credential("  abcd_efgh-1234  "));
        assert!(!is_plausible_credential(""));
        assert!(!is_plausible_credential("short"));
        assert!(!is_plausible_credential("has spaces inside key"));
        assert!(!is_plausible_credential("key=with&query"));
    }

    #[test]
    fn selection_is_a_function_of_the_credential() {
        assert_eq!(provider_kind(None), ProviderKind::Offline);
        assert_eq!(provider_kind(Some("   ")), ProviderKind::Offline);
        assert_eq!(
            provider_kind(Some("AIzaSyA1b2C3d4E5f6G7h8I9j0")),
            ProviderKind::Gemini
        );

        let cfg = GenerationConfig::default();
        assert_eq!(select_provider(None, &cfg).name(), "offline");
        assert_eq!(
            select_provider(Some("AIzaSyA1b2C3d4E5f6G7h8I9j0"), &cfg).name(),
            "gemini"
        );
    }

    #[tokio::test]
    async fn offline_provider_returns_fixed_message() {
        let out = OfflineProvider.generate("Summarize this book").await;
        assert_eq!(out, OFFLINE_MESSAGE);
    }

    #[test]
    fn parses_nested_text() {
        let body = json!({
            "candidates": [{ "content": { "parts": [{ "text": "Hello there" }] } }]
        });
        assert_eq!(parse_generate_response(&body).unwrap(), "Hello there");
    }

    #[test]
    fn missing_candidates_is_no_content() {
        assert_eq!(
            parse_generate_response(&json!({ "candidates": [] })).unwrap(),
            NO_CONTENT_MESSAGE
        );
        assert_eq!(
            parse_generate_response(&json!({})).unwrap(),
            NO_CONTENT_MESSAGE
        );
    }

    #[test]
    fn candidate_without_text_is_an_error() {
        let body = json!({ "candidates": [{ "finishReason": "SAFETY" }] });
        assert!(parse_generate_response(&body).is_err());
    }

    #[test]
    fn model_list_keeps_generate_content_models() {
        let body = json!({
            "models": [
                { "name": "models/gemini-2.5-flash", "supportedGenerationMethods": ["generateContent", "countTokens"] },
                { "name": "models/embedding-001", "supportedGenerationMethods": ["embedContent"] },
                { "name": "models/no-methods" }
            ]
        });
        assert_eq!(parse_model_list(&body), vec!["models/gemini-2.5-flash"]);
    }
}
