use anyhow::{Context, Result, anyhow};
use serde_json::Value;
use std::time::Duration;

use super::{ProviderKind, TranslationFuture, TranslationProvider};
use crate::languages::Language;

const DEFAULT_ENDPOINT: &str = "https://translate.googleapis.com/translate_a/single";
const MAX_CHARS: usize = 5000;

/// Secondary translator: the public Google Translate endpoint, whole block
/// in one request with source language auto-detected.
#[derive(Debug, Clone)]
pub struct GoogleTranslate {
    endpoint: String,
    client: reqwest::Client,
}

impl GoogleTranslate {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .with_context(|| "failed to build Google Translate HTTP client")?;
        Ok(Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            client,
        })
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        let endpoint = endpoint.into();
        if !endpoint.trim().is_empty() {
            self.endpoint = endpoint;
        }
        self
    }

    async fn translate_block(&self, text: &str, target: Language) -> Result<String> {
        let chars = text.chars().count();
        if chars > MAX_CHARS {
            return Err(anyhow!(
                "text is too long for Google Translate ({} > {} characters)",
                chars,
                MAX_CHARS
            ));
        }
        let response = self
            .client
            .get(&self.endpoint)
            .query(&[
                ("client", "gtx"),
                ("sl", "auto"),
                ("tl", target.google_code()),
                ("dt", "t"),
                ("q", text),
            ])
            .send()
            .await?;
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        if !status.is_success() {
            return Err(anyhow!("Google Translate error ({}): {}", status, body.trim()));
        }
        extract_translation(&body)
    }
}

impl TranslationProvider for GoogleTranslate {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Google
    }

    fn translate<'a>(&'a self, text: &'a str, target: Language) -> TranslationFuture<'a> {
        Box::pin(self.translate_block(text, target))
    }
}

/// The response is a nested array whose first element lists
/// `[translated, original, ...]` segments.
fn extract_translation(body: &str) -> Result<String> {
    let value: Value =
        serde_json::from_str(body).with_context(|| "failed to parse Google Translate response")?;
    let segments = value
        .get(0)
        .and_then(Value::as_array)
        .ok_or_else(|| anyhow!("Google Translate response has no segments"))?;
    let translated = segments
        .iter()
        .filter_map(|segment| segment.get(0).and_then(Value::as_str))
        .collect::<String>();
    if translated.trim().is_empty() {
        return Err(anyhow!("Google Translate returned an empty translation"));
    }
    Ok(translated)
}
