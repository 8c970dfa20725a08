use anyhow::Result;
use std::future::Future;
use std::pin::Pin;

use crate::languages::Language;

mod google;
mod openai;
pub(crate) mod retry;

pub use google::GoogleTranslate;
pub use openai::OpenAI;
pub use retry::RetryPolicy;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderKind {
    OpenAI,
    Google,
}

impl ProviderKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderKind::OpenAI => "openai",
            ProviderKind::Google => "google",
        }
    }
}

#[derive(Debug, Clone)]
pub struct ToolSpec {
    pub name: String,
    pub description: String,
    pub parameters: serde_json::Value,
}

pub type TranslationFuture<'a> = Pin<Box<dyn Future<Output = Result<String>> + Send + 'a>>;

/// A machine translation backend. Input and output are newline-separated
/// blocks; providers try to keep one item per line but do not guarantee it.
pub trait TranslationProvider: Send + Sync {
    fn kind(&self) -> ProviderKind;
    fn translate<'a>(&'a self, text: &'a str, target: Language) -> TranslationFuture<'a>;
}

pub(crate) fn get_env(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .filter(|value| !value.trim().is_empty())
}
