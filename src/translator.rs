use anyhow::{Result, anyhow};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use crate::languages::Language;
use crate::providers::TranslationProvider;

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TranslationSource {
    Primary,
    Secondary,
    Failed,
    Empty,
}

#[derive(Debug, Clone, Serialize)]
pub struct TranslatedMenu {
    pub lines: Vec<String>,
    pub source: TranslationSource,
    /// One translated line per original line.
    pub aligned: bool,
}

impl TranslatedMenu {
    /// `(original, translated)` pairs when the line counts agree.
    pub fn pairs<'a>(&'a self, originals: &'a [String]) -> Option<Vec<(&'a str, &'a str)>> {
        if !self.aligned || originals.len() != self.lines.len() {
            return None;
        }
        Some(
            originals
                .iter()
                .map(String::as_str)
                .zip(self.lines.iter().map(String::as_str))
                .collect(),
        )
    }
}

/// Translates menu blocks with a primary provider and falls back to a
/// secondary one. Never fails: total failure becomes a diagnostic line.
#[derive(Clone, Default)]
pub struct MenuTranslator {
    primary: Option<Arc<dyn TranslationProvider>>,
    secondary: Option<Arc<dyn TranslationProvider>>,
    timeout: Option<Duration>,
}

impl MenuTranslator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_primary(mut self, provider: Arc<dyn TranslationProvider>) -> Self {
        self.primary = Some(provider);
        self
    }

    pub fn with_secondary(mut self, provider: Arc<dyn TranslationProvider>) -> Self {
        self.secondary = Some(provider);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        if !timeout.is_zero() {
            self.timeout = Some(timeout);
        }
        self
    }

    pub async fn translate(&self, items: &[String], target: Language) -> TranslatedMenu {
        if items.is_empty() {
            return TranslatedMenu {
                lines: Vec::new(),
                source: TranslationSource::Empty,
                aligned: true,
            };
        }
        let block = items.join("\n");

        let primary_result = match &self.primary {
            Some(provider) => self.call(provider.as_ref(), &block, target).await,
            None => Err(anyhow!("no primary translator configured")),
        };
        let primary_err = match primary_result {
            Ok(text) => return finish(text, items.len(), TranslationSource::Primary),
            Err(err) => err,
        };
        warn!("primary translation failed ({:#}); trying secondary", primary_err);

        let secondary_result = match &self.secondary {
            Some(provider) => self.call(provider.as_ref(), &block, target).await,
            None => Err(anyhow!("no secondary translator configured")),
        };
        match secondary_result {
            Ok(text) => finish(text, items.len(), TranslationSource::Secondary),
            Err(err) => {
                warn!("secondary translation failed: {:#}", err);
                TranslatedMenu {
                    lines: vec![format!("[Translation failed: {}]", err)],
                    source: TranslationSource::Failed,
                    aligned: false,
                }
            }
        }
    }

    async fn call(
        &self,
        provider: &dyn TranslationProvider,
        block: &str,
        target: Language,
    ) -> Result<String> {
        let timeout = self.timeout.unwrap_or(DEFAULT_TIMEOUT);
        let name = provider.kind().as_str();
        info!("translating {} characters to {} via {}", block.len(), target, name);
        match tokio::time::timeout(timeout, provider.translate(block, target)).await {
            Ok(result) => result,
            Err(_) => Err(anyhow!("{} timed out after {:?}", name, timeout)),
        }
    }
}

fn finish(text: String, expected: usize, source: TranslationSource) -> TranslatedMenu {
    let lines = split_lines(&text);
    let aligned = lines.len() == expected;
    if !aligned {
        warn!(
            "translation returned {} line(s) for {} item(s)",
            lines.len(),
            expected
        );
    }
    TranslatedMenu {
        lines,
        source,
        aligned,
    }
}

fn split_lines(text: &str) -> Vec<String> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::{ProviderKind, TranslationFuture};
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct TestProvider {
        kind: ProviderKind,
        reply: Option<&'static str>,
        calls: AtomicUsize,
    }

    impl TestProvider {
        fn ok(kind: ProviderKind, reply: &'static str) -> Arc<Self> {
            Arc::new(Self {
                kind,
                reply: Some(reply),
                calls: AtomicUsize::new(0),
            })
        }

        fn failing(kind: ProviderKind) -> Arc<Self> {
            Arc::new(Self {
                kind,
                reply: None,
                calls: AtomicUsize::new(0),
            })
        }
    }

    impl TranslationProvider for TestProvider {
        fn kind(&self) -> ProviderKind {
            self.kind
        }

        fn translate<'a>(&'a self, _text: &'a str, _target: Language) -> TranslationFuture<'a> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let reply = self.reply;
            let kind = self.kind;
            Box::pin(async move {
                reply
                    .map(str::to_string)
                    .ok_or_else(|| anyhow!("{} quota exceeded", kind.as_str()))
            })
        }
    }

    fn items() -> Vec<String> {
        vec!["Soup $5".to_string(), "Salad".to_string()]
    }

    #[tokio::test]
    async fn primary_result_is_used_when_available() {
        let secondary = TestProvider::ok(ProviderKind::Google, "x\ny");
        let translator = MenuTranslator::new()
            .with_primary(TestProvider::ok(ProviderKind::OpenAI, "Soupe $5\n\n Salade "))
            .with_secondary(secondary.clone());
        let menu = translator.translate(&items(), Language::Fr).await;
        assert_eq!(menu.source, TranslationSource::Primary);
        assert_eq!(menu.lines, vec!["Soupe $5", "Salade"]);
        assert!(menu.aligned);
        assert_eq!(secondary.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn falls_back_to_secondary() {
        let translator = MenuTranslator::new()
            .with_primary(TestProvider::failing(ProviderKind::OpenAI))
            .with_secondary(TestProvider::ok(ProviderKind::Google, "Sopa $5\nEnsalada"));
        let menu = translator.translate(&items(), Language::Es).await;
        assert_eq!(menu.source, TranslationSource::Secondary);
        assert_eq!(menu.lines, vec!["Sopa $5", "Ensalada"]);
        let binding = items();
        let pairs = menu.pairs(&binding).expect("aligned");
        assert_eq!(pairs[1], ("Salad", "Ensalada"));
    }

    #[tokio::test]
    async fn missing_primary_goes_straight_to_secondary() {
        let translator = MenuTranslator::new()
            .with_secondary(TestProvider::ok(ProviderKind::Google, "Suppe $5\nSalat"));
        let menu = translator.translate(&items(), Language::De).await;
        assert_eq!(menu.source, TranslationSource::Secondary);
    }

    #[tokio::test]
    async fn total_failure_becomes_diagnostic_line() {
        let translator = MenuTranslator::new()
            .with_primary(TestProvider::failing(ProviderKind::OpenAI))
            .with_secondary(TestProvider::failing(ProviderKind::Google));
        let menu = translator.translate(&items(), Language::It).await;
        assert_eq!(menu.source, TranslationSource::Failed);
        assert_eq!(
            menu.lines,
            vec!["[Translation failed: google quota exceeded]"]
        );
        assert!(menu.pairs(&items()).is_none());
    }

    #[tokio::test]
    async fn line_count_mismatch_is_flagged() {
        let translator = MenuTranslator::new()
            .with_primary(TestProvider::ok(ProviderKind::OpenAI, "Soupe et salade"));
        let menu = translator.translate(&items(), Language::Fr).await;
        assert_eq!(menu.source, TranslationSource::Primary);
        assert!(!menu.aligned);
        assert!(menu.pairs(&items()).is_none());
    }

    #[tokio::test]
    async fn nothing_to_translate() {
        let translator = MenuTranslator::new();
        let menu = translator.translate(&[], Language::Ja).await;
        assert_eq!(menu.source, TranslationSource::Empty);
        assert!(menu.lines.is_empty());
    }
}
