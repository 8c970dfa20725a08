use serde::{Deserialize, Serialize};
use std::fmt;

/// Target languages offered for menu translation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    En,
    Fr,
    Es,
    De,
    Hi,
    Zh,
    Ja,
    It,
}

impl Language {
    pub const ALL: [Language; 8] = [
        Language::En,
        Language::Fr,
        Language::Es,
        Language::De,
        Language::Hi,
        Language::Zh,
        Language::Ja,
        Language::It,
    ];

    pub fn code(&self) -> &'static str {
        match self {
            Language::En => "en",
            Language::Fr => "fr",
            Language::Es => "es",
            Language::De => "de",
            Language::Hi => "hi",
            Language::Zh => "zh",
            Language::Ja => "ja",
            Language::It => "it",
        }
    }

    pub fn english_name(&self) -> &'static str {
        match self {
            Language::En => "English",
            Language::Fr => "French",
            Language::Es => "Spanish",
            Language::De => "German",
            Language::Hi => "Hindi",
            Language::Zh => "Chinese",
            Language::Ja => "Japanese",
            Language::It => "Italian",
        }
    }

    /// Google Translate wants a script-qualified code for Chinese.
    pub(crate) fn google_code(&self) -> &'static str {
        match self {
            Language::Zh => "zh-CN",
            other => other.code(),
        }
    }

    pub fn parse(code: &str) -> Option<Self> {
        let code = code.trim().to_lowercase();
        Self::ALL
            .into_iter()
            .find(|language| language.code() == code)
    }

    pub fn supported_codes() -> String {
        Self::ALL
            .iter()
            .map(Language::code)
            .collect::<Vec<_>>()
            .join(", ")
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_supported_codes_case_insensitively() {
        assert_eq!(Language::parse("FR"), Some(Language::Fr));
        assert_eq!(Language::parse(" ja "), Some(Language::Ja));
        assert_eq!(Language::parse("pt"), None);
        assert_eq!(Language::parse(""), None);
    }

    #[test]
    fn lists_codes_in_menu_order() {
        assert_eq!(Language::supported_codes(), "en, fr, es, de, hi, zh, ja, it");
    }
}
