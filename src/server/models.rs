use serde::{Deserialize, Serialize};

use crate::languages::Language;
use crate::nutrition::{NutritionRecord, Resolution};
use crate::pipeline::LoggedItem;
use crate::translator::TranslationSource;

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub(crate) struct MenuRequest {
    pub(crate) image_base64: String,
    pub(crate) lang: Option<String>,
}

#[derive(Debug, Serialize)]
pub(crate) struct MenuResponse {
    pub(crate) session_id: String,
    pub(crate) language: Language,
    pub(crate) lines: Vec<String>,
    pub(crate) translations: Vec<String>,
    pub(crate) translation_source: TranslationSource,
    pub(crate) aligned: bool,
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub(crate) struct SelectRequest {
    pub(crate) session_id: String,
    pub(crate) indices: Vec<usize>,
}

#[derive(Debug, Serialize)]
pub(crate) struct SelectResponse {
    pub(crate) session_id: String,
    pub(crate) items: Vec<String>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub(crate) struct NutritionRequest {
    pub(crate) items: Vec<String>,
}

#[derive(Debug, Serialize)]
pub(crate) struct NutritionResponse {
    pub(crate) results: Vec<NutritionResult>,
}

#[derive(Debug, Serialize)]
pub(crate) struct NutritionResult {
    pub(crate) query: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) record: Option<NutritionRecord>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) error: Option<String>,
}

impl From<(String, Resolution)> for NutritionResult {
    fn from((query, resolution): (String, Resolution)) -> Self {
        match resolution {
            Ok(record) => Self {
                query,
                record: Some(record),
                error: None,
            },
            Err(failure) => Self {
                query,
                record: None,
                error: Some(failure.to_string()),
            },
        }
    }
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub(crate) struct LogRequest {
    pub(crate) session_id: Option<String>,
    pub(crate) user: Option<String>,
    pub(crate) date: Option<String>,
    pub(crate) items: Vec<String>,
}

#[derive(Debug, Serialize)]
pub(crate) struct LogResponse {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) session_id: Option<String>,
    pub(crate) user: String,
    pub(crate) date: String,
    pub(crate) logged: Vec<LoggedItem>,
    pub(crate) unresolved: Vec<String>,
    pub(crate) total_calories: f64,
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub(crate) struct TotalQuery {
    pub(crate) user: Option<String>,
    pub(crate) date: Option<String>,
}

#[derive(Debug, Serialize)]
pub(crate) struct TotalResponse {
    pub(crate) user: String,
    pub(crate) date: String,
    pub(crate) total_calories: f64,
}

#[derive(Debug, Serialize)]
pub(crate) struct ErrorResponse {
    pub(crate) error: String,
}
