mod dataset;
mod fallback;
mod fatsecret;
mod matcher;
mod resolver;

use serde::Serialize;
use std::fmt;

pub use dataset::{NutritionTable, TableRow, load_reference_table};
pub use fallback::fallback_table;
pub use fatsecret::{
    ApiError, ApiFood, FatSecret, FatSecretCredentials, NutritionApi, NutritionApiFuture,
    parse_description,
};
pub use matcher::{DEFAULT_SIMILARITY_FLOOR, best_match, similarity};
pub use resolver::Resolver;

/// Which cascade tier produced a record. Dataset hits carry no tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Provenance {
    #[serde(rename = "FatSecret")]
    Api,
    Fallback,
}

impl Provenance {
    pub fn as_str(&self) -> &'static str {
        match self {
            Provenance::Api => "FatSecret",
            Provenance::Fallback => "Fallback",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "FatSecret" => Some(Provenance::Api),
            "Fallback" => Some(Provenance::Fallback),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NutritionRecord {
    pub match_name: String,
    pub calories: f64,
    pub protein: f64,
    pub carbs: f64,
    pub fat: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<Provenance>,
}

impl NutritionRecord {
    pub(crate) fn new(
        match_name: String,
        calories: f64,
        protein: f64,
        carbs: f64,
        fat: f64,
        source: Option<Provenance>,
    ) -> Self {
        Self {
            match_name,
            calories: non_negative(calories),
            protein: non_negative(protein),
            carbs: non_negative(carbs),
            fat: non_negative(fat),
            source,
        }
    }
}

/// No cascade tier matched. Holds the caller's input as given.
#[derive(Debug, Clone, PartialEq, Serialize, thiserror::Error)]
#[error("No nutrition info found for '{query}'")]
pub struct NutritionFailure {
    pub query: String,
}

pub type Resolution = Result<NutritionRecord, NutritionFailure>;

pub(crate) fn non_negative(value: f64) -> f64 {
    if value.is_finite() && value > 0.0 {
        value
    } else {
        0.0
    }
}
