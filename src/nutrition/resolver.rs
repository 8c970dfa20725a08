use futures_util::future::join_all;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use super::dataset::NutritionTable;
use super::fatsecret::{ApiError, NutritionApi, parse_description};
use super::matcher::DEFAULT_SIMILARITY_FLOOR;
use super::{NutritionFailure, NutritionRecord, Provenance, Resolution};
use crate::normalize::{NutritionQuery, normalize, title_case};

const DEFAULT_API_TIMEOUT: Duration = Duration::from_secs(10);

/// Resolves dish names through the dataset, the nutrition API and the
/// fallback table, in that order. The first tier with a candidate wins.
#[derive(Clone)]
pub struct Resolver {
    dataset: Arc<NutritionTable>,
    fallback: Arc<NutritionTable>,
    api: Option<Arc<dyn NutritionApi>>,
    floor: f64,
    api_timeout: Duration,
}

impl Resolver {
    pub fn new(dataset: Arc<NutritionTable>, fallback: Arc<NutritionTable>) -> Self {
        Self {
            dataset,
            fallback,
            api: None,
            floor: DEFAULT_SIMILARITY_FLOOR,
            api_timeout: DEFAULT_API_TIMEOUT,
        }
    }

    pub fn with_api(mut self, api: Arc<dyn NutritionApi>) -> Self {
        self.api = Some(api);
        self
    }

    pub fn with_similarity_floor(mut self, floor: f64) -> Self {
        if floor.is_finite() {
            self.floor = floor.clamp(0.0, 1.0);
        }
        self
    }

    pub fn with_api_timeout(mut self, timeout: Duration) -> Self {
        if !timeout.is_zero() {
            self.api_timeout = timeout;
        }
        self
    }

    pub fn has_api(&self) -> bool {
        self.api.is_some()
    }

    pub async fn resolve(&self, dish: &str) -> Resolution {
        let original = dish.trim();
        let query = normalize(original);
        if query.is_empty() {
            debug!("'{}' normalizes to nothing; skipping lookup", original);
            return Err(NutritionFailure {
                query: original.to_string(),
            });
        }

        if let Some(record) = self.from_dataset(&query) {
            info!("'{}' resolved from dataset as '{}'", original, record.match_name);
            return Ok(record);
        }
        if let Some(record) = self.from_api(&query, original).await {
            info!("'{}' resolved from nutrition API as '{}'", original, record.match_name);
            return Ok(record);
        }
        if let Some(record) = self.from_fallback(&query) {
            info!("'{}' resolved from fallback table as '{}'", original, record.match_name);
            return Ok(record);
        }

        info!("no nutrition match for '{}'", original);
        Err(NutritionFailure {
            query: original.to_string(),
        })
    }

    /// Resolves every dish concurrently. Results keep input order and are
    /// paired with the dish they came from.
    pub async fn resolve_many(&self, dishes: &[String]) -> Vec<(String, Resolution)> {
        let lookups = dishes.iter().map(|dish| async move {
            let resolution = self.resolve(dish).await;
            (dish.clone(), resolution)
        });
        join_all(lookups).await
    }

    fn from_dataset(&self, query: &NutritionQuery) -> Option<NutritionRecord> {
        let row = self.dataset.closest(query.as_str(), self.floor)?;
        Some(NutritionRecord::new(
            title_case(&row.name),
            row.calories,
            row.protein,
            row.carbs,
            row.fat,
            None,
        ))
    }

    async fn from_api(&self, query: &NutritionQuery, original: &str) -> Option<NutritionRecord> {
        let api = self.api.as_ref()?;
        let lookup = tokio::time::timeout(self.api_timeout, api.search(query.as_str()));
        let result = match lookup.await {
            Ok(result) => result,
            Err(_) => Err(ApiError::Timeout(self.api_timeout)),
        };
        let food = match result {
            Ok(food) => food,
            Err(ApiError::NoResults) => {
                debug!("nutrition API has no foods for '{}'", query);
                return None;
            }
            Err(err) => {
                warn!("nutrition API lookup for '{}' failed: {}", query, err);
                return None;
            }
        };
        let (calories, protein, carbs, fat) = parse_description(&food.description);
        let name = food.name.unwrap_or_else(|| title_case(original));
        Some(NutritionRecord::new(
            name,
            calories,
            protein,
            carbs,
            fat,
            Some(Provenance::Api),
        ))
    }

    fn from_fallback(&self, query: &NutritionQuery) -> Option<NutritionRecord> {
        let row = self.fallback.closest(query.as_str(), self.floor)?;
        Some(NutritionRecord::new(
            title_case(&row.name),
            row.calories,
            row.protein,
            row.carbs,
            row.fat,
            Some(Provenance::Fallback),
        ))
    }
}
