use reqwest::StatusCode;
use serde::Deserialize;
use std::future::Future;
use std::pin::Pin;
use std::sync::Mutex;
use std::time::{Duration, Instant};
use tracing::debug;

pub(crate) const DEFAULT_TOKEN_URL: &str = "https://oauth.fatsecret.com/connect/token";
pub(crate) const DEFAULT_SEARCH_URL: &str = "https://platform.fatsecret.com/rest/server.api";
const TOKEN_EXPIRY_MARGIN: Duration = Duration::from_secs(60);

/// First hit of a nutrition API search, before mapping to a record.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiFood {
    pub name: Option<String>,
    pub description: String,
}

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("no access token received")]
    MissingToken,
    #[error("nutrition API returned {status}: {body}")]
    Status { status: StatusCode, body: String },
    #[error("nutrition API error {code}: {message}")]
    Service { code: i64, message: String },
    #[error("nutrition API request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("failed to parse nutrition API response: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("nutrition API returned no foods")]
    NoResults,
    #[error("nutrition API timed out after {0:?}")]
    Timeout(Duration),
}

pub type NutritionApiFuture<'a> = Pin<Box<dyn Future<Output = Result<ApiFood, ApiError>> + Send + 'a>>;

pub trait NutritionApi: Send + Sync {
    fn search<'a>(&'a self, query: &'a str) -> NutritionApiFuture<'a>;
}

#[derive(Debug, Clone)]
pub struct FatSecretCredentials {
    pub client_id: String,
    pub client_secret: String,
}

#[derive(Debug, Clone)]
struct CachedToken {
    value: String,
    expires_at: Instant,
}

/// FatSecret platform client: client-credentials token, then `foods.search`.
#[derive(Debug)]
pub struct FatSecret {
    client: reqwest::Client,
    credentials: FatSecretCredentials,
    token_url: String,
    search_url: String,
    token: Mutex<Option<CachedToken>>,
}

impl FatSecret {
    pub fn new(credentials: FatSecretCredentials, timeout: Duration) -> Result<Self, ApiError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            credentials,
            token_url: DEFAULT_TOKEN_URL.to_string(),
            search_url: DEFAULT_SEARCH_URL.to_string(),
            token: Mutex::new(None),
        })
    }

    pub fn with_endpoints(mut self, token_url: impl Into<String>, search_url: impl Into<String>) -> Self {
        let token_url = token_url.into();
        let search_url = search_url.into();
        if !token_url.trim().is_empty() {
            self.token_url = token_url;
        }
        if !search_url.trim().is_empty() {
            self.search_url = search_url;
        }
        self
    }

    fn cached_token(&self) -> Option<String> {
        let guard = self.token.lock().ok()?;
        guard
            .as_ref()
            .filter(|token| token.expires_at > Instant::now())
            .map(|token| token.value.clone())
    }

    fn store_token(&self, value: &str, expires_in: u64) {
        let lifetime = Duration::from_secs(expires_in).saturating_sub(TOKEN_EXPIRY_MARGIN);
        if let Ok(mut guard) = self.token.lock() {
            *guard = Some(CachedToken {
                value: value.to_string(),
                expires_at: Instant::now() + lifetime,
            });
        }
    }

    async fn access_token(&self) -> Result<String, ApiError> {
        if let Some(token) = self.cached_token() {
            return Ok(token);
        }
        let response = self
            .client
            .post(&self.token_url)
            .basic_auth(
                &self.credentials.client_id,
                Some(&self.credentials.client_secret),
            )
            .form(&[("grant_type", "client_credentials"), ("scope", "basic")])
            .send()
            .await?;
        let status = response.status();
        let text = response.text().await.unwrap_or_default();
        if !status.is_success() {
            return Err(ApiError::Status { status, body: text });
        }
        let payload: TokenResponse = serde_json::from_str(&text)?;
        let token = payload
            .access_token
            .filter(|value| !value.trim().is_empty())
            .ok_or(ApiError::MissingToken)?;
        self.store_token(&token, payload.expires_in.unwrap_or(0));
        debug!("fatsecret access token acquired");
        Ok(token)
    }

    async fn search_foods(&self, query: &str) -> Result<ApiFood, ApiError> {
        let token = self.access_token().await?;
        let response = self
            .client
            .get(&self.search_url)
            .bearer_auth(token)
            .query(&[
                ("method", "foods.search"),
                ("search_expression", query),
                ("format", "json"),
            ])
            .send()
            .await?;
        let status = response.status();
        let text = response.text().await.unwrap_or_default();
        if !status.is_success() {
            return Err(ApiError::Status { status, body: text });
        }
        first_food(&text)
    }
}

impl NutritionApi for FatSecret {
    fn search<'a>(&'a self, query: &'a str) -> NutritionApiFuture<'a> {
        Box::pin(self.search_foods(query))
    }
}

fn first_food(body: &str) -> Result<ApiFood, ApiError> {
    let payload: SearchResponse = serde_json::from_str(body)?;
    if let Some(error) = payload.error {
        return Err(ApiError::Service {
            code: error.code.unwrap_or_default(),
            message: error.message.unwrap_or_default(),
        });
    }
    let food = payload
        .foods
        .and_then(|foods| foods.food)
        .and_then(|food| match food {
            FoodList::Many(list) => list.into_iter().next(),
            FoodList::One(item) => Some(item),
        })
        .ok_or(ApiError::NoResults)?;
    Ok(ApiFood {
        name: food.food_name.filter(|name| !name.trim().is_empty()),
        description: food.food_description.unwrap_or_default(),
    })
}

/// Calories, protein, carbs and fat read out of a food description such as
/// `Per 100g - Calories: 52kcal | Fat: 0.17g | Carbs: 13.81g | Protein: 0.26g`.
///
/// Calories is the last number before the first `cal` token. Missing values
/// are 0.
pub fn parse_description(description: &str) -> (f64, f64, f64, f64) {
    let calories = description
        .find("cal")
        .and_then(|idx| last_number(&description[..idx]))
        .unwrap_or(0.0);
    let protein = labelled_number(description, "Protein:").unwrap_or(0.0);
    let carbs = labelled_number(description, "Carbs:").unwrap_or(0.0);
    let fat = labelled_number(description, "Fat:").unwrap_or(0.0);
    (calories, protein, carbs, fat)
}

fn labelled_number(text: &str, label: &str) -> Option<f64> {
    let start = text.find(label)? + label.len();
    first_number(&text[start..])
}

fn first_number(text: &str) -> Option<f64> {
    let start = text.find(|ch: char| ch.is_ascii_digit())?;
    let rest = &text[start..];
    let end = rest
        .find(|ch: char| !(ch.is_ascii_digit() || ch == '.'))
        .unwrap_or(rest.len());
    rest[..end].trim_end_matches('.').parse().ok()
}

fn last_number(text: &str) -> Option<f64> {
    let end = text.rfind(|ch: char| ch.is_ascii_digit())? + 1;
    let head = &text[..end];
    let start = head
        .rfind(|ch: char| !(ch.is_ascii_digit() || ch == '.'))
        .map(|idx| idx + 1)
        .unwrap_or(0);
    head[start..].trim_start_matches('.').parse().ok()
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: Option<String>,
    expires_in: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    foods: Option<FoodsPayload>,
    error: Option<ServiceError>,
}

#[derive(Debug, Deserialize)]
struct FoodsPayload {
    food: Option<FoodList>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum FoodList {
    Many(Vec<FoodItem>),
    One(FoodItem),
}

#[derive(Debug, Deserialize)]
struct FoodItem {
    food_name: Option<String>,
    food_description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ServiceError {
    code: Option<i64>,
    message: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_full_description() {
        let (calories, protein, carbs, fat) = parse_description(
            "Per 100g - Calories: 52kcal | Fat: 0.17g | Carbs: 13.81g | Protein: 0.26g",
        );
        assert_eq!(calories, 52.0);
        assert_eq!(fat, 0.17);
        assert_eq!(carbs, 13.81);
        assert_eq!(protein, 0.26);
    }

    #[test]
    fn calories_before_plain_cal_token() {
        assert_eq!(parse_description("250 cal").0, 250.0);
        assert_eq!(parse_description("1 serving: 97.5 cals").0, 97.5);
    }

    #[test]
    fn description_without_numbers_is_all_zero() {
        assert_eq!(parse_description("Calories unknown"), (0.0, 0.0, 0.0, 0.0));
        assert_eq!(parse_description(""), (0.0, 0.0, 0.0, 0.0));
    }

    #[test]
    fn first_food_takes_head_of_list() {
        let body = r#"{"foods":{"food":[
            {"food_name":"Caesar Salad","food_description":"Per 1 cup - Calories: 190kcal"},
            {"food_name":"Other","food_description":"Per 1 cup - Calories: 10kcal"}
        ],"total_results":"2"}}"#;
        let food = first_food(body).expect("food");
        assert_eq!(food.name.as_deref(), Some("Caesar Salad"));
        assert!(food.description.contains("190kcal"));
    }

    #[test]
    fn first_food_accepts_single_object() {
        let body = r#"{"foods":{"food":{"food_name":"Tea","food_description":"Per 1 cup - Calories: 2kcal"}}}"#;
        let food = first_food(body).expect("food");
        assert_eq!(food.name.as_deref(), Some("Tea"));
    }

    #[test]
    fn empty_result_set_is_no_results() {
        let body = r#"{"foods":{"max_results":"20","total_results":"0"}}"#;
        assert!(matches!(first_food(body), Err(ApiError::NoResults)));
    }

    #[test]
    fn service_error_is_reported() {
        let body = r#"{"error":{"code":21,"message":"Invalid IP address detected"}}"#;
        match first_food(body) {
            Err(ApiError::Service { code, message }) => {
                assert_eq!(code, 21);
                assert!(message.contains("Invalid IP"));
            }
            other => panic!("unexpected: {other:?}"),
        }
    }
}
