use anyhow::{Context, Result, anyhow};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use time::Date;
use tracing::{debug, info, warn};

use crate::languages::Language;
use crate::normalize::{normalize, title_case};
use crate::nutrition::{
    FatSecret, FatSecretCredentials, NutritionFailure, NutritionRecord, Resolution, Resolver,
    fallback_table, load_reference_table,
};
use crate::ocr::{MenuLine, OcrEngine, TesseractOcr, reconstruct_lines};
use crate::providers::{GoogleTranslate, OpenAI, RetryPolicy, get_env};
use crate::session::MenuSession;
use crate::settings::Settings;
use crate::storage::{FoodLog, FoodLogEntry, LogItem};
use crate::translator::{MenuTranslator, TranslatedMenu};

const MENU_HEADERS: &[&str] = &[
    "menu",
    "breakfast",
    "lunch",
    "dinner",
    "brunch",
    "drinks",
    "beverages",
    "desserts",
    "starters",
    "appetizers",
    "mains",
    "main course",
    "sides",
    "specials",
    "soups",
    "salads",
];

/// Input rejected before any lookup runs.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InputError {
    #[error("dish name is empty")]
    EmptyDish,
    #[error("'{0}' is a menu header, not a dish")]
    MenuHeader(String),
    #[error("unsupported target language '{code}' (expected one of {supported})")]
    UnsupportedLanguage { code: String, supported: String },
}

pub fn parse_language(code: &str) -> Result<Language, InputError> {
    Language::parse(code).ok_or_else(|| InputError::UnsupportedLanguage {
        code: code.trim().to_string(),
        supported: Language::supported_codes(),
    })
}

pub fn is_menu_header(text: &str) -> bool {
    let key = normalize(text.trim().trim_end_matches(':'));
    let key = key.as_str().trim_end_matches(':').trim();
    MENU_HEADERS.contains(&key)
}

pub fn check_dish(dish: &str) -> Result<&str, InputError> {
    let dish = dish.trim();
    if dish.is_empty() {
        return Err(InputError::EmptyDish);
    }
    if is_menu_header(dish) {
        return Err(InputError::MenuHeader(dish.to_string()));
    }
    Ok(dish)
}

/// Reads the FatSecret pair. Only one half being set is a configuration
/// error; neither being set disables the API tier.
pub fn fatsecret_credentials(
    client_id: Option<String>,
    client_secret: Option<String>,
) -> Result<Option<FatSecretCredentials>> {
    match (client_id, client_secret) {
        (Some(client_id), Some(client_secret)) => Ok(Some(FatSecretCredentials {
            client_id,
            client_secret,
        })),
        (None, None) => Ok(None),
        (Some(_), None) => Err(anyhow!(
            "FATSECRET_CLIENT_ID is set but FATSECRET_CLIENT_SECRET is missing"
        )),
        (None, Some(_)) => Err(anyhow!(
            "FATSECRET_CLIENT_SECRET is set but FATSECRET_CLIENT_ID is missing"
        )),
    }
}

/// Budget for a whole nutrition API lookup. A cold lookup makes two
/// requests in a row (token, then search), each bounded by `request_timeout`.
pub(crate) fn api_lookup_timeout(request_timeout: Duration) -> Duration {
    request_timeout.saturating_mul(2)
}

#[derive(Debug, Clone, Serialize)]
pub struct ScannedMenu {
    pub lines: Vec<String>,
    pub translation: TranslatedMenu,
    pub language: Language,
}

#[derive(Debug, Clone, Serialize)]
pub struct LogOutcome {
    pub logged: Vec<LoggedItem>,
    pub unresolved: Vec<NutritionFailure>,
    pub total: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LoggedItem {
    pub item_name: String,
    pub calories: f64,
}

/// Menu scan, translation, nutrition lookup and food logging wired together.
#[derive(Clone)]
pub struct Pipeline {
    ocr: Arc<dyn OcrEngine>,
    translator: MenuTranslator,
    resolver: Resolver,
    store: Arc<FoodLog>,
    line_threshold: f32,
    default_language: Language,
    default_user: String,
}

impl Pipeline {
    pub fn new(
        ocr: Arc<dyn OcrEngine>,
        translator: MenuTranslator,
        resolver: Resolver,
        store: Arc<FoodLog>,
    ) -> Self {
        let defaults = Settings::default();
        Self {
            ocr,
            translator,
            resolver,
            store,
            line_threshold: defaults.line_threshold,
            default_language: defaults.default_language,
            default_user: defaults.default_user,
        }
    }

    pub fn from_settings(settings: &Settings) -> Result<Self> {
        let credentials = fatsecret_credentials(
            get_env("FATSECRET_CLIENT_ID"),
            get_env("FATSECRET_CLIENT_SECRET"),
        )?;

        let dataset = Arc::new(load_reference_table(&settings.dataset_path));
        let fallback = Arc::new(fallback_table());
        let mut resolver = Resolver::new(dataset, fallback)
            .with_similarity_floor(settings.similarity_floor)
            .with_api_timeout(api_lookup_timeout(settings.http_timeout));
        match credentials {
            Some(credentials) => {
                let mut api = FatSecret::new(credentials, settings.http_timeout)
                    .context("failed to build FatSecret client")?;
                if let (Some(token_url), Some(search_url)) = (
                    settings.fatsecret_token_url.as_deref(),
                    settings.fatsecret_search_url.as_deref(),
                ) {
                    api = api.with_endpoints(token_url, search_url);
                }
                resolver = resolver.with_api(Arc::new(api));
            }
            None => warn!(
                "FATSECRET_CLIENT_ID/FATSECRET_CLIENT_SECRET not set; nutrition API lookups are disabled"
            ),
        }

        let mut translator = MenuTranslator::new().with_timeout(settings.http_timeout * 3);
        match OpenAI::from_env(settings.http_timeout)? {
            Some(openai) => {
                let mut openai = openai.with_retry(
                    RetryPolicy::default().with_max_attempts(settings.translation_max_attempts),
                );
                if let Some(model) = settings.translation_model.as_deref() {
                    openai = openai.with_model(model);
                }
                translator = translator.with_primary(Arc::new(openai));
            }
            None => warn!("OPENAI_API_KEY not set; using the secondary translator only"),
        }
        translator = translator.with_secondary(Arc::new(GoogleTranslate::new(
            settings.http_timeout,
        )?));

        let store = Arc::new(FoodLog::open(&settings.resolved_database_path())?);
        let ocr = Arc::new(TesseractOcr::new(
            settings.ocr_languages.clone(),
            settings.ocr_psm,
        ));

        Ok(Self::new(ocr, translator, resolver, store)
            .with_line_threshold(settings.line_threshold)
            .with_default_language(settings.default_language)
            .with_default_user(settings.default_user.clone()))
    }

    pub fn with_line_threshold(mut self, threshold: f32) -> Self {
        if threshold.is_finite() && threshold > 0.0 {
            self.line_threshold = threshold;
        }
        self
    }

    pub fn with_default_language(mut self, language: Language) -> Self {
        self.default_language = language;
        self
    }

    pub fn with_default_user(mut self, user: impl Into<String>) -> Self {
        let user = user.into();
        if !user.trim().is_empty() {
            self.default_user = user.trim().to_string();
        }
        self
    }

    pub fn default_language(&self) -> Language {
        self.default_language
    }

    pub fn default_user(&self) -> &str {
        &self.default_user
    }

    pub fn store(&self) -> &FoodLog {
        &self.store
    }

    /// Parses a target language code, falling back to the configured default
    /// when none is given.
    pub fn language_or_default(&self, code: Option<&str>) -> Result<Language, InputError> {
        match code.map(str::trim).filter(|code| !code.is_empty()) {
            Some(code) => parse_language(code),
            None => Ok(self.default_language),
        }
    }

    pub async fn scan(&self, image: &[u8]) -> Result<Vec<MenuLine>> {
        let ocr = Arc::clone(&self.ocr);
        let bytes = image.to_vec();
        let detections = tokio::task::spawn_blocking(move || ocr.detect(&bytes))
            .await
            .context("OCR task failed")??;
        let lines = reconstruct_lines(&detections, self.line_threshold);
        info!(
            "reconstructed {} menu line(s) from {} detection(s)",
            lines.len(),
            detections.len()
        );
        Ok(lines)
    }

    pub async fn translate(&self, lines: &[String], target: Language) -> TranslatedMenu {
        self.translator.translate(lines, target).await
    }

    /// Scans, translates and records the menu. Storing the menu is best
    /// effort.
    pub async fn scan_menu(&self, image: &[u8], target: Language) -> Result<ScannedMenu> {
        let lines = self
            .scan(image)
            .await?
            .into_iter()
            .map(|line| line.text)
            .collect::<Vec<_>>();
        let translation = self.translate(&lines, target).await;

        let pairs = match translation.pairs(&lines) {
            Some(pairs) => pairs
                .into_iter()
                .map(|(original, translated)| (original.to_string(), Some(translated.to_string())))
                .collect::<Vec<_>>(),
            None => lines.iter().map(|line| (line.clone(), None)).collect(),
        };
        if let Err(err) = self.store.save_menu_items(&pairs) {
            warn!("failed to store scanned menu: {:#}", err);
        }

        Ok(ScannedMenu {
            lines,
            translation,
            language: target,
        })
    }

    pub async fn resolve(&self, dish: &str) -> Result<Resolution, InputError> {
        let dish = check_dish(dish)?;
        let resolution = self.resolver.resolve(dish).await;
        if let Ok(record) = &resolution {
            self.cache(record);
        }
        Ok(resolution)
    }

    /// Validates every dish before any lookup, then resolves them
    /// concurrently in input order.
    pub async fn resolve_many(
        &self,
        dishes: &[String],
    ) -> Result<Vec<(String, Resolution)>, InputError> {
        let dishes = dishes
            .iter()
            .map(|dish| check_dish(dish).map(str::to_string))
            .collect::<Result<Vec<_>, _>>()?;
        let results = self.resolver.resolve_many(&dishes).await;
        for (_, resolution) in &results {
            if let Ok(record) = resolution {
                self.cache(record);
            }
        }
        Ok(results)
    }

    /// Resolves the dishes and logs every one that matched. Dishes without a
    /// match are reported back and not logged.
    pub async fn log(&self, user: &str, dishes: &[String], date: Date) -> Result<LogOutcome> {
        let results = self.resolve_many(dishes).await?;
        let mut items = Vec::new();
        let mut unresolved = Vec::new();
        for (_, resolution) in results {
            match resolution {
                Ok(record) => items.push(LogItem::from(&record)),
                Err(failure) => unresolved.push(failure),
            }
        }
        self.store.append(user, &items, date)?;
        let total = self.store.daily_total(user, date)?;
        Ok(LogOutcome {
            logged: items
                .into_iter()
                .map(|item| LoggedItem {
                    item_name: item.name,
                    calories: item.calories,
                })
                .collect(),
            unresolved,
            total,
        })
    }

    /// Logs a session's pending selection and moves the session to logged.
    /// A session with nothing selected is rejected before any lookup.
    pub async fn log_selection(
        &self,
        session: &mut MenuSession,
        user: &str,
        date: Date,
    ) -> Result<LogOutcome> {
        let items = session.items_to_log()?.to_vec();
        let outcome = self.log(user, &items, date).await?;
        session.mark_logged()?;
        Ok(outcome)
    }

    /// Looks up a previously resolved dish by its matched name, trying the
    /// name as given and then its normalized title-case form.
    pub fn cached(&self, item: &str) -> Result<Option<NutritionRecord>> {
        let item = item.trim();
        if let Some(record) = self.store.cached_nutrition(item)? {
            return Ok(Some(record));
        }
        let titled = title_case(normalize(item).as_str());
        if titled == item {
            return Ok(None);
        }
        self.store.cached_nutrition(&titled)
    }

    pub fn log_items(&self, user: &str, items: &[LogItem], date: Date) -> Result<usize> {
        self.store.append(user, items, date)
    }

    pub fn daily_total(&self, user: &str, date: Date) -> Result<f64> {
        self.store.daily_total(user, date)
    }

    pub fn entries_for(&self, user: &str, date: Date) -> Result<Vec<FoodLogEntry>> {
        self.store.entries_for(user, date)
    }

    fn cache(&self, record: &NutritionRecord) {
        match self.store.upsert_nutrition(record) {
            Ok(()) => debug!("cached nutrition for '{}'", record.match_name),
            Err(err) => warn!("failed to cache nutrition for '{}': {:#}", record.match_name, err),
        }
    }
}
