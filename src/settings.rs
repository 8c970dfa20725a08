use anyhow::{Context, Result, anyhow};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::languages::Language;
use crate::nutrition::DEFAULT_SIMILARITY_FLOOR;
use crate::ocr::DEFAULT_LINE_THRESHOLD;

const DEFAULT_SETTINGS_TOML: &str = include_str!("../settings.toml");

#[derive(Debug, Clone)]
pub struct Settings {
    pub ocr_languages: String,
    pub ocr_psm: u32,
    pub line_threshold: f32,
    pub default_language: Language,
    pub translation_model: Option<String>,
    pub translation_max_attempts: usize,
    pub dataset_path: PathBuf,
    pub similarity_floor: f64,
    pub fatsecret_token_url: Option<String>,
    pub fatsecret_search_url: Option<String>,
    pub http_timeout: Duration,
    pub database_path: PathBuf,
    pub default_user: String,
    pub server_addr: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            ocr_languages: "eng".to_string(),
            ocr_psm: 6,
            line_threshold: DEFAULT_LINE_THRESHOLD,
            default_language: Language::En,
            translation_model: None,
            translation_max_attempts: 3,
            dataset_path: PathBuf::from("restaurant_sample.csv"),
            similarity_floor: DEFAULT_SIMILARITY_FLOOR,
            fatsecret_token_url: None,
            fatsecret_search_url: None,
            http_timeout: Duration::from_secs(10),
            database_path: PathBuf::from("nutrilingo.db"),
            default_user: "default".to_string(),
            server_addr: "127.0.0.1:11223".to_string(),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct SettingsFile {
    ocr: Option<OcrSettings>,
    translation: Option<TranslationSettings>,
    nutrition: Option<NutritionSettings>,
    http: Option<HttpSettings>,
    storage: Option<StorageSettings>,
    server: Option<ServerSettings>,
}

#[derive(Debug, Default, Deserialize)]
struct OcrSettings {
    languages: Option<String>,
    psm: Option<u32>,
    line_threshold: Option<f32>,
}

#[derive(Debug, Default, Deserialize)]
struct TranslationSettings {
    default_language: Option<String>,
    model: Option<String>,
    max_attempts: Option<usize>,
}

#[derive(Debug, Default, Deserialize)]
struct NutritionSettings {
    dataset_path: Option<String>,
    similarity_floor: Option<f64>,
    fatsecret_token_url: Option<String>,
    fatsecret_search_url: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct HttpSettings {
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct StorageSettings {
    database_path: Option<String>,
    default_user: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct ServerSettings {
    addr: Option<String>,
}

/// Merges the embedded defaults, `./settings.toml`, `./settings.local.toml`,
/// the same pair under `~/.nutrilingo/`, then `extra_path`. Later files win.
pub fn load_settings(extra_path: Option<&Path>) -> Result<Settings> {
    let mut settings = Settings::default();
    settings.apply_toml(DEFAULT_SETTINGS_TOML, "embedded defaults")?;

    let mut ordered_paths = vec![
        PathBuf::from("settings.toml"),
        PathBuf::from("settings.local.toml"),
    ];
    if let Some(home) = home_dir() {
        ordered_paths.push(home.join("settings.toml"));
        ordered_paths.push(home.join("settings.local.toml"));
    }
    if let Some(extra) = extra_path {
        if !extra.exists() {
            return Err(anyhow!("settings file not found: {}", extra.display()));
        }
        ordered_paths.push(extra.to_path_buf());
    }

    for path in ordered_paths {
        if path.exists() {
            let content = fs::read_to_string(&path)
                .with_context(|| format!("failed to read settings: {}", path.display()))?;
            settings.apply_toml(&content, &path.display().to_string())?;
        }
    }

    Ok(settings)
}

impl Settings {
    fn apply_toml(&mut self, content: &str, origin: &str) -> Result<()> {
        let parsed: SettingsFile = toml::from_str(content)
            .with_context(|| format!("failed to parse settings: {}", origin))?;
        self.merge(parsed)
            .with_context(|| format!("invalid settings: {}", origin))
    }

    fn merge(&mut self, incoming: SettingsFile) -> Result<()> {
        if let Some(ocr) = incoming.ocr {
            if let Some(languages) = non_blank(ocr.languages) {
                self.ocr_languages = languages;
            }
            if let Some(psm) = ocr.psm {
                self.ocr_psm = psm;
            }
            if let Some(threshold) = ocr.line_threshold {
                if threshold > 0.0 {
                    self.line_threshold = threshold;
                }
            }
        }
        if let Some(translation) = incoming.translation {
            if let Some(code) = non_blank(translation.default_language) {
                self.default_language = Language::parse(&code).ok_or_else(|| {
                    anyhow!(
                        "unsupported default_language '{}' (expected one of {})",
                        code,
                        Language::supported_codes()
                    )
                })?;
            }
            if let Some(model) = non_blank(translation.model) {
                self.translation_model = Some(model);
            }
            if let Some(attempts) = translation.max_attempts {
                if attempts > 0 {
                    self.translation_max_attempts = attempts;
                }
            }
        }
        if let Some(nutrition) = incoming.nutrition {
            if let Some(path) = non_blank(nutrition.dataset_path) {
                self.dataset_path = PathBuf::from(path);
            }
            if let Some(floor) = nutrition.similarity_floor {
                if !(0.0..=1.0).contains(&floor) {
                    return Err(anyhow!(
                        "similarity_floor must be between 0 and 1 (got {})",
                        floor
                    ));
                }
                self.similarity_floor = floor;
            }
            if let Some(url) = non_blank(nutrition.fatsecret_token_url) {
                self.fatsecret_token_url = Some(url);
            }
            if let Some(url) = non_blank(nutrition.fatsecret_search_url) {
                self.fatsecret_search_url = Some(url);
            }
        }
        if let Some(http) = incoming.http {
            if let Some(secs) = http.timeout_secs {
                if secs > 0 {
                    self.http_timeout = Duration::from_secs(secs);
                }
            }
        }
        if let Some(storage) = incoming.storage {
            if let Some(path) = non_blank(storage.database_path) {
                self.database_path = PathBuf::from(path);
            }
            if let Some(user) = non_blank(storage.default_user) {
                self.default_user = user;
            }
        }
        if let Some(server) = incoming.server {
            if let Some(addr) = non_blank(server.addr) {
                self.server_addr = addr;
            }
        }
        Ok(())
    }

    /// Relative database paths live under the app home directory when one
    /// is available.
    pub fn resolved_database_path(&self) -> PathBuf {
        let path = &self.database_path;
        if path.as_os_str() == ":memory:" || path.is_absolute() {
            return path.clone();
        }
        match home_dir() {
            Some(home) => home.join(path),
            None => path.clone(),
        }
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

pub fn home_dir() -> Option<PathBuf> {
    std::env::var("HOME").ok().and_then(|home| {
        let home = home.trim();
        if home.is_empty() {
            None
        } else {
            Some(Path::new(home).join(".nutrilingo"))
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn embedded_defaults_parse() {
        let mut settings = Settings::default();
        settings
            .apply_toml(DEFAULT_SETTINGS_TOML, "embedded")
            .expect("defaults");
        assert_eq!(settings.line_threshold, 15.0);
        assert_eq!(settings.similarity_floor, 0.6);
        assert_eq!(settings.default_language, Language::En);
        assert_eq!(settings.translation_model.as_deref(), Some("gpt-4o-mini"));
        assert_eq!(settings.http_timeout, Duration::from_secs(10));
    }

    #[test]
    fn extra_file_overrides_values() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("custom.toml");
        fs::write(
            &path,
            "[ocr]\nline_threshold = 20.0\n\n[translation]\ndefault_language = \"FR\"\n\n[storage]\ndatabase_path = \":memory:\"\n",
        )
        .expect("write settings");
        let settings = load_settings(Some(&path)).expect("settings");
        assert_eq!(settings.line_threshold, 20.0);
        assert_eq!(settings.default_language, Language::Fr);
        assert_eq!(settings.resolved_database_path(), PathBuf::from(":memory:"));
    }

    #[test]
    fn missing_extra_file_is_an_error() {
        let dir = tempdir().expect("tempdir");
        let err = load_settings(Some(&dir.path().join("nope.toml"))).unwrap_err();
        assert!(err.to_string().contains("settings file not found"));
    }

    #[test]
    fn rejects_out_of_range_floor_and_unknown_language() {
        let mut settings = Settings::default();
        assert!(
            settings
                .apply_toml("[nutrition]\nsimilarity_floor = 1.5\n", "test")
                .is_err()
        );
        assert!(
            settings
                .apply_toml("[translation]\ndefault_language = \"pt\"\n", "test")
                .is_err()
        );
    }

    #[test]
    fn blank_values_keep_previous_setting() {
        let mut settings = Settings::default();
        settings
            .apply_toml("[ocr]\nlanguages = \"  \"\nline_threshold = -3.0\n", "test")
            .expect("apply");
        assert_eq!(settings.ocr_languages, "eng");
        assert_eq!(settings.line_threshold, DEFAULT_LINE_THRESHOLD);
    }
}
