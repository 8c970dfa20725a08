use anyhow::{Context, Result, anyhow};
use std::path::{Path, PathBuf};
use time::Date;

pub mod languages;
pub mod logging;
pub mod normalize;
pub mod nutrition;
pub mod ocr;
pub mod pipeline;
pub mod providers;
pub mod server;
pub mod session;
pub mod settings;
pub mod storage;
pub mod translations;
mod translator;

pub use languages::Language;
pub use nutrition::{NutritionFailure, NutritionRecord, Provenance, Resolution};
pub use pipeline::{InputError, LogOutcome, Pipeline, ScannedMenu};
pub use session::{MenuSession, SessionError, SessionState};
pub use translator::{MenuTranslator, TranslatedMenu, TranslationSource};

#[derive(Debug, Clone, Default)]
pub struct Config {
    pub settings_path: Option<String>,
}

#[derive(Debug, Clone)]
pub enum Command {
    Scan {
        image: PathBuf,
        lang: Option<String>,
        /// Menu lines to log straight away, counting from 1.
        select: Vec<usize>,
        user: Option<String>,
        date: Option<String>,
    },
    Resolve {
        dishes: Vec<String>,
    },
    Log {
        user: Option<String>,
        dishes: Vec<String>,
        date: Option<String>,
    },
    Total {
        user: Option<String>,
        date: Option<String>,
    },
    Serve {
        addr: Option<String>,
    },
}

pub async fn run(config: Config, command: Command) -> Result<String> {
    let settings_path = config.settings_path.as_deref().map(Path::new);
    let settings = settings::load_settings(settings_path)?;

    let pipeline = Pipeline::from_settings(&settings)?;
    match command {
        Command::Scan {
            image,
            lang,
            select,
            user,
            date,
        } => {
            let target = pipeline.language_or_default(lang.as_deref())?;
            let bytes = std::fs::read(&image)
                .with_context(|| format!("failed to read image: {}", image.display()))?;
            let menu = pipeline.scan_menu(&bytes, target).await?;
            let mut output = format_menu(&menu);
            if select.is_empty() {
                return Ok(output);
            }
            let user = user.unwrap_or_else(|| pipeline.default_user().to_string());
            let date = parse_date_or_today(date.as_deref())?;
            let outcome = log_menu_selection(&pipeline, menu, &select, &user, date).await?;
            output.push_str("\n\n");
            output.push_str(&format_log_outcome(&user, date, &outcome));
            Ok(output)
        }
        Command::Resolve { dishes } => {
            if dishes.is_empty() {
                return Err(anyhow!("no dish names given"));
            }
            let results = pipeline.resolve_many(&dishes).await?;
            Ok(format_resolutions(&results))
        }
        Command::Log { user, dishes, date } => {
            if dishes.is_empty() {
                return Err(anyhow!("no dish names given"));
            }
            let user = user.unwrap_or_else(|| pipeline.default_user().to_string());
            let date = parse_date_or_today(date.as_deref())?;
            let outcome = pipeline.log(&user, &dishes, date).await?;
            Ok(format_log_outcome(&user, date, &outcome))
        }
        Command::Total { user, date } => {
            let user = user.unwrap_or_else(|| pipeline.default_user().to_string());
            let date = parse_date_or_today(date.as_deref())?;
            let total = pipeline.daily_total(&user, date)?;
            Ok(format!(
                "{} on {}: {} kcal",
                user,
                storage::format_date(date),
                format_number(total)
            ))
        }
        Command::Serve { addr } => {
            let addr = addr.unwrap_or_else(|| settings.server_addr.clone());
            server::run_server(pipeline, addr).await?;
            Ok(String::new())
        }
    }
}

/// Walks a fresh session through translate, select and log for the given
/// 1-based line numbers.
async fn log_menu_selection(
    pipeline: &Pipeline,
    menu: ScannedMenu,
    numbers: &[usize],
    user: &str,
    date: Date,
) -> Result<LogOutcome> {
    let indices = numbers
        .iter()
        .map(|number| {
            number
                .checked_sub(1)
                .ok_or_else(|| anyhow!("menu line numbers start at 1"))
        })
        .collect::<Result<Vec<_>>>()?;
    let mut session = MenuSession::new();
    session.scan(menu.lines);
    session.translate(menu.translation)?;
    session.select(&indices)?;
    pipeline.log_selection(&mut session, user, date).await
}

fn parse_date_or_today(value: Option<&str>) -> Result<Date> {
    match value.map(str::trim).filter(|value| !value.is_empty()) {
        Some(value) => storage::parse_date(value),
        None => Ok(storage::today()),
    }
}

fn format_menu(menu: &ScannedMenu) -> String {
    if menu.lines.is_empty() {
        return "no menu text detected".to_string();
    }
    match menu.translation.pairs(&menu.lines) {
        Some(pairs) => pairs
            .into_iter()
            .map(|(original, translated)| format!("{} => {}", original, translated))
            .collect::<Vec<_>>()
            .join("\n"),
        None => {
            let mut output = menu.lines.join("\n");
            output.push_str(&format!(
                "\n\n[{}] translation ({} line(s) for {} item(s)):\n",
                menu.language.code(),
                menu.translation.lines.len(),
                menu.lines.len()
            ));
            output.push_str(&menu.translation.lines.join("\n"));
            output
        }
    }
}

fn format_resolutions(results: &[(String, Resolution)]) -> String {
    results
        .iter()
        .map(|(dish, resolution)| match resolution {
            Ok(record) => format!(
                "{} => {}: {} kcal, protein {}g, carbs {}g, fat {}g{}",
                dish,
                record.match_name,
                format_number(record.calories),
                format_number(record.protein),
                format_number(record.carbs),
                format_number(record.fat),
                record
                    .source
                    .map(|source| format!(" [{}]", source.as_str()))
                    .unwrap_or_default()
            ),
            Err(failure) => failure.to_string(),
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn format_log_outcome(user: &str, date: Date, outcome: &LogOutcome) -> String {
    let mut lines = outcome
        .logged
        .iter()
        .map(|item| format!("logged {} ({} kcal)", item.item_name, format_number(item.calories)))
        .collect::<Vec<_>>();
    lines.extend(outcome.unresolved.iter().map(|failure| failure.to_string()));
    lines.push(format!(
        "{} on {}: {} kcal",
        user,
        storage::format_date(date),
        format_number(outcome.total)
    ));
    lines.join("\n")
}

fn format_number(value: f64) -> String {
    if value.fract() == 0.0 {
        format!("{:.0}", value)
    } else {
        format!("{:.1}", value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nutrition::{NutritionTable, Resolver, fallback_table};
    use crate::ocr::{Detection, OcrEngine};
    use crate::pipeline::LoggedItem;
    use crate::storage::FoodLog;
    use insta::assert_snapshot;
    use std::sync::Arc;
    use time::macros::date;

    struct NoText;

    impl OcrEngine for NoText {
        fn detect(&self, _image: &[u8]) -> Result<Vec<Detection>> {
            Ok(Vec::new())
        }
    }

    fn drinks_menu() -> ScannedMenu {
        ScannedMenu {
            lines: vec!["Drinks".to_string(), "Tea".to_string(), "Coffee $3".to_string()],
            translation: TranslatedMenu {
                lines: vec!["Boissons".to_string(), "Thé".to_string(), "Café 3 $".to_string()],
                source: TranslationSource::Primary,
                aligned: true,
            },
            language: Language::Fr,
        }
    }

    fn record(name: &str, calories: f64, source: Option<Provenance>) -> NutritionRecord {
        NutritionRecord {
            match_name: name.to_string(),
            calories,
            protein: 1.0,
            carbs: 2.5,
            fat: 0.0,
            source,
        }
    }

    #[test]
    fn resolutions_render_one_line_each() {
        let results = vec![
            ("caesar salad $9".to_string(), Ok(record("Caesar Salad", 300.0, None))),
            (
                "Iced Coffee".to_string(),
                Ok(record("Coffee", 5.0, Some(Provenance::Fallback))),
            ),
            (
                "Zzqx".to_string(),
                Err(NutritionFailure {
                    query: "Zzqx".to_string(),
                }),
            ),
        ];
        assert_snapshot!(format_resolutions(&results), @r"
        caesar salad $9 => Caesar Salad: 300 kcal, protein 1g, carbs 2.5g, fat 0g
        Iced Coffee => Coffee: 5 kcal, protein 1g, carbs 2.5g, fat 0g [Fallback]
        No nutrition info found for 'Zzqx'
        ");
    }

    #[test]
    fn log_outcome_ends_with_daily_total() {
        let outcome = LogOutcome {
            logged: vec![LoggedItem {
                item_name: "Tea".to_string(),
                calories: 2.0,
            }],
            unresolved: vec![NutritionFailure {
                query: "Zzqx".to_string(),
            }],
            total: 452.5,
        };
        assert_snapshot!(format_log_outcome("alice", date!(2026 - 10 - 19), &outcome), @r"
        logged Tea (2 kcal)
        No nutrition info found for 'Zzqx'
        alice on 2026-10-19: 452.5 kcal
        ");
    }

    #[test]
    fn misaligned_menu_lists_both_blocks() {
        let menu = ScannedMenu {
            lines: vec!["Soup $5".to_string(), "Salad".to_string()],
            translation: TranslatedMenu {
                lines: vec!["Soupe et salade".to_string()],
                source: TranslationSource::Primary,
                aligned: false,
            },
            language: Language::Fr,
        };
        assert_snapshot!(format_menu(&menu), @r"
        Soup $5
        Salad

        [fr] translation (1 line(s) for 2 item(s)):
        Soupe et salade
        ");
    }

    #[tokio::test]
    async fn scanned_lines_are_logged_by_number() {
        let pipeline = Pipeline::new(
            Arc::new(NoText),
            MenuTranslator::new(),
            Resolver::new(Arc::new(NutritionTable::empty()), Arc::new(fallback_table())),
            Arc::new(FoodLog::open_in_memory().expect("store")),
        );
        let day = date!(2026 - 10 - 19);

        let err = log_menu_selection(&pipeline, drinks_menu(), &[0], "alice", day)
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "menu line numbers start at 1");
        let err = log_menu_selection(&pipeline, drinks_menu(), &[1], "alice", day)
            .await
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<SessionError>(),
            Some(SessionError::Input(InputError::MenuHeader(_)))
        ));

        let outcome = log_menu_selection(&pipeline, drinks_menu(), &[2, 3], "alice", day)
            .await
            .expect("log");
        assert_snapshot!(format_log_outcome("alice", day, &outcome), @r"
        logged Tea (2 kcal)
        logged Coffee (5 kcal)
        alice on 2026-10-19: 7 kcal
        ");
    }
}
