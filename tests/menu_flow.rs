use std::sync::Arc;

use anyhow::Result;
use nutrilingo::nutrition::{
    ApiError, ApiFood, NutritionApi, NutritionApiFuture, Resolver, fallback_table,
    load_reference_table,
};
use nutrilingo::ocr::{Detection, OcrEngine};
use nutrilingo::providers::{ProviderKind, TranslationFuture, TranslationProvider};
use nutrilingo::storage::FoodLog;
use nutrilingo::{Language, MenuSession, MenuTranslator, Pipeline, Provenance, SessionError};
use tempfile::tempdir;
use time::macros::date;

const DATASET: &str = "\
item_name,brand_name,nf_calories,nf_total_fat,nf_total_carbohydrate,nf_protein
\"Caesar Salad, Classic\",Bistro,300,22,12,8
Margherita Pizza,Bistro,800,30,95,34
";

struct MenuPhoto;

impl OcrEngine for MenuPhoto {
    fn detect(&self, _image: &[u8]) -> Result<Vec<Detection>> {
        Ok(vec![
            Detection::new("Desserts", 0.0, 4.0),
            Detection::new("Fruit", 0.0, 40.0),
            Detection::new("Salad", 45.0, 42.0),
            Detection::new("$6", 120.0, 41.0),
            Detection::new("Margherita", 0.0, 80.0),
            Detection::new("Pizza", 90.0, 83.0),
            Detection::new("€12.50", 150.0, 81.0),
            Detection::new("Chai", 0.0, 120.0),
        ])
    }
}

struct Echo;

impl TranslationProvider for Echo {
    fn kind(&self) -> ProviderKind {
        ProviderKind::OpenAI
    }

    fn translate<'a>(&'a self, text: &'a str, target: Language) -> TranslationFuture<'a> {
        Box::pin(async move {
            Ok(text
                .lines()
                .map(|line| format!("[{}] {}", target, line))
                .collect::<Vec<_>>()
                .join("\n"))
        })
    }
}

struct ChaiApi;

impl NutritionApi for ChaiApi {
    fn search<'a>(&'a self, query: &'a str) -> NutritionApiFuture<'a> {
        Box::pin(async move {
            if query == "chai" {
                Ok(ApiFood {
                    name: Some("Chai Tea Latte".to_string()),
                    description: "Per 1 cup - Calories: 120kcal | Fat: 4.5g | Carbs: 17g | Protein: 4g"
                        .to_string(),
                })
            } else {
                Err(ApiError::NoResults)
            }
        })
    }
}

fn pipeline(dir: &std::path::Path) -> Pipeline {
    let csv = dir.join("restaurant_sample.csv");
    std::fs::write(&csv, DATASET).expect("write dataset");
    let resolver = Resolver::new(
        Arc::new(load_reference_table(&csv)),
        Arc::new(fallback_table()),
    )
    .with_api(Arc::new(ChaiApi));
    let store = FoodLog::open(&dir.join("log.db")).expect("open store");
    Pipeline::new(
        Arc::new(MenuPhoto),
        MenuTranslator::new().with_primary(Arc::new(Echo)),
        resolver,
        Arc::new(store),
    )
}

#[tokio::test]
async fn photo_to_daily_total() {
    let dir = tempdir().expect("tempdir");
    let pipeline = pipeline(dir.path());
    let mut session = MenuSession::new();

    let menu = pipeline
        .scan_menu(b"jpeg bytes", Language::Fr)
        .await
        .expect("scan");
    assert_eq!(
        menu.lines,
        vec!["Desserts", "Fruit Salad $6", "Margherita Pizza €12.50", "Chai"]
    );
    assert_eq!(menu.translation.lines[1], "[fr] Fruit Salad $6");

    session.scan(menu.lines.clone());
    session.translate(menu.translation.clone()).expect("translate");
    assert!(matches!(
        session.select(&[0]),
        Err(SessionError::Input(_))
    ));
    let items = session.select(&[1, 2, 3]).expect("select").to_vec();

    let day = date!(2026 - 10 - 19);
    let outcome = pipeline.log("sam", &items, day).await.expect("log");
    session.mark_logged().expect("mark logged");

    let names = outcome
        .logged
        .iter()
        .map(|item| item.item_name.as_str())
        .collect::<Vec<_>>();
    assert_eq!(names, vec!["Fruit Salad", "Margherita Pizza", "Chai Tea Latte"]);
    assert!(outcome.unresolved.is_empty());
    assert_eq!(outcome.total, 150.0 + 800.0 + 120.0);
    assert_eq!(
        pipeline.daily_total("sam", day).expect("total"),
        1070.0
    );
    assert_eq!(pipeline.daily_total("sam", date!(2026 - 10 - 20)).expect("next day"), 0.0);
}

#[tokio::test]
async fn each_tier_is_tagged() {
    let dir = tempdir().expect("tempdir");
    let pipeline = pipeline(dir.path());
    let dishes = vec![
        "Caesar Salad, Classic 9".to_string(),
        "Chai".to_string(),
        "Orange Juice".to_string(),
        "Unobtainium Stew".to_string(),
    ];
    let results = pipeline.resolve_many(&dishes).await.expect("valid input");
    let queries = results
        .iter()
        .map(|(query, _)| query.as_str())
        .collect::<Vec<_>>();
    assert_eq!(queries, dishes.iter().map(String::as_str).collect::<Vec<_>>());

    let dataset = results[0].1.as_ref().expect("dataset");
    assert_eq!(dataset.match_name, "Caesar Salad, Classic");
    assert_eq!(dataset.source, None);
    assert_eq!(dataset.protein, 8.0);

    let api = results[1].1.as_ref().expect("api");
    assert_eq!(api.source, Some(Provenance::Api));
    assert_eq!(api.calories, 120.0);
    assert_eq!(api.fat, 4.5);
    assert_eq!(
        serde_json::to_value(api).expect("json")["source"],
        "FatSecret"
    );

    let fallback = results[2].1.as_ref().expect("fallback");
    assert_eq!(fallback.source, Some(Provenance::Fallback));
    assert_eq!(fallback.match_name, "Orange Juice");

    let failure = results[3].1.as_ref().unwrap_err();
    assert_eq!(
        failure.to_string(),
        "No nutrition info found for 'Unobtainium Stew'"
    );
}

#[tokio::test]
async fn log_survives_restart() {
    let dir = tempdir().expect("tempdir");
    let day = date!(2026 - 10 - 19);
    {
        let pipeline = pipeline(dir.path());
        pipeline
            .log("sam", &["Coffee".to_string()], day)
            .await
            .expect("log");
    }
    let pipeline = pipeline(dir.path());
    pipeline
        .log("sam", &["Tea".to_string()], day)
        .await
        .expect("log");
    let entries = pipeline.entries_for("sam", day).expect("entries");
    assert_eq!(entries.len(), 2);
    assert_eq!(pipeline.daily_total("sam", day).expect("total"), 7.0);
}
