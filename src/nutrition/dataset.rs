use anyhow::{Context, Result, anyhow};
use std::fs;
use std::path::Path;
use tracing::{info, warn};

use super::matcher::best_match;

const NAME_COLUMN: &str = "item_name";
const CALORIES_COLUMN: &str = "nf_calories";
const PROTEIN_COLUMN: &str = "nf_protein";
const CARBS_COLUMN: &str = "nf_total_carbohydrate";
const FAT_COLUMN: &str = "nf_total_fat";

#[derive(Debug, Clone, PartialEq)]
pub struct TableRow {
    pub name: String,
    pub calories: f64,
    pub protein: f64,
    pub carbs: f64,
    pub fat: f64,
}

impl TableRow {
    pub fn new(name: &str, calories: f64, protein: f64, carbs: f64, fat: f64) -> Self {
        Self {
            name: name.trim().to_lowercase(),
            calories,
            protein,
            carbs,
            fat,
        }
    }
}

/// Dish names with nutrition values, lower-cased at construction. Read-only
/// once built.
#[derive(Debug, Clone, Default)]
pub struct NutritionTable {
    rows: Vec<TableRow>,
}

impl NutritionTable {
    pub fn new(rows: Vec<TableRow>) -> Self {
        let rows = rows
            .into_iter()
            .map(|row| TableRow {
                name: row.name.trim().to_lowercase(),
                ..row
            })
            .filter(|row| !row.name.is_empty())
            .collect();
        Self { rows }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn rows(&self) -> &[TableRow] {
        &self.rows
    }

    /// Closest row to an already-normalized query, if it clears `floor`.
    pub fn closest(&self, query: &str, floor: f64) -> Option<&TableRow> {
        let names = self.rows.iter().map(|row| row.name.as_str());
        best_match(query, names, floor).map(|(idx, _)| &self.rows[idx])
    }
}

/// Loads the reference CSV. A missing or unreadable file is not fatal: the
/// problem is logged and an empty table comes back.
pub fn load_reference_table(path: &Path) -> NutritionTable {
    match read_reference_csv(path) {
        Ok(table) => {
            info!(
                "loaded {} reference dishes from {}",
                table.len(),
                path.display()
            );
            table
        }
        Err(err) => {
            warn!("reference dataset unavailable ({:#}); using empty table", err);
            NutritionTable::empty()
        }
    }
}

fn read_reference_csv(path: &Path) -> Result<NutritionTable> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("failed to read dataset: {}", path.display()))?;
    parse_reference_csv(&content)
        .with_context(|| format!("failed to parse dataset: {}", path.display()))
}

fn parse_reference_csv(content: &str) -> Result<NutritionTable> {
    let mut records = split_csv_records(content.trim_start_matches('\u{feff}')).into_iter();
    let header = records.next().ok_or_else(|| anyhow!("dataset is empty"))?;
    let column = |name: &str| {
        header
            .iter()
            .position(|value| value.trim().eq_ignore_ascii_case(name))
    };
    let name_idx = column(NAME_COLUMN).ok_or_else(|| anyhow!("missing '{}' column", NAME_COLUMN))?;
    let calories_idx = column(CALORIES_COLUMN);
    let protein_idx = column(PROTEIN_COLUMN);
    let carbs_idx = column(CARBS_COLUMN);
    let fat_idx = column(FAT_COLUMN);

    let mut rows = Vec::new();
    for fields in records {
        let Some(name) = fields.get(name_idx) else {
            continue;
        };
        let number = |idx: Option<usize>| {
            idx.and_then(|idx| fields.get(idx))
                .and_then(|value| value.trim().parse::<f64>().ok())
                .filter(|value| value.is_finite())
                .unwrap_or(0.0)
        };
        rows.push(TableRow::new(
            name,
            number(calories_idx),
            number(protein_idx),
            number(carbs_idx),
            number(fat_idx),
        ));
    }
    Ok(NutritionTable::new(rows))
}

/// Splits CSV text into records of fields. Double-quoted fields may hold
/// commas, `""` escapes and line breaks. Blank lines are skipped.
fn split_csv_records(content: &str) -> Vec<Vec<String>> {
    let mut records = Vec::new();
    let mut fields = Vec::new();
    let mut field = String::new();
    let mut in_quotes = false;
    let mut chars = content.chars().peekable();
    while let Some(ch) = chars.next() {
        match ch {
            '"' if in_quotes => {
                if chars.peek() == Some(&'"') {
                    field.push('"');
                    chars.next();
                } else {
                    in_quotes = false;
                }
            }
            '"' if field.is_empty() => in_quotes = true,
            ',' if !in_quotes => fields.push(std::mem::take(&mut field)),
            '\r' if !in_quotes && chars.peek() == Some(&'\n') => {}
            '\n' if !in_quotes => finish_record(&mut records, &mut fields, &mut field),
            _ => field.push(ch),
        }
    }
    finish_record(&mut records, &mut fields, &mut field);
    records
}

fn finish_record(records: &mut Vec<Vec<String>>, fields: &mut Vec<String>, field: &mut String) {
    fields.push(std::mem::take(field));
    let record = std::mem::take(fields);
    if record.iter().any(|value| !value.trim().is_empty()) {
        records.push(record);
    }
}
