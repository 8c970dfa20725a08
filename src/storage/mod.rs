//! SQLite-backed food log and menu history.

mod migrations;

use anyhow::{Context, Result, anyhow};
use rusqlite::{Connection, OptionalExtension, Transaction, params};
use serde::Serialize;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use time::format_description::well_known::Rfc3339;
use time::macros::format_description;
use time::{Date, OffsetDateTime};
use tracing::{debug, info};

use crate::nutrition::{NutritionRecord, Provenance};
use migrations::run_migrations;

/// One item to append to a user's log.
#[derive(Debug, Clone, PartialEq)]
pub struct LogItem {
    pub name: String,
    pub calories: f64,
}

impl LogItem {
    pub fn new(name: impl Into<String>, calories: f64) -> Self {
        Self {
            name: name.into(),
            calories,
        }
    }
}

impl From<&NutritionRecord> for LogItem {
    fn from(record: &NutritionRecord) -> Self {
        Self::new(record.match_name.clone(), record.calories)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FoodLogEntry {
    pub item_name: String,
    pub calories: f64,
    pub date: String,
}

/// Append-only food log with per-day calorie totals.
pub struct FoodLog {
    conn: Mutex<Connection>,
}

impl FoodLog {
    pub fn open(path: &Path) -> Result<Self> {
        if path.as_os_str() == ":memory:" {
            return Self::open_in_memory();
        }
        if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).with_context(|| {
                format!("failed to create database directory: {}", parent.display())
            })?;
        }
        let conn = Connection::open(path)
            .with_context(|| format!("failed to open database: {}", path.display()))?;
        info!("opened food log at {}", path.display());
        Self::from_connection(conn)
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().context("failed to open in-memory database")?;
        Self::from_connection(conn)
    }

    fn from_connection(mut conn: Connection) -> Result<Self> {
        conn.pragma_update(None, "foreign_keys", "ON")
            .context("failed to enable foreign keys")?;
        run_migrations(&mut conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| anyhow!("food log connection lock poisoned"))
    }

    /// Appends every item in one transaction. Nothing is written when any
    /// item is invalid or the insert fails part way.
    pub fn append(&self, user: &str, items: &[LogItem], date: Date) -> Result<usize> {
        let user = validate_user(user)?;
        for item in items {
            if item.name.trim().is_empty() {
                return Err(anyhow!("log item name is empty"));
            }
            if !item.calories.is_finite() || item.calories < 0.0 {
                return Err(anyhow!(
                    "invalid calories {} for '{}'",
                    item.calories,
                    item.name
                ));
            }
        }
        if items.is_empty() {
            return Ok(0);
        }

        let mut conn = self.lock()?;
        let tx = conn
            .transaction()
            .context("failed to open log transaction")?;
        let user_id = ensure_user(&tx, user)?;
        let day = format_date(date);
        let created_at = now_rfc3339()?;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO food_log (user_id, item_name, calories, logged_on, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
            )?;
            for item in items {
                stmt.execute(params![
                    user_id,
                    item.name.trim(),
                    item.calories,
                    day,
                    created_at
                ])?;
            }
        }
        tx.commit().context("failed to commit food log entries")?;
        debug!("logged {} item(s) for '{}' on {}", items.len(), user, day);
        Ok(items.len())
    }

    /// Calories logged by `user` on `date`; 0 when nothing was logged.
    pub fn daily_total(&self, user: &str, date: Date) -> Result<f64> {
        let user = validate_user(user)?;
        let conn = self.lock()?;
        let total: f64 = conn.query_row(
            "SELECT COALESCE(SUM(f.calories), 0.0)
             FROM food_log f
             JOIN users u ON u.id = f.user_id
             WHERE u.name = ?1 AND f.logged_on = ?2",
            params![user, format_date(date)],
            |row| row.get(0),
        )?;
        Ok(total)
    }

    pub fn entries_for(&self, user: &str, date: Date) -> Result<Vec<FoodLogEntry>> {
        let user = validate_user(user)?;
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT f.item_name, f.calories, f.logged_on
             FROM food_log f
             JOIN users u ON u.id = f.user_id
             WHERE u.name = ?1 AND f.logged_on = ?2
             ORDER BY f.id",
        )?;
        let rows = stmt.query_map(params![user, format_date(date)], |row| {
            Ok(FoodLogEntry {
                item_name: row.get(0)?,
                calories: row.get(1)?,
                date: row.get(2)?,
            })
        })?;
        rows.collect::<rusqlite::Result<Vec<_>>>()
            .context("failed to read food log entries")
    }

    /// Stores scanned menu lines with their translation, when one lined up.
    pub fn save_menu_items(&self, items: &[(String, Option<String>)]) -> Result<usize> {
        if items.is_empty() {
            return Ok(0);
        }
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        let created_at = now_rfc3339()?;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO menu_items (original_text, translated_text, created_at)
                 VALUES (?1, ?2, ?3)",
            )?;
            for (original, translated) in items {
                stmt.execute(params![original, translated, created_at])?;
            }
        }
        tx.commit().context("failed to commit menu items")?;
        Ok(items.len())
    }

    pub fn upsert_nutrition(&self, record: &NutritionRecord) -> Result<()> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO nutrition (item_name, calories, protein, carbs, fat, source, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
             ON CONFLICT(item_name) DO UPDATE SET
                 calories = excluded.calories,
                 protein = excluded.protein,
                 carbs = excluded.carbs,
                 fat = excluded.fat,
                 source = excluded.source,
                 updated_at = excluded.updated_at",
            params![
                record.match_name,
                record.calories,
                record.protein,
                record.carbs,
                record.fat,
                record.source.map(|source| source.as_str()),
                now_rfc3339()?,
            ],
        )?;
        Ok(())
    }

    pub fn cached_nutrition(&self, item_name: &str) -> Result<Option<NutritionRecord>> {
        let conn = self.lock()?;
        let record = conn
            .query_row(
                "SELECT item_name, calories, protein, carbs, fat, source
                 FROM nutrition WHERE item_name = ?1",
                params![item_name],
                |row| {
                    let source: Option<String> = row.get(5)?;
                    Ok(NutritionRecord {
                        match_name: row.get(0)?,
                        calories: row.get(1)?,
                        protein: row.get(2)?,
                        carbs: row.get(3)?,
                        fat: row.get(4)?,
                        source: source.as_deref().and_then(Provenance::parse),
                    })
                },
            )
            .optional()?;
        Ok(record)
    }
}

fn ensure_user(tx: &Transaction<'_>, user: &str) -> Result<i64> {
    tx.execute(
        "INSERT OR IGNORE INTO users (name, created_at) VALUES (?1, ?2)",
        params![user, now_rfc3339()?],
    )?;
    let id = tx.query_row(
        "SELECT id FROM users WHERE name = ?1",
        params![user],
        |row| row.get(0),
    )?;
    Ok(id)
}

fn validate_user(user: &str) -> Result<&str> {
    let user = user.trim();
    if user.is_empty() {
        return Err(anyhow!("user name is empty"));
    }
    Ok(user)
}

fn now_rfc3339() -> Result<String> {
    OffsetDateTime::now_utc()
        .format(&Rfc3339)
        .context("failed to format timestamp")
}

pub fn format_date(date: Date) -> String {
    format!(
        "{:04}-{:02}-{:02}",
        date.year(),
        u8::from(date.month()),
        date.day()
    )
}

pub fn parse_date(value: &str) -> Result<Date> {
    Date::parse(value.trim(), format_description!("[year]-[month]-[day]"))
        .with_context(|| format!("invalid date '{}' (expected YYYY-MM-DD)", value))
}

/// Today's date in the local offset, or UTC when the offset is unknown.
pub fn today() -> Date {
    OffsetDateTime::now_local()
        .unwrap_or_else(|_| OffsetDateTime::now_utc())
        .date()
}
