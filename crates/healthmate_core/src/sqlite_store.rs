//! SQLite implementation of the [`HealthStore`](crate::HealthStore) trait.
//!
//! Phone-number uniqueness is enforced by the schema; `get_or_create_user`
//! is insert-or-ignore followed by an unconditional re-fetch, so a losing
//! writer in a concurrent race simply picks up the row the winner created.

use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveTime, TimeDelta, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};

use crate::{
    ACTIVITY_LEVELS, HealthError, HealthSnapshot, HealthStore, HealthTip, NewTip, ProfilePatch,
    SnapshotPatch, StepLogEntry, User, WaterLogEntry,
};

#[derive(Clone)]
pub struct SqliteHealthStore {
    pool: SqlitePool,
}

impl SqliteHealthStore {
    /// Open (creating if missing) the database at `database_url` and apply
    /// the embedded migrations.
    pub async fn connect(database_url: &str) -> Result<Self, HealthError> {
        let options = SqliteConnectOptions::from_str(database_url)?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .foreign_keys(true)
            .busy_timeout(Duration::from_secs(5));
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await?;
        let store = Self { pool };
        store.run_migrations().await?;
        Ok(store)
    }

    /// In-memory store for tests and local experiments. A single pooled
    /// connection keeps every caller on the same database.
    pub async fn in_memory() -> Result<Self, HealthError> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")?.foreign_keys(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await?;
        let store = Self { pool };
        store.run_migrations().await?;
        Ok(store)
    }

    pub async fn run_migrations(&self) -> Result<(), HealthError> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    async fn fetch_user(&self, phone_number: &str) -> Result<Option<User>, HealthError> {
        let record = sqlx::query_as::<_, UserRecord>(
            "SELECT id, phone_number, name, age, gender, height_cm, weight_kg, \
             activity_level, created_at, updated_at FROM users WHERE phone_number = ?1",
        )
        .bind(phone_number)
        .fetch_optional(&self.pool)
        .await?;
        Ok(record.map(UserRecord::into_domain))
    }
}

/// The UTC day window `[00:00, 24:00)` used for daily bucketing.
fn day_window(date: NaiveDate) -> (DateTime<Utc>, DateTime<Utc>) {
    let start = date.and_time(NaiveTime::MIN).and_utc();
    (start, start + TimeDelta::days(1))
}

#[derive(sqlx::FromRow)]
struct UserRecord {
    id: i64,
    phone_number: String,
    name: Option<String>,
    age: Option<i64>,
    gender: Option<String>,
    height_cm: Option<f64>,
    weight_kg: Option<f64>,
    activity_level: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl UserRecord {
    fn into_domain(self) -> User {
        User {
            id: self.id,
            phone_number: self.phone_number,
            name: self.name,
            age: self.age,
            gender: self.gender,
            height_cm: self.height_cm,
            weight_kg: self.weight_kg,
            activity_level: self.activity_level,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

#[derive(sqlx::FromRow)]
struct SnapshotRecord {
    id: i64,
    user_id: i64,
    record_date: NaiveDate,
    weight_kg: Option<f64>,
    bp_systolic: Option<i64>,
    bp_diastolic: Option<i64>,
    heart_rate: Option<i64>,
    sleep_hours: Option<f64>,
    mood_score: Option<i64>,
    energy_level: Option<i64>,
    notes: Option<String>,
    created_at: DateTime<Utc>,
}

impl SnapshotRecord {
    fn into_domain(self) -> HealthSnapshot {
        HealthSnapshot {
            id: self.id,
            user_id: self.user_id,
            record_date: self.record_date,
            weight_kg: self.weight_kg,
            bp_systolic: self.bp_systolic,
            bp_diastolic: self.bp_diastolic,
            heart_rate: self.heart_rate,
            sleep_hours: self.sleep_hours,
            mood_score: self.mood_score,
            energy_level: self.energy_level,
            notes: self.notes,
            created_at: self.created_at,
        }
    }
}

#[derive(sqlx::FromRow)]
struct TipRecord {
    id: i64,
    title: String,
    content: String,
    category: String,
    generated_at: DateTime<Utc>,
    share_count: i64,
}

impl TipRecord {
    fn into_domain(self) -> HealthTip {
        HealthTip {
            id: self.id,
            title: self.title,
            content: self.content,
            category: self.category,
            generated_at: self.generated_at,
            share_count: self.share_count,
        }
    }
}

fn scale_error(field: &str) -> HealthError {
    HealthError::Validation(format!("{field} must be between 1 and 10"))
}

#[async_trait]
impl HealthStore for SqliteHealthStore {
    async fn get_or_create_user(&self, phone_number: &str) -> Result<User, HealthError> {
        if phone_number.trim().is_empty() {
            return Err(HealthError::Validation("phone_number is required".into()));
        }
        let now = Utc::now();
        let inserted = sqlx::query(
            "INSERT INTO users (phone_number, activity_level, created_at, updated_at) \
             VALUES (?1, 'moderate', ?2, ?2) ON CONFLICT(phone_number) DO NOTHING",
        )
        .bind(phone_number)
        .bind(now)
        .execute(&self.pool)
        .await?;
        if inserted.rows_affected() == 1 {
            tracing::info!(%phone_number, "created user");
            metrics::counter!("healthmate_users_created_total").increment(1);
        }

        // Re-fetch unconditionally: if the insert lost a race, another
        // writer committed the row we want.
        self.fetch_user(phone_number).await?.ok_or_else(|| {
            HealthError::NotFound(format!("user {phone_number} vanished after insert"))
        })
    }

    async fn find_user(&self, phone_number: &str) -> Result<Option<User>, HealthError> {
        self.fetch_user(phone_number).await
    }

    async fn update_profile(
        &self,
        phone_number: &str,
        patch: ProfilePatch,
    ) -> Result<User, HealthError> {
        if let Some(level) = patch.activity_level.as_deref() {
            if !ACTIVITY_LEVELS.contains(&level) {
                return Err(HealthError::Validation(format!(
                    "activity_level must be one of {ACTIVITY_LEVELS:?}, got {level:?}"
                )));
            }
        }
        if patch.height_cm.is_some_and(|h| h <= 0.0) {
            return Err(HealthError::Validation("height_cm must be positive".into()));
        }
        if patch.weight_kg.is_some_and(|w| w <= 0.0) {
            return Err(HealthError::Validation("weight_kg must be positive".into()));
        }

        let updated = sqlx::query(
            "UPDATE users SET \
               name = COALESCE(?1, name), \
               age = COALESCE(?2, age), \
               gender = COALESCE(?3, gender), \
               height_cm = COALESCE(?4, height_cm), \
               weight_kg = COALESCE(?5, weight_kg), \
               activity_level = COALESCE(?6, activity_level), \
               updated_at = ?7 \
             WHERE phone_number = ?8",
        )
        .bind(&patch.name)
        .bind(patch.age)
        .bind(&patch.gender)
        .bind(patch.height_cm)
        .bind(patch.weight_kg)
        .bind(&patch.activity_level)
        .bind(Utc::now())
        .bind(phone_number)
        .execute(&self.pool)
        .await?;
        if updated.rows_affected() == 0 {
            return Err(HealthError::NotFound(format!("user {phone_number}")));
        }

        self.fetch_user(phone_number)
            .await?
            .ok_or_else(|| HealthError::NotFound(format!("user {phone_number}")))
    }

    async fn append_water(
        &self,
        user_id: i64,
        amount_ml: i64,
        note: Option<String>,
    ) -> Result<WaterLogEntry, HealthError> {
        if amount_ml <= 0 {
            return Err(HealthError::Validation("amount_ml must be positive".into()));
        }
        let logged_at = Utc::now();
        let result = sqlx::query(
            "INSERT INTO water_logs (user_id, amount_ml, logged_at, note) VALUES (?1, ?2, ?3, ?4)",
        )
        .bind(user_id)
        .bind(amount_ml)
        .bind(logged_at)
        .bind(&note)
        .execute(&self.pool)
        .await?;
        metrics::counter!("healthmate_water_logs_total").increment(1);

        Ok(WaterLogEntry {
            id: result.last_insert_rowid(),
            user_id,
            amount_ml,
            logged_at,
            note,
        })
    }

    async fn append_steps(
        &self,
        user_id: i64,
        steps: i64,
        distance_km: Option<f64>,
        calories_burned: Option<f64>,
    ) -> Result<StepLogEntry, HealthError> {
        if steps <= 0 {
            return Err(HealthError::Validation("steps must be positive".into()));
        }
        let logged_at = Utc::now();
        let result = sqlx::query(
            "INSERT INTO step_logs (user_id, steps, logged_at, distance_km, calories_burned) \
             VALUES (?1, ?2, ?3, ?4, ?5)",
        )
        .bind(user_id)
        .bind(steps)
        .bind(logged_at)
        .bind(distance_km)
        .bind(calories_burned)
        .execute(&self.pool)
        .await?;
        metrics::counter!("healthmate_step_logs_total").increment(1);

        Ok(StepLogEntry {
            id: result.last_insert_rowid(),
            user_id,
            steps,
            logged_at,
            distance_km,
            calories_burned,
        })
    }

    async fn append_snapshot(
        &self,
        user_id: i64,
        patch: SnapshotPatch,
    ) -> Result<HealthSnapshot, HealthError> {
        if patch.mood_score.is_some_and(|mood| !(1..=10).contains(&mood)) {
            return Err(scale_error("mood_score"));
        }
        if patch
            .energy_level
            .is_some_and(|energy| !(1..=10).contains(&energy))
        {
            return Err(scale_error("energy_level"));
        }
        if patch.weight_kg.is_some_and(|w| w <= 0.0) {
            return Err(HealthError::Validation("weight_kg must be positive".into()));
        }

        let created_at = Utc::now();
        let record_date = created_at.date_naive();
        let result = sqlx::query(
            "INSERT INTO health_snapshots (user_id, record_date, weight_kg, bp_systolic, \
             bp_diastolic, heart_rate, sleep_hours, mood_score, energy_level, notes, created_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
        )
        .bind(user_id)
        .bind(record_date)
        .bind(patch.weight_kg)
        .bind(patch.bp_systolic)
        .bind(patch.bp_diastolic)
        .bind(patch.heart_rate)
        .bind(patch.sleep_hours)
        .bind(patch.mood_score)
        .bind(patch.energy_level)
        .bind(&patch.notes)
        .bind(created_at)
        .execute(&self.pool)
        .await?;

        Ok(HealthSnapshot {
            id: result.last_insert_rowid(),
            user_id,
            record_date,
            weight_kg: patch.weight_kg,
            bp_systolic: patch.bp_systolic,
            bp_diastolic: patch.bp_diastolic,
            heart_rate: patch.heart_rate,
            sleep_hours: patch.sleep_hours,
            mood_score: patch.mood_score,
            energy_level: patch.energy_level,
            notes: patch.notes,
            created_at,
        })
    }

    async fn daily_water_total(&self, user_id: i64, date: NaiveDate) -> Result<i64, HealthError> {
        let (start, end) = day_window(date);
        let total = sqlx::query_scalar::<_, i64>(
            "SELECT COALESCE(SUM(amount_ml), 0) FROM water_logs \
             WHERE user_id = ?1 AND logged_at >= ?2 AND logged_at < ?3",
        )
        .bind(user_id)
        .bind(start)
        .bind(end)
        .fetch_one(&self.pool)
        .await?;
        Ok(total)
    }

    async fn daily_step_total(&self, user_id: i64, date: NaiveDate) -> Result<i64, HealthError> {
        let (start, end) = day_window(date);
        let total = sqlx::query_scalar::<_, i64>(
            "SELECT COALESCE(SUM(steps), 0) FROM step_logs \
             WHERE user_id = ?1 AND logged_at >= ?2 AND logged_at < ?3",
        )
        .bind(user_id)
        .bind(start)
        .bind(end)
        .fetch_one(&self.pool)
        .await?;
        Ok(total)
    }

    async fn latest_snapshot(&self, user_id: i64) -> Result<Option<HealthSnapshot>, HealthError> {
        let record = sqlx::query_as::<_, SnapshotRecord>(
            "SELECT id, user_id, record_date, weight_kg, bp_systolic, bp_diastolic, heart_rate, \
             sleep_hours, mood_score, energy_level, notes, created_at FROM health_snapshots \
             WHERE user_id = ?1 ORDER BY record_date DESC, id DESC LIMIT 1",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(record.map(SnapshotRecord::into_domain))
    }

    async fn random_tip(&self) -> Result<Option<HealthTip>, HealthError> {
        let record = sqlx::query_as::<_, TipRecord>(
            "SELECT id, title, content, category, generated_at, share_count \
             FROM health_tips ORDER BY RANDOM() LIMIT 1",
        )
        .fetch_optional(&self.pool)
        .await?;
        Ok(record.map(TipRecord::into_domain))
    }

    async fn insert_tip(&self, tip: NewTip) -> Result<HealthTip, HealthError> {
        let generated_at = Utc::now();
        let result = sqlx::query(
            "INSERT INTO health_tips (title, content, category, generated_at, share_count) \
             VALUES (?1, ?2, ?3, ?4, 0)",
        )
        .bind(&tip.title)
        .bind(&tip.content)
        .bind(&tip.category)
        .bind(generated_at)
        .execute(&self.pool)
        .await?;

        Ok(HealthTip {
            id: result.last_insert_rowid(),
            title: tip.title,
            content: tip.content,
            category: tip.category,
            generated_at,
            share_count: 0,
        })
    }

    async fn bump_share_count(&self, tip_id: i64) -> Result<(), HealthError> {
        let updated =
            sqlx::query("UPDATE health_tips SET share_count = share_count + 1 WHERE id = ?1")
                .bind(tip_id)
                .execute(&self.pool)
                .await?;
        if updated.rows_affected() == 0 {
            return Err(HealthError::NotFound(format!("tip {tip_id}")));
        }
        Ok(())
    }
}
