//! `HealthStore` trait, domain types and shared error type for the
//! health-tracking backend.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub mod aggregate;
pub mod bmi;
pub mod config;
pub mod intent;
pub mod sqlite_store;
pub mod wellness_api;

#[derive(Debug, Error)]
pub enum HealthError {
    #[error("validation error: {0}")]
    Validation(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("storage error: {0}")]
    Storage(#[from] sqlx::Error),
    #[error("migration error: {0}")]
    Migrate(#[from] sqlx::migrate::MigrateError),
    #[error("upstream service unavailable: {0}")]
    Upstream(String),
    #[error("configuration error: {0}")]
    Config(String),
}

/// Activity levels a user profile may carry. Stored as lowercase text.
pub const ACTIVITY_LEVELS: &[&str] = &["low", "moderate", "high"];

#[derive(Clone, Debug, Serialize, PartialEq)]
pub struct User {
    pub id: i64,
    pub phone_number: String,
    pub name: Option<String>,
    pub age: Option<i64>,
    pub gender: Option<String>,
    pub height_cm: Option<f64>,
    pub weight_kg: Option<f64>,
    pub activity_level: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    /// A profile is usable for BMI once both height and weight are known.
    pub fn has_profile(&self) -> bool {
        self.height_cm.is_some() && self.weight_kg.is_some()
    }
}

#[derive(Clone, Debug, Serialize, PartialEq)]
pub struct WaterLogEntry {
    pub id: i64,
    pub user_id: i64,
    pub amount_ml: i64,
    pub logged_at: DateTime<Utc>,
    pub note: Option<String>,
}

#[derive(Clone, Debug, Serialize, PartialEq)]
pub struct StepLogEntry {
    pub id: i64,
    pub user_id: i64,
    pub steps: i64,
    pub logged_at: DateTime<Utc>,
    pub distance_km: Option<f64>,
    pub calories_burned: Option<f64>,
}

#[derive(Clone, Debug, Serialize, PartialEq)]
pub struct HealthSnapshot {
    pub id: i64,
    pub user_id: i64,
    pub record_date: NaiveDate,
    pub weight_kg: Option<f64>,
    pub bp_systolic: Option<i64>,
    pub bp_diastolic: Option<i64>,
    pub heart_rate: Option<i64>,
    pub sleep_hours: Option<f64>,
    pub mood_score: Option<i64>,
    pub energy_level: Option<i64>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Clone, Debug, Serialize, PartialEq)]
pub struct HealthTip {
    pub id: i64,
    pub title: String,
    pub content: String,
    pub category: String,
    pub generated_at: DateTime<Utc>,
    pub share_count: i64,
}

/// Partial profile update; `None` fields are left untouched.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct ProfilePatch {
    pub name: Option<String>,
    pub age: Option<i64>,
    pub gender: Option<String>,
    pub height_cm: Option<f64>,
    pub weight_kg: Option<f64>,
    pub activity_level: Option<String>,
}

/// Fields for a new point-in-time health record; absent fields are stored
/// as unset, never zero.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct SnapshotPatch {
    pub weight_kg: Option<f64>,
    pub bp_systolic: Option<i64>,
    pub bp_diastolic: Option<i64>,
    pub heart_rate: Option<i64>,
    pub sleep_hours: Option<f64>,
    pub mood_score: Option<i64>,
    pub energy_level: Option<i64>,
    pub notes: Option<String>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct NewTip {
    pub title: String,
    pub content: String,
    pub category: String,
}

/// Durable record of per-user logged events plus the mutable profile.
///
/// Water, step and snapshot logs are append-only; aggregation over them
/// lives in [`aggregate`]. Implementations must enforce phone-number
/// uniqueness at the storage layer so concurrent `get_or_create_user`
/// calls never produce two users.
#[async_trait]
pub trait HealthStore: Send + Sync + 'static {
    async fn get_or_create_user(&self, phone_number: &str) -> Result<User, HealthError>;
    async fn find_user(&self, phone_number: &str) -> Result<Option<User>, HealthError>;
    async fn update_profile(
        &self,
        phone_number: &str,
        patch: ProfilePatch,
    ) -> Result<User, HealthError>;

    async fn append_water(
        &self,
        user_id: i64,
        amount_ml: i64,
        note: Option<String>,
    ) -> Result<WaterLogEntry, HealthError>;
    async fn append_steps(
        &self,
        user_id: i64,
        steps: i64,
        distance_km: Option<f64>,
        calories_burned: Option<f64>,
    ) -> Result<StepLogEntry, HealthError>;
    async fn append_snapshot(
        &self,
        user_id: i64,
        patch: SnapshotPatch,
    ) -> Result<HealthSnapshot, HealthError>;

    /// Sum of water logged on the given UTC calendar day; 0 when empty.
    async fn daily_water_total(&self, user_id: i64, date: NaiveDate) -> Result<i64, HealthError>;
    /// Sum of steps logged on the given UTC calendar day; 0 when empty.
    async fn daily_step_total(&self, user_id: i64, date: NaiveDate) -> Result<i64, HealthError>;
    /// Most recent snapshot by record date, insertion order as tiebreak.
    async fn latest_snapshot(&self, user_id: i64) -> Result<Option<HealthSnapshot>, HealthError>;

    async fn random_tip(&self) -> Result<Option<HealthTip>, HealthError>;
    async fn insert_tip(&self, tip: NewTip) -> Result<HealthTip, HealthError>;
    async fn bump_share_count(&self, tip_id: i64) -> Result<(), HealthError>;
}
