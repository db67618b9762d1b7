//! Read-model over the metric store: daily goal progress and the composite
//! health summary. Never mutates stored data.
//!
//! All "today" computations use the UTC calendar day; a day is the
//! half-open interval from midnight UTC to the next midnight UTC.

use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use schemars::JsonSchema;
use serde::Serialize;

use crate::bmi::{self, BmiCategory};
use crate::{HealthError, HealthSnapshot, HealthStore, User};

#[derive(Clone, Copy, Debug)]
pub struct Goals {
    pub water_ml: i64,
    pub steps: i64,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, JsonSchema)]
pub enum GoalStatus {
    Completed,
    #[serde(rename = "In Progress")]
    InProgress,
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, JsonSchema)]
pub struct GoalProgress {
    pub total: i64,
    pub goal: i64,
    pub percentage: f64,
    pub remaining: i64,
    pub status: GoalStatus,
}

/// Progress of `total` against `goal`: percentage capped at 100 (one
/// decimal), remaining floored at 0, Completed once the goal is reached.
pub fn goal_progress(total: i64, goal: i64) -> GoalProgress {
    let raw = (total as f64 / goal as f64) * 100.0;
    GoalProgress {
        total,
        goal,
        percentage: round1(raw.min(100.0)),
        remaining: (goal - total).max(0),
        status: if total >= goal {
            GoalStatus::Completed
        } else {
            GoalStatus::InProgress
        },
    }
}

fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

#[derive(Clone, Debug, Serialize)]
pub struct BmiInfo {
    pub bmi: f64,
    pub category: BmiCategory,
    pub is_healthy: bool,
}

#[derive(Clone, Debug, Serialize)]
pub struct UserInfo {
    pub phone_number: String,
    pub name: Option<String>,
    pub age: Option<i64>,
    pub height_cm: Option<f64>,
    pub weight_kg: Option<f64>,
}

#[derive(Clone, Debug, Serialize)]
pub struct TodayProgress {
    pub water: GoalProgress,
    pub steps: GoalProgress,
}

#[derive(Clone, Debug, Serialize)]
pub struct HealthSummary {
    pub user_info: UserInfo,
    pub bmi_info: Option<BmiInfo>,
    pub today_progress: TodayProgress,
    pub latest_health_record: Option<HealthSnapshot>,
    pub summary_date: NaiveDate,
}

/// Computes point-in-time derived metrics from a [`HealthStore`].
#[derive(Clone)]
pub struct Aggregator {
    store: Arc<dyn HealthStore>,
    goals: Goals,
}

impl Aggregator {
    pub fn new(store: Arc<dyn HealthStore>, goals: Goals) -> Self {
        Self { store, goals }
    }

    pub fn goals(&self) -> Goals {
        self.goals
    }

    pub fn today() -> NaiveDate {
        Utc::now().date_naive()
    }

    pub async fn water_progress(
        &self,
        user_id: i64,
        date: NaiveDate,
    ) -> Result<GoalProgress, HealthError> {
        let total = self.store.daily_water_total(user_id, date).await?;
        Ok(goal_progress(total, self.goals.water_ml))
    }

    pub async fn step_progress(
        &self,
        user_id: i64,
        date: NaiveDate,
    ) -> Result<GoalProgress, HealthError> {
        let total = self.store.daily_step_total(user_id, date).await?;
        Ok(goal_progress(total, self.goals.steps))
    }

    /// The single read-model behind the summary intent: BMI info (absent
    /// until the profile carries height and weight), today's water and
    /// step progress, and the most recent snapshot if any.
    pub async fn health_summary(&self, user: &User) -> Result<HealthSummary, HealthError> {
        let today = Self::today();
        let water = self.water_progress(user.id, today).await?;
        let steps = self.step_progress(user.id, today).await?;
        let latest = self.store.latest_snapshot(user.id).await?;

        let bmi_info = match (user.height_cm, user.weight_kg) {
            (Some(h), Some(w)) => {
                let reading = bmi::calculate_bmi(h, w)?;
                Some(BmiInfo {
                    bmi: reading.bmi,
                    category: reading.category,
                    is_healthy: reading.category == BmiCategory::NormalWeight,
                })
            }
            _ => None,
        };

        Ok(HealthSummary {
            user_info: UserInfo {
                phone_number: user.phone_number.clone(),
                name: user.name.clone(),
                age: user.age,
                height_cm: user.height_cm,
                weight_kg: user.weight_kg,
            },
            bmi_info,
            today_progress: TodayProgress { water, steps },
            latest_health_record: latest,
            summary_date: today,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_day_is_zero_percent() {
        let p = goal_progress(0, 2500);
        assert_eq!(p.percentage, 0.0);
        assert_eq!(p.remaining, 2500);
        assert_eq!(p.status, GoalStatus::InProgress);
    }

    #[test]
    fn percentage_caps_at_one_hundred() {
        let p = goal_progress(3000, 2500);
        assert_eq!(p.percentage, 100.0);
        assert_eq!(p.remaining, 0);
        assert_eq!(p.status, GoalStatus::Completed);
    }

    #[test]
    fn exact_goal_is_completed() {
        let p = goal_progress(10_000, 10_000);
        assert_eq!(p.percentage, 100.0);
        assert_eq!(p.remaining, 0);
        assert_eq!(p.status, GoalStatus::Completed);
    }

    #[test]
    fn partial_progress_rounds_to_one_decimal() {
        let p = goal_progress(1000, 2500);
        assert_eq!(p.percentage, 40.0);
        assert_eq!(p.remaining, 1500);
        assert_eq!(p.status, GoalStatus::InProgress);

        let p = goal_progress(1, 3);
        assert_eq!(p.percentage, 33.3);
    }

    #[test]
    fn status_serializes_with_original_wire_labels() {
        assert_eq!(
            serde_json::to_value(GoalStatus::InProgress).unwrap(),
            serde_json::json!("In Progress")
        );
        assert_eq!(
            serde_json::to_value(GoalStatus::Completed).unwrap(),
            serde_json::json!("Completed")
        );
    }
}
