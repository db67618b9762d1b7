//! Transport-independent command dispatch.
//!
//! The same [`CommandRouter`] backs the HTTP `/api/command` endpoint and
//! the `handle_message` MCP tool: a message is classified by
//! [`healthmate_core::intent`], the matching handler runs against the
//! store and aggregator, and a JSON reply comes back. Unknown input and
//! the bare "log" intent are successful replies carrying a usage hint;
//! only missing or invalid parameters surface as validation errors.

use std::sync::Arc;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::json;

use healthmate_core::aggregate::Aggregator;
use healthmate_core::intent::{self, AVAILABLE_COMMANDS, Intent};
use healthmate_core::{HealthStore, ProfilePatch, SnapshotPatch, bmi};

use crate::error::{McpError, McpResult};
use crate::tips;

const BMI_USAGE: &str = "usage: \"bmi <height_cm> <weight_kg>\", e.g. \"bmi 172 68\"";
const WATER_USAGE: &str =
    "usage: \"water <amount_ml>\" plus a phone_number, e.g. \"log water 500\"";
const STEPS_USAGE: &str =
    "usage: \"steps <count>\" plus a phone_number, e.g. \"I walked 8000 steps\"";
const LOG_USAGE: &str = "send health metrics (weight_kg, sleep_hours, mood_score, energy_level, \
                         notes) together with a phone_number";

#[derive(Clone, Debug, Default, Deserialize, JsonSchema)]
pub struct CommandRequest {
    /// Free-text command; `command` is accepted as an alias.
    #[serde(alias = "command")]
    pub message: String,
    pub phone_number: Option<String>,
    pub height_cm: Option<f64>,
    pub weight_kg: Option<f64>,
    pub amount_ml: Option<i64>,
    pub note: Option<String>,
    pub steps: Option<i64>,
    pub distance_km: Option<f64>,
    pub calories: Option<f64>,
    pub sleep_hours: Option<f64>,
    pub mood_score: Option<i64>,
    pub energy_level: Option<i64>,
    pub notes: Option<String>,
}

#[derive(Clone, Debug, Serialize, JsonSchema)]
pub struct CommandReply {
    pub intent: Intent,
    pub reply: serde_json::Value,
}

#[derive(Clone)]
pub struct CommandRouter {
    store: Arc<dyn HealthStore>,
    aggregator: Aggregator,
}

impl CommandRouter {
    pub fn new(store: Arc<dyn HealthStore>, aggregator: Aggregator) -> Self {
        Self { store, aggregator }
    }

    /// Classify and execute one message. Holds no state across calls.
    pub async fn dispatch(&self, request: &CommandRequest) -> McpResult<CommandReply> {
        let intent = intent::classify(&request.message);
        metrics::counter!("healthmate_commands_total", "intent" => format!("{intent:?}"))
            .increment(1);
        tracing::debug!(?intent, "dispatching command");

        let reply = match intent {
            Intent::Bmi => self.bmi_reply(request).await?,
            Intent::WaterIntake => self.water_reply(request).await?,
            Intent::Steps => self.steps_reply(request).await?,
            Intent::HealthTips => Self::tip_reply(),
            Intent::LogHealth => self.log_health_reply(request).await?,
            Intent::AiAssistant => Self::ai_reply(request),
            Intent::Unknown => json!({
                "message": format!("Unknown command. Try: {AVAILABLE_COMMANDS}"),
            }),
        };
        Ok(CommandReply { intent, reply })
    }

    async fn bmi_reply(&self, request: &CommandRequest) -> McpResult<serde_json::Value> {
        let numbers = intent::extract_numbers(&request.message);
        let height_cm = request.height_cm.or_else(|| numbers.first().copied());
        let weight_kg = request.weight_kg.or_else(|| numbers.get(1).copied());
        let (Some(height_cm), Some(weight_kg)) = (height_cm, weight_kg) else {
            return Err(McpError::Validation(format!(
                "height and weight are required; {BMI_USAGE}"
            )));
        };

        let reading = bmi::calculate_bmi(height_cm, weight_kg)?;

        // Remember the measurements when the caller identifies themselves.
        if let Some(phone) = request.phone_number.as_deref() {
            self.store.get_or_create_user(phone).await?;
            self.store
                .update_profile(
                    phone,
                    ProfilePatch {
                        height_cm: Some(height_cm),
                        weight_kg: Some(weight_kg),
                        ..Default::default()
                    },
                )
                .await?;
        }

        Ok(json!({
            "command": "bmi",
            "bmi": reading.bmi,
            "category": reading.category,
            "healthy_range": bmi::HEALTHY_RANGE,
        }))
    }

    async fn water_reply(&self, request: &CommandRequest) -> McpResult<serde_json::Value> {
        let phone = request.phone_number.as_deref().ok_or_else(|| {
            McpError::Validation(format!("phone_number is required; {WATER_USAGE}"))
        })?;
        let amount_ml = request
            .amount_ml
            .or_else(|| first_integer(&request.message))
            .ok_or_else(|| {
                McpError::Validation(format!("amount is required; {WATER_USAGE}"))
            })?;

        let user = self.store.get_or_create_user(phone).await?;
        self.store
            .append_water(user.id, amount_ml, request.note.clone())
            .await?;
        let progress = self
            .aggregator
            .water_progress(user.id, Aggregator::today())
            .await?;

        Ok(json!({
            "command": "water-intake",
            "logged_amount_ml": amount_ml,
            "progress": progress,
        }))
    }

    async fn steps_reply(&self, request: &CommandRequest) -> McpResult<serde_json::Value> {
        let phone = request.phone_number.as_deref().ok_or_else(|| {
            McpError::Validation(format!("phone_number is required; {STEPS_USAGE}"))
        })?;
        let steps = request
            .steps
            .or_else(|| first_integer(&request.message))
            .ok_or_else(|| McpError::Validation(format!("step count is required; {STEPS_USAGE}")))?;

        let user = self.store.get_or_create_user(phone).await?;
        self.store
            .append_steps(user.id, steps, request.distance_km, request.calories)
            .await?;
        let progress = self
            .aggregator
            .step_progress(user.id, Aggregator::today())
            .await?;

        Ok(json!({
            "command": "steps",
            "logged_steps": steps,
            "progress": progress,
        }))
    }

    fn tip_reply() -> serde_json::Value {
        let tip = tips::random_catalog_tip();
        json!({
            "command": "health-tips",
            "tip": {
                "title": tip.title,
                "content": tip.content,
                "category": tip.category,
            },
            "share_text": tips::share_text(tip.title, tip.content),
        })
    }

    async fn log_health_reply(&self, request: &CommandRequest) -> McpResult<serde_json::Value> {
        let patch = SnapshotPatch {
            weight_kg: request.weight_kg,
            sleep_hours: request.sleep_hours,
            mood_score: request.mood_score,
            energy_level: request.energy_level,
            notes: request.notes.clone(),
            ..Default::default()
        };
        let has_metrics = patch.weight_kg.is_some()
            || patch.sleep_hours.is_some()
            || patch.mood_score.is_some()
            || patch.energy_level.is_some()
            || patch.notes.is_some();

        // Bare "log" is a normal terminal state: explain what to send.
        let usage = json!({ "command": "log-health", "usage": LOG_USAGE });
        let Some(phone) = request.phone_number.as_deref() else {
            return Ok(usage);
        };
        if !has_metrics {
            return Ok(usage);
        }

        let user = self.store.get_or_create_user(phone).await?;
        if let Some(weight) = patch.weight_kg {
            self.store
                .update_profile(
                    phone,
                    ProfilePatch {
                        weight_kg: Some(weight),
                        ..Default::default()
                    },
                )
                .await?;
        }
        let snapshot = self.store.append_snapshot(user.id, patch).await?;

        Ok(json!({
            "command": "log-health",
            "record_date": snapshot.record_date,
            "logged_metrics": {
                "weight_kg": snapshot.weight_kg,
                "sleep_hours": snapshot.sleep_hours,
                "mood_score": snapshot.mood_score,
                "energy_level": snapshot.energy_level,
                "notes": snapshot.notes,
            },
        }))
    }

    fn ai_reply(request: &CommandRequest) -> serde_json::Value {
        json!({
            "command": "ai-assistant",
            "response": format!("AI Assistant Response to: {}", request.message),
        })
    }
}

fn first_integer(message: &str) -> Option<i64> {
    intent::extract_numbers(message)
        .first()
        .map(|n| n.round() as i64)
}
