use std::sync::Arc;

use rmcp::Json;
use rmcp::handler::server::wrapper::Parameters;
use rmcp::{tool, tool_handler, tool_router};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use healthmate_core::aggregate::{Aggregator, Goals};
use healthmate_core::config::Config;
use healthmate_core::wellness_api::WellnessApiClient;
use healthmate_core::{HealthStore, ProfilePatch, SnapshotPatch, bmi};

mod error;
mod router;
pub mod tips;

pub use error::{McpError, McpResult};
pub use router::{CommandReply, CommandRequest, CommandRouter};

#[derive(Clone)]
pub struct HealthMcpHandler {
    store: Arc<dyn HealthStore>,
    aggregator: Aggregator,
    router: CommandRouter,
    wellness: Option<Arc<WellnessApiClient>>,
    owner_phone: String,
    tool_router: rmcp::handler::server::tool::ToolRouter<HealthMcpHandler>,
}

#[derive(Debug, Deserialize, Serialize, JsonSchema)]
pub struct PhoneParam {
    pub phone_number: String,
}

#[derive(Debug, Deserialize, Serialize, JsonSchema)]
pub struct BmiToolParams {
    pub phone_number: String,
    pub height_cm: f64,
    pub weight_kg: f64,
}

#[derive(Debug, Deserialize, Serialize, JsonSchema)]
pub struct WaterIntakeParams {
    pub phone_number: String,
    pub amount_ml: i64,
    pub note: Option<String>,
}

#[derive(Debug, Deserialize, Serialize, JsonSchema)]
pub struct StepsParams {
    pub phone_number: String,
    pub steps: i64,
    pub distance_km: Option<f64>,
    pub calories: Option<f64>,
}

#[derive(Debug, Deserialize, Serialize, JsonSchema)]
pub struct HealthMetricsParams {
    pub phone_number: String,
    pub weight_kg: Option<f64>,
    pub sleep_hours: Option<f64>,
    /// Mood on a 1-10 scale (1 = terrible, 10 = excellent).
    pub mood_score: Option<i64>,
    /// Energy on a 1-10 scale (1 = exhausted, 10 = energetic).
    pub energy_level: Option<i64>,
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize, Serialize, JsonSchema)]
pub struct TopicParam {
    pub topic: String,
}

#[derive(Debug, Deserialize, Serialize, JsonSchema)]
pub struct DietGoalParam {
    pub goal: String,
}

#[derive(Debug, Deserialize, Serialize, JsonSchema)]
pub struct MessageParams {
    pub message: String,
    pub phone_number: Option<String>,
}

#[derive(Debug, Serialize, JsonSchema)]
pub struct BmiResult {
    pub bmi: f64,
    pub category: String,
    pub height_cm: f64,
    pub weight_kg: f64,
    pub recommendations: Vec<String>,
    pub healthy_bmi_range: String,
}

#[derive(Debug, Serialize, JsonSchema)]
pub struct WaterIntakeResult {
    pub logged_amount_ml: i64,
    pub daily_total_ml: i64,
    pub daily_goal_ml: i64,
    pub percentage_complete: f64,
    pub remaining_ml: i64,
    pub status: String,
}

#[derive(Debug, Serialize, JsonSchema)]
pub struct StepsResult {
    pub logged_steps: i64,
    pub daily_total_steps: i64,
    pub daily_goal_steps: i64,
    pub percentage_complete: f64,
    pub remaining_steps: i64,
    pub status: String,
}

#[derive(Debug, Serialize, JsonSchema)]
pub struct TipBody {
    pub title: String,
    pub content: String,
    pub category: String,
}

#[derive(Debug, Serialize, JsonSchema)]
pub struct TipResult {
    pub tip: TipBody,
    pub generated_at: String,
    pub share_text: String,
}

#[derive(Debug, Serialize, JsonSchema)]
pub struct TextResult {
    pub text: String,
}

#[derive(Debug, Deserialize, Serialize, JsonSchema)]
pub struct ObjectResult {
    pub value: serde_json::Value,
}

#[derive(Debug, Serialize, JsonSchema)]
pub struct AboutResult {
    pub name: String,
    pub description: String,
}

#[tool_router]
impl HealthMcpHandler {
    pub fn new(store: Arc<dyn HealthStore>, config: &Config) -> Self {
        let goals = Goals {
            water_ml: config.water_goal_ml,
            steps: config.step_goal,
        };
        let aggregator = Aggregator::new(store.clone(), goals);
        let router = CommandRouter::new(store.clone(), aggregator.clone());
        let wellness = config
            .wellness_api_base_url
            .as_deref()
            .map(|base| Arc::new(WellnessApiClient::new(base, config.wellness_api_timeout)));
        Self {
            store,
            aggregator,
            router,
            wellness,
            owner_phone: config.owner_phone.clone(),
            tool_router: Self::tool_router(),
        }
    }

    pub fn tool_count(&self) -> usize {
        self.tool_router.list_all().len()
    }

    #[tool(
        name = "validate",
        description = "Validation handshake: returns the server owner's phone number \
                       ({country_code}{number}) so the conversational host can \
                       authenticate this server"
    )]
    async fn validate(&self) -> Result<String, String> {
        Ok(self.owner_phone.clone())
    }

    #[tool(
        name = "calculate_bmi",
        description = "Calculate BMI from height and weight, store the measurements on \
                       the user's profile and return category plus recommendations"
    )]
    async fn calculate_bmi(
        &self,
        params: Parameters<BmiToolParams>,
    ) -> Result<Json<BmiResult>, String> {
        let p = params.0;
        let reading =
            bmi::calculate_bmi(p.height_cm, p.weight_kg).map_err(|e| e.to_string())?;

        self.store
            .get_or_create_user(&p.phone_number)
            .await
            .map_err(|e| e.to_string())?;
        self.store
            .update_profile(
                &p.phone_number,
                ProfilePatch {
                    height_cm: Some(p.height_cm),
                    weight_kg: Some(p.weight_kg),
                    ..Default::default()
                },
            )
            .await
            .map_err(|e| e.to_string())?;

        Ok(Json(BmiResult {
            bmi: reading.bmi,
            category: reading.category.label().to_string(),
            height_cm: p.height_cm,
            weight_kg: p.weight_kg,
            recommendations: reading
                .category
                .recommendations()
                .iter()
                .map(|s| s.to_string())
                .collect(),
            healthy_bmi_range: bmi::HEALTHY_RANGE.to_string(),
        }))
    }

    #[tool(
        name = "log_water_intake",
        description = "Log a water intake amount (ml) and return the day's progress"
    )]
    async fn log_water_intake(
        &self,
        params: Parameters<WaterIntakeParams>,
    ) -> Result<Json<WaterIntakeResult>, String> {
        let p = params.0;
        let user = self
            .store
            .get_or_create_user(&p.phone_number)
            .await
            .map_err(|e| e.to_string())?;
        self.store
            .append_water(user.id, p.amount_ml, p.note)
            .await
            .map_err(|e| e.to_string())?;

        let progress = self
            .aggregator
            .water_progress(user.id, Aggregator::today())
            .await
            .map_err(|e| e.to_string())?;

        Ok(Json(WaterIntakeResult {
            logged_amount_ml: p.amount_ml,
            daily_total_ml: progress.total,
            daily_goal_ml: progress.goal,
            percentage_complete: progress.percentage,
            remaining_ml: progress.remaining,
            status: if progress.remaining == 0 {
                "Goal reached!".to_string()
            } else {
                "Keep drinking!".to_string()
            },
        }))
    }

    #[tool(
        name = "log_steps",
        description = "Log a step count (with optional distance and calories) and \
                       return the day's progress"
    )]
    async fn log_steps(
        &self,
        params: Parameters<StepsParams>,
    ) -> Result<Json<StepsResult>, String> {
        let p = params.0;
        let user = self
            .store
            .get_or_create_user(&p.phone_number)
            .await
            .map_err(|e| e.to_string())?;
        self.store
            .append_steps(user.id, p.steps, p.distance_km, p.calories)
            .await
            .map_err(|e| e.to_string())?;

        let progress = self
            .aggregator
            .step_progress(user.id, Aggregator::today())
            .await
            .map_err(|e| e.to_string())?;

        Ok(Json(StepsResult {
            logged_steps: p.steps,
            daily_total_steps: progress.total,
            daily_goal_steps: progress.goal,
            percentage_complete: progress.percentage,
            remaining_steps: progress.remaining,
            status: if progress.remaining == 0 {
                "Goal achieved!".to_string()
            } else {
                "Keep moving!".to_string()
            },
        }))
    }

    #[tool(
        name = "get_health_summary",
        description = "Comprehensive summary: BMI, today's water and step progress \
                       and the most recent health record"
    )]
    async fn get_health_summary(
        &self,
        params: Parameters<PhoneParam>,
    ) -> Result<Json<ObjectResult>, String> {
        let p = params.0;
        let user = self
            .store
            .get_or_create_user(&p.phone_number)
            .await
            .map_err(|e| e.to_string())?;
        let summary = self
            .aggregator
            .health_summary(&user)
            .await
            .map_err(|e| e.to_string())?;
        let value = serde_json::to_value(&summary).map_err(|e| e.to_string())?;
        Ok(Json(ObjectResult { value }))
    }

    #[tool(
        name = "log_health_metrics",
        description = "Log a point-in-time health record (weight, sleep, mood, energy, \
                       notes); a given weight also updates the profile"
    )]
    async fn log_health_metrics(
        &self,
        params: Parameters<HealthMetricsParams>,
    ) -> Result<Json<ObjectResult>, String> {
        let p = params.0;
        let user = self
            .store
            .get_or_create_user(&p.phone_number)
            .await
            .map_err(|e| e.to_string())?;

        if let Some(weight) = p.weight_kg {
            self.store
                .update_profile(
                    &p.phone_number,
                    ProfilePatch {
                        weight_kg: Some(weight),
                        ..Default::default()
                    },
                )
                .await
                .map_err(|e| e.to_string())?;
        }

        let snapshot = self
            .store
            .append_snapshot(
                user.id,
                SnapshotPatch {
                    weight_kg: p.weight_kg,
                    sleep_hours: p.sleep_hours,
                    mood_score: p.mood_score,
                    energy_level: p.energy_level,
                    notes: p.notes.clone(),
                    ..Default::default()
                },
            )
            .await
            .map_err(|e| e.to_string())?;

        let bmi_updated = if p.weight_kg.is_some() {
            let refreshed = self
                .store
                .find_user(&p.phone_number)
                .await
                .map_err(|e| e.to_string())?
                .ok_or_else(|| "user missing after update".to_string())?;
            match (refreshed.height_cm, refreshed.weight_kg) {
                (Some(h), Some(w)) => Some(
                    bmi::calculate_bmi(h, w)
                        .map_err(|e| e.to_string())?
                        .bmi,
                ),
                _ => None,
            }
        } else {
            None
        };

        Ok(Json(ObjectResult {
            value: serde_json::json!({
                "logged_metrics": {
                    "weight_kg": snapshot.weight_kg,
                    "sleep_hours": snapshot.sleep_hours,
                    "mood_score": snapshot.mood_score,
                    "energy_level": snapshot.energy_level,
                    "notes": snapshot.notes,
                },
                "bmi_updated": bmi_updated,
                "record_date": snapshot.record_date,
                "message": "Health metrics logged successfully!",
            }),
        }))
    }

    #[tool(
        name = "generate_health_tip",
        description = "Generate a wellness tip from the built-in catalog; the tip is \
                       persisted and returned with share text"
    )]
    async fn generate_health_tip(&self) -> Result<Json<TipResult>, String> {
        let catalog = tips::random_catalog_tip();
        let stored = self
            .store
            .insert_tip(healthmate_core::NewTip {
                title: catalog.title.to_string(),
                content: catalog.content.to_string(),
                category: catalog.category.to_string(),
            })
            .await
            .map_err(|e| e.to_string())?;

        Ok(Json(TipResult {
            share_text: tips::share_text(&stored.title, &stored.content),
            generated_at: stored.generated_at.to_rfc3339(),
            tip: TipBody {
                title: stored.title,
                content: stored.content,
                category: stored.category,
            },
        }))
    }

    #[tool(
        name = "get_health_tips",
        description = "Fetch wellness advice for a topic from the external content service"
    )]
    async fn get_health_tips(
        &self,
        params: Parameters<TopicParam>,
    ) -> Result<Json<TextResult>, String> {
        let client = self
            .wellness
            .as_ref()
            .ok_or_else(|| "wellness content service not configured".to_string())?;
        let text = client
            .get_health_tips(&params.0.topic)
            .await
            .map_err(|e| e.to_string())?;
        Ok(Json(TextResult { text }))
    }

    #[tool(
        name = "get_diet_plan",
        description = "Fetch a diet plan for a goal from the external content service"
    )]
    async fn get_diet_plan(
        &self,
        params: Parameters<DietGoalParam>,
    ) -> Result<Json<TextResult>, String> {
        let client = self
            .wellness
            .as_ref()
            .ok_or_else(|| "wellness content service not configured".to_string())?;
        let text = client
            .get_diet_plan(&params.0.goal)
            .await
            .map_err(|e| e.to_string())?;
        Ok(Json(TextResult { text }))
    }

    #[tool(
        name = "handle_message",
        description = "Route a free-text command (bmi, water, steps, tip, log, ai) to \
                       the matching operation and return its reply"
    )]
    async fn handle_message(
        &self,
        params: Parameters<MessageParams>,
    ) -> Result<Json<CommandReply>, String> {
        let p = params.0;
        let request = CommandRequest {
            message: p.message,
            phone_number: p.phone_number,
            ..Default::default()
        };
        let reply = self
            .router
            .dispatch(&request)
            .await
            .map_err(|e| e.to_string())?;
        Ok(Json(reply))
    }

    #[tool(name = "about", description = "Basic info about this server")]
    async fn about(&self) -> Result<Json<AboutResult>, String> {
        Ok(Json(AboutResult {
            name: "HealthMate MCP".to_string(),
            description: "Personal health assistant: BMI, hydration and step tracking, \
                          wellness tips and diet suggestions."
                .to_string(),
        }))
    }
}

#[tool_handler]
impl rmcp::ServerHandler for HealthMcpHandler {
    fn get_info(&self) -> rmcp::model::ServerInfo {
        let mut info = rmcp::model::ServerInfo::default();
        info.instructions = Some(
            "HealthMate MCP server - tracks water intake, steps and health records \
             per user (keyed by phone number), computes BMI and daily goal \
             progress, and serves wellness tips."
                .into(),
        );
        info.capabilities = rmcp::model::ServerCapabilities::builder()
            .enable_tools()
            .build();
        info
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use healthmate_core::sqlite_store::SqliteHealthStore;

    async fn handler() -> HealthMcpHandler {
        let store = SqliteHealthStore::in_memory().await.expect("store");
        let config = Config::from_env_with(|_| None).expect("config");
        HealthMcpHandler::new(Arc::new(store), &config)
    }

    #[tokio::test]
    async fn handler_registers_all_tools() {
        let handler = handler().await;
        let _clone = handler.clone();
        let tools = handler.tool_router.list_all();
        for name in [
            "validate",
            "calculate_bmi",
            "log_water_intake",
            "log_steps",
            "get_health_summary",
            "log_health_metrics",
            "generate_health_tip",
            "get_health_tips",
            "get_diet_plan",
            "handle_message",
            "about",
        ] {
            assert!(tools.iter().any(|t| t.name == name), "missing tool {name}");
        }
        assert_eq!(handler.tool_count(), tools.len());
    }

    #[tokio::test]
    async fn validate_returns_owner_phone() {
        let handler = handler().await;
        let phone = handler.validate().await.expect("validate");
        assert_eq!(phone, "0000000000");
    }

    #[tokio::test]
    async fn upstream_tools_fail_cleanly_when_unconfigured() {
        let handler = handler().await;
        let err = match handler
            .get_health_tips(Parameters(TopicParam {
                topic: "sleep".into(),
            }))
            .await
        {
            Ok(_) => panic!("called `Result::unwrap_err()` on an `Ok` value"),
            Err(e) => e,
        };
        assert!(err.contains("not configured"));
    }

    #[tokio::test]
    async fn bmi_tool_persists_measurements() {
        let handler = handler().await;
        let result = handler
            .calculate_bmi(Parameters(BmiToolParams {
                phone_number: "911".into(),
                height_cm: 175.0,
                weight_kg: 70.0,
            }))
            .await
            .expect("bmi");
        assert_eq!(result.0.bmi, 22.9);
        assert_eq!(result.0.category, "Normal weight");
        assert_eq!(result.0.recommendations.len(), 3);

        let user = handler
            .store
            .find_user("911")
            .await
            .expect("query")
            .expect("user");
        assert_eq!(user.height_cm, Some(175.0));
        assert_eq!(user.weight_kg, Some(70.0));
    }
}
