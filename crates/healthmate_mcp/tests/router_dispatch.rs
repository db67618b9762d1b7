use std::sync::Arc;

use healthmate_core::HealthStore;
use healthmate_core::aggregate::{Aggregator, Goals};
use healthmate_core::intent::Intent;
use healthmate_core::sqlite_store::SqliteHealthStore;
use healthmate_mcp::tips::TIP_CATALOG;
use healthmate_mcp::{CommandRequest, CommandRouter, McpError};

async fn router() -> (CommandRouter, Arc<SqliteHealthStore>) {
    let store = Arc::new(SqliteHealthStore::in_memory().await.expect("store"));
    let aggregator = Aggregator::new(
        store.clone(),
        Goals {
            water_ml: 2500,
            steps: 10_000,
        },
    );
    (CommandRouter::new(store.clone(), aggregator), store)
}

fn message(text: &str) -> CommandRequest {
    CommandRequest {
        message: text.to_string(),
        ..Default::default()
    }
}

#[tokio::test]
async fn bmi_message_with_inline_numbers() {
    let (router, _store) = router().await;
    let reply = router
        .dispatch(&message("what's my bmi? I'm 175 cm and 70 kg"))
        .await
        .expect("dispatch");
    assert_eq!(reply.intent, Intent::Bmi);
    assert_eq!(reply.reply["bmi"], 22.9);
    assert_eq!(reply.reply["category"], "Normal weight");
}

#[tokio::test]
async fn bmi_message_without_numbers_returns_usage_hint() {
    let (router, _store) = router().await;
    let err = router
        .dispatch(&message("what's my bmi"))
        .await
        .unwrap_err();
    match err {
        McpError::Validation(msg) => assert!(msg.contains("usage"), "got {msg}"),
        other => panic!("expected Validation, got {other:?}"),
    }
}

#[tokio::test]
async fn water_message_logs_and_reports_progress() {
    let (router, store) = router().await;
    let request = CommandRequest {
        message: "log water please".to_string(),
        phone_number: Some("911".to_string()),
        amount_ml: Some(500),
        ..Default::default()
    };
    let reply = router.dispatch(&request).await.expect("dispatch");
    assert_eq!(reply.intent, Intent::WaterIntake);
    assert_eq!(reply.reply["logged_amount_ml"], 500);
    assert_eq!(reply.reply["progress"]["percentage"], 20.0);

    let user = store.find_user("911").await.unwrap().expect("user created");
    let today = chrono::Utc::now().date_naive();
    assert_eq!(store.daily_water_total(user.id, today).await.unwrap(), 500);
}

#[tokio::test]
async fn water_amount_is_extracted_from_text() {
    let (router, _store) = router().await;
    let request = CommandRequest {
        message: "log water 750".to_string(),
        phone_number: Some("911".to_string()),
        ..Default::default()
    };
    let reply = router.dispatch(&request).await.expect("dispatch");
    assert_eq!(reply.reply["logged_amount_ml"], 750);
}

#[tokio::test]
async fn water_without_phone_number_is_a_validation_error() {
    let (router, _store) = router().await;
    let err = router
        .dispatch(&message("log water 500"))
        .await
        .unwrap_err();
    assert!(matches!(err, McpError::Validation(_)));
}

#[tokio::test]
async fn first_listed_keyword_wins() {
    let (router, _store) = router().await;
    // Contains both "bmi" and "water": the bmi rule is tested first.
    let reply = router
        .dispatch(&message("bmi or water? 175 70"))
        .await
        .expect("dispatch");
    assert_eq!(reply.intent, Intent::Bmi);
}

#[tokio::test]
async fn steps_message_logs_and_reports_progress() {
    let (router, _store) = router().await;
    let request = CommandRequest {
        message: "I walked some steps today".to_string(),
        phone_number: Some("911".to_string()),
        steps: Some(12_000),
        ..Default::default()
    };
    let reply = router.dispatch(&request).await.expect("dispatch");
    assert_eq!(reply.intent, Intent::Steps);
    assert_eq!(reply.reply["progress"]["percentage"], 100.0);
    assert_eq!(reply.reply["progress"]["status"], "Completed");
}

#[tokio::test]
async fn tip_reply_comes_from_catalog() {
    let (router, _store) = router().await;
    let reply = router
        .dispatch(&message("give me a health tip"))
        .await
        .expect("dispatch");
    assert_eq!(reply.intent, Intent::HealthTips);
    let title = reply.reply["tip"]["title"].as_str().expect("title");
    assert!(TIP_CATALOG.iter().any(|t| t.title == title));
    assert!(
        reply.reply["share_text"]
            .as_str()
            .expect("share_text")
            .contains(title)
    );
}

#[tokio::test]
async fn bare_log_message_is_a_successful_usage_reply() {
    let (router, _store) = router().await;
    let reply = router
        .dispatch(&message("log my health"))
        .await
        .expect("dispatch");
    assert_eq!(reply.intent, Intent::LogHealth);
    assert!(reply.reply["usage"].is_string());
}

#[tokio::test]
async fn log_message_with_metrics_appends_a_snapshot() {
    let (router, store) = router().await;
    let request = CommandRequest {
        message: "log health".to_string(),
        phone_number: Some("911".to_string()),
        weight_kg: Some(66.0),
        sleep_hours: Some(7.5),
        mood_score: Some(8),
        ..Default::default()
    };
    let reply = router.dispatch(&request).await.expect("dispatch");
    assert_eq!(reply.intent, Intent::LogHealth);
    assert_eq!(reply.reply["logged_metrics"]["sleep_hours"], 7.5);

    let user = store.find_user("911").await.unwrap().expect("user");
    let snapshot = store.latest_snapshot(user.id).await.unwrap().expect("snapshot");
    assert_eq!(snapshot.mood_score, Some(8));
    // A logged weight also lands on the profile.
    assert_eq!(user.weight_kg, Some(66.0));
}

#[tokio::test]
async fn ai_message_echoes_the_question() {
    let (router, _store) = router().await;
    let reply = router
        .dispatch(&message("ai assistant: summarize my week for me"))
        .await
        .expect("dispatch");
    assert_eq!(reply.intent, Intent::AiAssistant);
    assert!(
        reply.reply["response"]
            .as_str()
            .expect("response")
            .contains("summarize my week")
    );
}

#[tokio::test]
async fn unknown_message_is_a_successful_help_reply() {
    let (router, _store) = router().await;
    let reply = router.dispatch(&message("xyz")).await.expect("dispatch");
    assert_eq!(reply.intent, Intent::Unknown);
    assert!(
        reply.reply["message"]
            .as_str()
            .expect("message")
            .contains("Unknown command")
    );
}
