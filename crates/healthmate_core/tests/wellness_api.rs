use std::time::Duration;

use healthmate_core::HealthError;
use healthmate_core::wellness_api::WellnessApiClient;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[tokio::test]
async fn get_health_tips_passes_topic_and_returns_body() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/tips"))
        .and(query_param("topic", "sleep"))
        .respond_with(ResponseTemplate::new(200).set_body_string("Keep a regular bedtime."))
        .mount(&mock_server)
        .await;

    let client = WellnessApiClient::new(&mock_server.uri(), Duration::from_secs(5));
    let body = client.get_health_tips("sleep").await.expect("tips");
    assert_eq!(body, "Keep a regular bedtime.");
}

#[tokio::test]
async fn get_diet_plan_passes_goal() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/diet"))
        .and(query_param("goal", "weight loss"))
        .respond_with(ResponseTemplate::new(200).set_body_string("Caloric deficit plan."))
        .mount(&mock_server)
        .await;

    let client = WellnessApiClient::new(&mock_server.uri(), Duration::from_secs(5));
    let body = client.get_diet_plan("weight loss").await.expect("plan");
    assert_eq!(body, "Caloric deficit plan.");
}

#[tokio::test]
async fn non_success_status_maps_to_upstream_error() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/tips"))
        .respond_with(ResponseTemplate::new(503).set_body_string("maintenance"))
        .mount(&mock_server)
        .await;

    let client = WellnessApiClient::new(&mock_server.uri(), Duration::from_secs(5));
    let err = client.get_health_tips("stress").await.unwrap_err();
    match err {
        HealthError::Upstream(msg) => {
            assert!(msg.contains("503"));
            assert!(msg.contains("maintenance"));
        }
        other => panic!("expected Upstream, got {other:?}"),
    }
}

#[tokio::test]
async fn slow_upstream_times_out_as_upstream_error() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/tips"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string("late")
                .set_delay(Duration::from_secs(5)),
        )
        .mount(&mock_server)
        .await;

    let client = WellnessApiClient::new(&mock_server.uri(), Duration::from_millis(100));
    let err = client.get_health_tips("sleep").await.unwrap_err();
    assert!(matches!(err, HealthError::Upstream(_)));
}
