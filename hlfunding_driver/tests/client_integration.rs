use hlfunding_driver::status::driver_status;
use hlfunding_driver::Error;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[tokio::test]
async fn status_ready() {
    let mock_server = MockServer::start().await;
    let body = serde_json::json!({
        "value": {
            "build": { "version": "120.0.6099.109" },
            "message": "ChromeDriver ready for new sessions.",
            "os": { "arch": "x86_64", "name": "Linux", "version": "6.1" },
            "ready": true
        }
    });

    Mock::given(method("GET"))
        .and(path("/status"))
        .respond_with(ResponseTemplate::new(200).set_body_json(&body))
        .mount(&mock_server)
        .await;

    let status = driver_status(&mock_server.uri()).await.unwrap();
    assert!(status.ready);
    assert_eq!(status.message, "ChromeDriver ready for new sessions.");
}

#[tokio::test]
async fn status_busy() {
    let mock_server = MockServer::start().await;
    let body = serde_json::json!({ "value": { "ready": false, "message": "session limit reached" } });

    Mock::given(method("GET"))
        .and(path("/status"))
        .respond_with(ResponseTemplate::new(200).set_body_json(&body))
        .mount(&mock_server)
        .await;

    let status = driver_status(&format!("{}/", mock_server.uri()))
        .await
        .unwrap();
    assert!(!status.ready);
}

#[tokio::test]
async fn status_missing_message_defaults_empty() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/status"))
        .respond_with(
            ResponseTemplate::new(200).set_body_string(r#"{"value":{"ready":true}}"#),
        )
        .mount(&mock_server)
        .await;

    let status = driver_status(&mock_server.uri()).await.unwrap();
    assert!(status.ready);
    assert!(status.message.is_empty());
}

#[tokio::test]
async fn status_server_error() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/status"))
        .respond_with(ResponseTemplate::new(500).set_body_string("Internal Server Error"))
        .mount(&mock_server)
        .await;

    let result = driver_status(&mock_server.uri()).await;
    assert!(matches!(result, Err(Error::Status(_))));
}

#[tokio::test]
async fn status_malformed_json() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/status"))
        .respond_with(ResponseTemplate::new(200).set_body_string("{not valid json}"))
        .mount(&mock_server)
        .await;

    let result = driver_status(&mock_server.uri()).await;
    assert!(result.is_err());
}

#[tokio::test]
async fn status_invalid_url() {
    let result = driver_status("not a url").await;
    assert!(matches!(result, Err(Error::InvalidUrl(_))));
}
