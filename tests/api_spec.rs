mod common;

use std::sync::Arc;

use axum::http::{HeaderName, HeaderValue, StatusCode};
use axum_test::TestServer;
use serde_json::json;
use uuid::Uuid;

use common::*;
use stx_chat::api::create_router;
use stx_chat::llm::PromptKind;
use stx_chat::models::ChatInput;

fn setup(llm: ScriptedModel) -> TestServer {
    let transport = Arc::new(StubTransport::fixed(200, pod_list()));
    let controller = controller(Arc::new(llm), transport, central_registry());
    TestServer::new(create_router(Arc::new(controller))).expect("Failed to create test server")
}

fn answering(answer: &str) -> ScriptedModel {
    ScriptedModel::new()
        .reply(PromptKind::Answer, answer)
        .reply(PromptKind::Sufficiency, "positive")
}

async fn create_session(server: &TestServer) -> String {
    let response = server
        .get("/session")
        .add_header(HeaderName::from_static("model"), HeaderValue::from_static("gpt-4o"))
        .add_header(HeaderName::from_static("temperature"), HeaderValue::from_static("0.2"))
        .await;
    response.assert_status_ok();
    response.text()
}

mod session {
    use super::*;

    #[tokio::test]
    async fn returns_a_fresh_session_id_as_text() {
        let server = setup(answering("ok"));

        let first = create_session(&server).await;
        let second = create_session(&server).await;

        assert!(Uuid::parse_str(&first).is_ok());
        assert_ne!(first, second);
    }

    #[tokio::test]
    async fn defaults_missing_headers() {
        let server = setup(answering("ok"));

        let response = server.get("/session").await;

        response.assert_status_ok();
        assert!(Uuid::parse_str(&response.text()).is_ok());
    }

    #[tokio::test]
    async fn rejects_non_numeric_temperature() {
        let server = setup(answering("ok"));

        let response = server
            .get("/session")
            .add_header(HeaderName::from_static("temperature"), HeaderValue::from_static("hot"))
            .await;

        response.assert_status(StatusCode::BAD_REQUEST);
    }
}

mod chat {
    use super::*;

    #[tokio::test]
    async fn answers_as_plain_text() {
        let server = setup(answering("web-0 is running."));
        let session_id = create_session(&server).await;

        let response = server
            .post("/chat")
            .json(&ChatInput {
                message: "which pods are running?".to_string(),
                session_id,
            })
            .await;

        response.assert_status_ok();
        assert_eq!(response.text(), "web-0 is running.");
    }

    #[tokio::test]
    async fn unknown_session_is_not_found() {
        let server = setup(answering("ok"));

        let response = server
            .post("/chat")
            .json(&json!({ "message": "hi", "session_id": Uuid::new_v4().to_string() }))
            .await;

        response.assert_status(StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn malformed_session_id_is_not_found() {
        let server = setup(answering("ok"));

        let response = server
            .post("/chat")
            .json(&json!({ "message": "hi", "session_id": "not-a-session" }))
            .await;

        response.assert_status(StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn model_outage_is_a_bad_gateway() {
        let server = setup(ScriptedModel::new());
        let session_id = create_session(&server).await;

        let response = server
            .post("/chat")
            .json(&json!({ "message": "hi", "session_id": session_id }))
            .await;

        response.assert_status(StatusCode::BAD_GATEWAY);
    }
}

mod health {
    use super::*;

    #[tokio::test]
    async fn reports_live_session_count() {
        let server = setup(answering("ok"));
        create_session(&server).await;
        create_session(&server).await;

        let response = server.get("/health").await;

        response.assert_status_ok();
        let body: serde_json::Value = response.json();
        assert_eq!(body["status"], "ok");
        assert_eq!(body["sessions"], 2);
    }
}
