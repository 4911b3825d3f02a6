mod common;

use std::time::Duration;

use axum::http::StatusCode;
use axum_test::TestServer;
use chalkboard_api::db::notes::NoteStore;
use chalkboard_api::models::board::DEFAULT_BOARD;
use chalkboard_api::models::note::Note;
use serde_json::json;

// ---------------------------------------------------------------------------
// POST /
// ---------------------------------------------------------------------------

#[tokio::test]
async fn add_returns_created_note_as_json() {
    let (app, state) = common::test_app();
    let server = TestServer::new(app).unwrap();

    let resp = server
        .post("/")
        .form(&[("action", "add"), ("note", "a"), ("x", "1"), ("y", "2")])
        .await;

    resp.assert_status_ok();
    assert!(resp
        .header("content-type")
        .to_str()
        .unwrap()
        .starts_with("application/json"));
    resp.assert_json(&json!({ "id": 1, "note": "a", "x": 1, "y": 2 }));
    assert_eq!(state.store.len(), 1);
}

#[tokio::test]
async fn add_is_published_to_subscribers() {
    let (app, state) = common::test_app();
    let server = TestServer::new(app).unwrap();
    let mut sub = state.hub.subscribe(DEFAULT_BOARD, "test").await.unwrap();

    server
        .post("/")
        .form(&[("action", "add"), ("note", "a"), ("x", "1"), ("y", "2")])
        .await
        .assert_status_ok();

    let frame = tokio::time::timeout(Duration::from_secs(2), sub.frames.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(
        frame,
        "event: add\ndata: {\"id\":1,\"note\":\"a\",\"x\":1,\"y\":2}\n\n"
    );
}

#[tokio::test]
async fn ids_keep_increasing() {
    let (app, _state) = common::test_app();
    let server = TestServer::new(app).unwrap();

    for expected in 1..=3 {
        let resp = server
            .post("/")
            .form(&[("action", "add"), ("note", "n"), ("x", "0"), ("y", "0")])
            .await;
        assert_eq!(resp.json::<serde_json::Value>()["id"], expected);
    }
}

#[tokio::test]
async fn update_of_unknown_id_upserts() {
    let (app, state) = common::test_app();
    let server = TestServer::new(app).unwrap();

    let resp = server
        .post("/")
        .form(&[("action", "update"), ("id", "9"), ("note", "z"), ("x", "0"), ("y", "0")])
        .await;

    resp.assert_status(StatusCode::NO_CONTENT);
    assert_eq!(state.store.len(), 1);
}

#[tokio::test]
async fn remove_of_unknown_id_is_not_an_error() {
    let (app, state) = common::test_app();
    let server = TestServer::new(app).unwrap();

    let resp = server
        .post("/")
        .form(&[("action", "remove"), ("id", "42")])
        .await;

    resp.assert_status(StatusCode::NO_CONTENT);
    assert!(state.store.is_empty());
}

#[tokio::test]
async fn non_numeric_field_is_rejected_and_not_applied() {
    let (app, state) = common::test_app();
    let server = TestServer::new(app).unwrap();
    let mut sub = state.hub.subscribe(DEFAULT_BOARD, "test").await.unwrap();

    let resp = server
        .post("/")
        .form(&[("action", "add"), ("note", "a"), ("x", "one"), ("y", "2")])
        .await;

    resp.assert_status(StatusCode::BAD_REQUEST);
    let body: serde_json::Value = resp.json();
    assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
    assert_eq!(body["error"]["details"][0]["field"], "x");
    assert!(state.store.is_empty());
    assert!(
        tokio::time::timeout(Duration::from_millis(100), sub.frames.recv())
            .await
            .is_err(),
        "rejected mutation must not be broadcast"
    );
}

#[tokio::test]
async fn out_of_range_id_is_rejected_and_ids_keep_working() {
    let (app, state) = common::test_app();
    let server = TestServer::new(app).unwrap();

    let max = i64::MAX.to_string();
    let resp = server
        .post("/")
        .form(&[("action", "update"), ("id", max.as_str()), ("note", "z"), ("x", "0"), ("y", "0")])
        .await;

    resp.assert_status(StatusCode::BAD_REQUEST);
    let body: serde_json::Value = resp.json();
    assert_eq!(body["error"]["details"][0]["field"], "id");
    assert!(state.store.is_empty());

    let resp = server
        .post("/")
        .form(&[("action", "add"), ("note", "a"), ("x", "0"), ("y", "0")])
        .await;
    resp.assert_status_ok();
    assert_eq!(resp.json::<serde_json::Value>()["id"], 1);
}

#[tokio::test]
async fn exhausted_ids_fail_the_add_without_overwriting() {
    let (app, state) = common::test_app();
    let server = TestServer::new(app).unwrap();
    let top = Note { id: i64::MAX, note: "top".into(), x: 0, y: 0 };
    state.store.update(DEFAULT_BOARD, top.clone());

    let resp = server
        .post("/")
        .form(&[("action", "add"), ("note", "a"), ("x", "0"), ("y", "0")])
        .await;

    resp.assert_status(StatusCode::INTERNAL_SERVER_ERROR);
    let mut notes = Vec::new();
    state.store.for_each(DEFAULT_BOARD, &mut |n: &Note| notes.push(n.clone()));
    assert_eq!(notes, vec![top]);
}

#[tokio::test]
async fn missing_id_is_rejected() {
    let (app, _state) = common::test_app();
    let server = TestServer::new(app).unwrap();

    let resp = server.post("/").form(&[("action", "remove")]).await;

    resp.assert_status(StatusCode::BAD_REQUEST);
    let body: serde_json::Value = resp.json();
    assert_eq!(body["error"]["details"][0]["field"], "id");
}

#[tokio::test]
async fn unknown_action_is_rejected() {
    let (app, _state) = common::test_app();
    let server = TestServer::new(app).unwrap();

    let resp = server.post("/").form(&[("action", "shred")]).await;

    resp.assert_status(StatusCode::BAD_REQUEST);
    let body: serde_json::Value = resp.json();
    assert_eq!(body["error"]["details"][0]["field"], "action");
}

#[tokio::test]
async fn non_form_body_is_rejected() {
    let (app, _state) = common::test_app();
    let server = TestServer::new(app).unwrap();

    let resp = server.post("/").json(&json!({ "action": "add" })).await;

    resp.assert_status(StatusCode::BAD_REQUEST);
    let body: serde_json::Value = resp.json();
    assert_eq!(body["error"]["code"], "BAD_REQUEST");
}

// ---------------------------------------------------------------------------
// /boards/{board}/
// ---------------------------------------------------------------------------

#[tokio::test]
async fn named_boards_keep_their_own_notes_and_events() {
    let (app, state) = common::test_app();
    let server = TestServer::new(app).unwrap();
    let mut on_things = state.hub.subscribe("things", "test").await.unwrap();
    let mut on_default = state.hub.subscribe(DEFAULT_BOARD, "test").await.unwrap();

    let resp = server
        .post("/boards/things/")
        .form(&[("action", "add"), ("note", "a"), ("x", "1"), ("y", "2")])
        .await;
    resp.assert_json(&json!({ "id": 1, "note": "a", "x": 1, "y": 2 }));

    let frame = tokio::time::timeout(Duration::from_secs(2), on_things.frames.recv())
        .await
        .unwrap()
        .unwrap();
    assert!(frame.starts_with(b"event: add\n"));
    assert!(
        tokio::time::timeout(Duration::from_millis(100), on_default.frames.recv())
            .await
            .is_err(),
        "event leaked to another board"
    );

    let mut on_default = Vec::new();
    state.store.for_each(DEFAULT_BOARD, &mut |n: &Note| on_default.push(n.id));
    assert!(on_default.is_empty());
    assert_eq!(state.store.board_count(), 1);
}

#[tokio::test]
async fn board_path_without_trailing_slash_also_mutates() {
    let (app, state) = common::test_app();
    let server = TestServer::new(app).unwrap();

    server
        .post("/boards/things")
        .form(&[("action", "add"), ("note", "a"), ("x", "1"), ("y", "2")])
        .await
        .assert_status_ok();
    server
        .post("/boards/things")
        .form(&[("action", "remove"), ("id", "1")])
        .await
        .assert_status(StatusCode::NO_CONTENT);
    assert!(state.store.is_empty());
}

#[tokio::test]
async fn board_page_is_served() {
    let (app, _state) = common::test_app();
    let server = TestServer::new(app).unwrap();

    let resp = server.get("/boards/things/").await;

    resp.assert_status_ok();
    assert!(resp.text().contains("<title>Chalkboard</title>"));
}

#[tokio::test]
async fn invalid_board_name_is_rejected() {
    let (app, state) = common::test_app();
    let server = TestServer::new(app).unwrap();

    let resp = server
        .post("/boards/not%20ok/")
        .form(&[("action", "add"), ("note", "a"), ("x", "1"), ("y", "2")])
        .await;

    resp.assert_status(StatusCode::BAD_REQUEST);
    let body: serde_json::Value = resp.json();
    assert_eq!(body["error"]["details"][0]["field"], "board");
    assert!(state.store.is_empty());

    server
        .get("/boards/not%20ok/events")
        .await
        .assert_status(StatusCode::BAD_REQUEST);
}

// ---------------------------------------------------------------------------
// GET /, /js/*, /health, /api-docs
// ---------------------------------------------------------------------------

#[tokio::test]
async fn index_serves_chalkboard_page() {
    let (app, _state) = common::test_app();
    let server = TestServer::new(app).unwrap();

    let resp = server.get("/").await;

    resp.assert_status_ok();
    assert!(resp.text().contains("<title>Chalkboard</title>"));
}

#[tokio::test]
async fn index_missing_from_static_dir_is_not_found() {
    let mut config = common::test_config();
    config.static_dir = std::env::temp_dir().join("chalkboard-no-such-dir");
    let store = std::sync::Arc::new(chalkboard_api::db::notes::MemoryNoteStore::new());
    let (state, _hub) = chalkboard_api::AppState::start(config, store);
    let app = chalkboard_api::routes::router(&state.config).with_state(state);
    let server = TestServer::new(app).unwrap();

    server.get("/").await.assert_status(StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn js_assets_are_served() {
    let (app, _state) = common::test_app();
    let server = TestServer::new(app).unwrap();

    let resp = server.get("/js/chalkboard.js").await;

    resp.assert_status_ok();
    assert!(resp.text().contains("EventSource"));
}

#[tokio::test]
async fn health_reports_subscribers_and_notes() {
    let (app, state) = common::test_app();
    let server = TestServer::new(app).unwrap();
    let _sub = state.hub.subscribe(DEFAULT_BOARD, "test").await.unwrap();
    server
        .post("/")
        .form(&[("action", "add"), ("note", "a"), ("x", "1"), ("y", "2")])
        .await
        .assert_status_ok();

    let resp = server.get("/health").await;

    resp.assert_status_ok();
    resp.assert_json(&json!({ "status": "ok", "subscribers": 1, "notes": 1, "boards": 1 }));
}

#[tokio::test]
async fn openapi_document_lists_endpoints() {
    let (app, _state) = common::test_app();
    let server = TestServer::new(app).unwrap();

    let resp = server.get("/api-docs/openapi.json").await;

    resp.assert_status_ok();
    let doc: serde_json::Value = resp.json();
    assert!(doc["paths"]["/events"].is_object());
    assert!(doc["paths"]["/"]["post"].is_object());
    assert!(doc["paths"]["/health"].is_object());
    assert!(doc["paths"]["/boards/{board}/"]["post"].is_object());
    assert!(doc["paths"]["/boards/{board}/events"].is_object());
}
