//! Shared fixtures: a board over the in-memory store and request helpers.

#![allow(dead_code)]

use std::sync::Arc;

use api_adapters::{router, AppState};
use axum::body::{to_bytes, Body};
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use chrono::{TimeDelta, TimeZone, Utc};
use domains::{CaptchaRenderer, ManualClock};
use serde_json::Value;
use services::{
    BoardEngine, CaptchaService, HtmlSanitizer, PageCache, PostPolicy, PostService,
};
use storage_adapters::MemoryStore;
use tower::ServiceExt;

pub const REPORT_TO: &str = "bug@example.org";

pub struct PlainRenderer;

impl CaptchaRenderer for PlainRenderer {
    fn render(&self, _solution: &str) -> String {
        "<svg></svg>".to_string()
    }
}

pub struct TestBoard {
    pub store: Arc<MemoryStore>,
    pub clock: Arc<ManualClock>,
    pub app: Router,
}

impl TestBoard {
    pub fn new() -> Self {
        let store = Arc::new(MemoryStore::new());
        let clock = Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap(),
        ));
        let engine = BoardEngine::new(
            PostService::new(
                store.clone(),
                Arc::new(HtmlSanitizer),
                clock.clone(),
                PostPolicy::default(),
            ),
            CaptchaService::new(store.clone(), Arc::new(PlainRenderer), clock.clone()),
            Arc::new(PageCache::new(10, TimeDelta::seconds(30), clock.clone())),
        );
        let app = router(AppState::new(Arc::new(engine), REPORT_TO));
        Self { store, clock, app }
    }

    pub async fn send(&self, req: Request<Body>) -> (StatusCode, Value) {
        let response = self.app.clone().oneshot(req).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, body)
    }

    pub async fn get(&self, uri: &str) -> (StatusCode, Value) {
        self.send(Request::get(uri).body(Body::empty()).unwrap()).await
    }

    pub async fn post_json(&self, uri: &str, body: Value) -> (StatusCode, Value) {
        let req = Request::builder()
            .method(Method::POST)
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap();
        self.send(req).await
    }

    pub async fn post_form(&self, uri: &str, body: &str) -> (StatusCode, Value) {
        let req = Request::builder()
            .method(Method::POST)
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(Body::from(body.to_string()))
            .unwrap();
        self.send(req).await
    }

    /// A fresh challenge id and its answer.
    pub async fn captcha(&self) -> (String, String) {
        let (status, body) = self.get("/captcha").await;
        assert_eq!(status, StatusCode::OK);
        let id = body["captcha_id"].as_str().unwrap().to_string();
        let solution = self.store.peek_solution(&id).unwrap();
        (id, solution)
    }

    /// Posts `content` with a solved captcha and returns the success body.
    pub async fn post(&self, content: &str, on_thread: Option<i64>) -> Value {
        let (captcha_id, captcha_solution) = self.captcha().await;
        let mut body = serde_json::json!({
            "content": content,
            "captcha_id": captcha_id,
            "captcha_solution": captcha_solution,
        });
        if let Some(thread) = on_thread {
            body["on_thread"] = thread.into();
        }
        let (status, body) = self.post_json("/post/", body).await;
        assert_eq!(status, StatusCode::OK, "{body}");
        body
    }
}
