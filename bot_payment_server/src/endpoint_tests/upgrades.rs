use std::{future::poll_fn, pin::Pin, time::Duration};

use actix_web::{
    body::MessageBody,
    http::StatusCode,
    test,
    test::TestRequest,
    web::Bytes,
    App,
};
use serde_json::json;

use super::helpers::TestContext;
use crate::server::configure_app;

#[actix_web::test]
async fn upgrade_workflow() {
    let ctx = TestContext::new(false).await;
    let buyer = &ctx.market.buyer;
    let root = &ctx.market.superadmin;

    let (status, body) = ctx.post(buyer, "/api/upgrade/request", json!({})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    let (status, _) = ctx.post(buyer, "/api/upgrade/request", json!({})).await;
    assert_eq!(status, StatusCode::CONFLICT);
    let (status, _) = ctx.post(&ctx.market.seller, "/api/upgrade/request", json!({})).await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, _) = ctx.get(&ctx.market.seller, "/api/upgrade/pending").await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, pending) = ctx.get(root, "/api/upgrade/pending").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(pending.as_array().unwrap().len(), 1);
    assert_eq!(pending[0]["id"], buyer.id);
    assert_eq!(pending[0]["upgrade_request_status"], "pending");

    let path = format!("/api/upgrade/{}/approve", buyer.id);
    let (status, _) = ctx.post(&ctx.market.seller, &path, json!({})).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, user) = ctx.post(root, &path, json!({})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(user["role"], "admin");
    let (status, _) = ctx.post(root, &path, json!({})).await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (_, pending) = ctx.get(root, "/api/upgrade/pending").await;
    assert!(pending.as_array().unwrap().is_empty());
}

#[actix_web::test]
async fn rejected_requests() {
    let ctx = TestContext::new(false).await;
    let carol = &ctx.market.other_buyer;
    let root = &ctx.market.superadmin;
    let path = format!("/api/upgrade/{}/reject", carol.id);

    let (status, _) = ctx.post(root, &path, json!({})).await;
    assert_eq!(status, StatusCode::CONFLICT);
    let (status, _) = ctx.post(carol, "/api/upgrade/request", json!({})).await;
    assert_eq!(status, StatusCode::OK);
    let (status, user) = ctx.post(root, &path, json!({})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(user["role"], "user");
    assert_eq!(user["upgrade_request_status"], "rejected");

    // A rejected user may ask again
    let (status, _) = ctx.post(carol, "/api/upgrade/request", json!({})).await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = ctx.post(root, "/api/upgrade/9999/approve", json!({})).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

async fn next_chunk<B: MessageBody>(body: &mut Pin<Box<B>>) -> Bytes {
    let chunk = tokio::time::timeout(Duration::from_secs(5), poll_fn(|cx| body.as_mut().poll_next(cx)))
        .await
        .expect("Timed out waiting for an event");
    match chunk {
        Some(Ok(bytes)) => bytes,
        Some(Err(_)) => panic!("Event stream failed"),
        None => panic!("Event stream closed"),
    }
}

#[actix_web::test]
async fn superadmins_hear_about_upgrade_requests() {
    let ctx = TestContext::new(false).await;
    let state = ctx.state.clone();
    let app = test::init_service(App::new().configure(|cfg| configure_app(cfg, state))).await;
    let token = ctx.token(&ctx.market.superadmin);
    // EventSource cannot set headers, so the token travels in the query string
    let req = TestRequest::get().uri(&format!("/api/notifications?token={token}")).to_request();
    let res = test::call_service(&app, req).await;
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(res.headers().get("content-type").unwrap(), "text/event-stream");
    let mut body = Box::pin(res.into_body());

    let hello = next_chunk(&mut body).await;
    assert_eq!(hello, ": connected\n\n");
    assert_eq!(ctx.state.hub.connected_count(), 1);

    let (status, _) = ctx.post(&ctx.market.buyer, "/api/upgrade/request", json!({})).await;
    assert_eq!(status, StatusCode::OK);

    let event = next_chunk(&mut body).await;
    let event = std::str::from_utf8(&event).unwrap();
    assert!(event.starts_with("data: "));
    let data: serde_json::Value = serde_json::from_str(event.trim_start_matches("data: ").trim()).unwrap();
    assert_eq!(data["message"], "📩 New upgrade request from bob@example.com");

    drop(body);
    assert_eq!(ctx.state.hub.connected_count(), 0);
}
