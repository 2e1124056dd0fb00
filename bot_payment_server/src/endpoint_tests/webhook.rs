use std::net::{IpAddr, SocketAddr};

use actix_web::{http::StatusCode, test::TestRequest};
use bot_payment_engine::{db_types::MinorUnits, test_utils::StubGateway, traits::ChargeStatus};
use paystack_tools::signature::calculate_signature;
use serde_json::json;

use super::helpers::TestContext;
use crate::routes::PAYSTACK_SIGNATURE_HEADER;

fn webhook(body: &[u8], signature: Option<&str>) -> TestRequest {
    let mut req = TestRequest::post()
        .uri("/paystack/webhook")
        .insert_header(("Content-Type", "application/json"))
        .set_payload(body.to_vec());
    if let Some(sig) = signature {
        req = req.insert_header((PAYSTACK_SIGNATURE_HEADER, sig));
    }
    req
}

#[actix_web::test]
async fn unsigned_webhooks_are_refused() {
    let ctx = TestContext::new(true).await;
    let reference = ctx.open_charge(&ctx.market.buyer, "purchase", 50_000).await;
    ctx.gateway.set_charge(&reference, ChargeStatus::Success, MinorUnits::from(50_000));
    let body = StubGateway::webhook_body("charge.success", &reference);

    let (status, _) = ctx.send(webhook(&body, None)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    let (status, _) = ctx.send(webhook(&body, Some("0123456789abcdef"))).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    assert_eq!(ctx.gateway.verify_calls(), 0);
    assert!(ctx.db.fetch_grants_for_bot(ctx.market.bot.id).await.unwrap().is_empty());
}

#[actix_web::test]
async fn redelivered_webhooks_grant_once() {
    let ctx = TestContext::new(true).await;
    let reference = ctx.open_charge(&ctx.market.buyer, "purchase", 50_000).await;
    ctx.gateway.set_charge(&reference, ChargeStatus::Success, MinorUnits::from(50_000));
    let body = StubGateway::webhook_body("charge.success", &reference);
    let signature = ctx.gateway.sign(&body);

    for _ in 0..2 {
        let (status, reply) = ctx.send(webhook(&body, Some(&signature))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(reply["status"], "processed");
        assert_eq!(reply["detail"], reference.as_str());
    }
    assert_eq!(ctx.db.fetch_grants_for_bot(ctx.market.bot.id).await.unwrap().len(), 1);

    // The redirect arriving last changes nothing either
    let (status, body) = ctx.get(&ctx.market.buyer, &format!("/api/payments/verify?reference={reference}")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["outcome"], "already_reconciled");
}

#[actix_web::test]
async fn business_failures_are_acknowledged() {
    let ctx = TestContext::new(true).await;
    let body = StubGateway::webhook_body("charge.success", "ALG_3_1729000000_000000");
    let signature = ctx.gateway.sign(&body);
    let (status, reply) = ctx.send(webhook(&body, Some(&signature))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(reply["status"], "declined");

    let body = StubGateway::webhook_body("transfer.success", "TRF_1");
    let signature = ctx.gateway.sign(&body);
    let (status, reply) = ctx.send(webhook(&body, Some(&signature))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(reply["status"], "ignored");
    assert_eq!(reply["detail"], "transfer.success");

    let body = b"{\"event\": \"charge.succ".to_vec();
    let signature = ctx.gateway.sign(&body);
    let (status, _) = ctx.send(webhook(&body, Some(&signature))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[actix_web::test]
async fn unreachable_gateway_asks_for_a_retry() {
    let ctx = TestContext::new(true).await;
    let reference = ctx.open_charge(&ctx.market.buyer, "purchase", 50_000).await;
    let body = StubGateway::webhook_body("charge.success", &reference);
    let signature = ctx.gateway.sign(&body);
    ctx.gateway.set_unreachable(true);
    let (status, _) = ctx.send(webhook(&body, Some(&signature))).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);

    ctx.gateway.set_unreachable(false);
    ctx.gateway.set_charge(&reference, ChargeStatus::Success, MinorUnits::from(50_000));
    let (status, reply) = ctx.send(webhook(&body, Some(&signature))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(reply["status"], "processed");
}

#[actix_web::test]
async fn whitelist_rejects_unknown_peers() {
    let paystack: IpAddr = "52.31.139.75".parse().unwrap();
    let ctx = TestContext::with_whitelist(true, Some(vec![paystack])).await;
    let body = StubGateway::webhook_body("transfer.success", "TRF_1");
    let signature = ctx.gateway.sign(&body);

    let stranger = SocketAddr::new("10.0.0.7".parse().unwrap(), 4000);
    let (status, _) = ctx.send(webhook(&body, Some(&signature)).peer_addr(stranger)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, reply) = ctx.send(webhook(&body, Some(&signature)).peer_addr(SocketAddr::new(paystack, 443))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(reply["status"], "ignored");
}

#[actix_web::test]
async fn paystack_signatures_are_checked_over_the_raw_body() {
    const SECRET_KEY: &str = "sk_test_webhook_endpoint";
    let ctx = TestContext::with_paystack(SECRET_KEY).await;

    let body = json!({ "event": "transfer.success", "data": { "reference": "TRF_1", "amount": 50_000 } }).to_string();
    let signature = calculate_signature(SECRET_KEY, body.as_bytes());
    assert_eq!(signature.len(), 128);
    let (status, reply) = ctx.send(webhook(body.as_bytes(), Some(&signature))).await;
    assert_eq!(status, StatusCode::OK, "{reply}");
    assert_eq!(reply["status"], "ignored");
    assert_eq!(reply["detail"], "transfer.success");

    // Paystack sends lowercase hex, but the digest is compared as bytes
    let (status, _) = ctx.send(webhook(body.as_bytes(), Some(&signature.to_uppercase()))).await;
    assert_eq!(status, StatusCode::OK);

    // Re-serializing the same JSON changes the bytes that were signed
    let pretty = serde_json::to_string_pretty(&serde_json::from_str::<serde_json::Value>(&body).unwrap()).unwrap();
    let (status, _) = ctx.send(webhook(pretty.as_bytes(), Some(&signature))).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let forged = calculate_signature("sk_test_someone_else", body.as_bytes());
    let (status, _) = ctx.send(webhook(body.as_bytes(), Some(&forged))).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    let (status, _) = ctx.send(webhook(body.as_bytes(), None)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    // A signed charge for a reference the ledger never issued is acknowledged before Paystack is asked about it
    let body = json!({
        "event": "charge.success",
        "data": { "reference": "ALG_3_1729000000_000000", "status": "success", "amount": 50_000 }
    })
    .to_string();
    let signature = calculate_signature(SECRET_KEY, body.as_bytes());
    let (status, reply) = ctx.send(webhook(body.as_bytes(), Some(&signature))).await;
    assert_eq!(status, StatusCode::OK, "{reply}");
    assert_eq!(reply["status"], "declined");
    assert!(ctx.db.fetch_grants_for_bot(ctx.market.bot.id).await.unwrap().is_empty());
}
