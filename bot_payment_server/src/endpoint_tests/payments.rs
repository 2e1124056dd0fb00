use actix_web::{http::StatusCode, test::TestRequest};
use bot_payment_engine::{
    db_types::MinorUnits,
    traits::{ChargeStatus, LedgerStore},
};
use serde_json::json;

use super::helpers::TestContext;

#[actix_web::test]
async fn requests_without_a_valid_token_are_refused() {
    let ctx = TestContext::new(true).await;
    let (status, body) = ctx.send(TestRequest::get().uri("/api/my/transactions")).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert!(body["error"].as_str().unwrap().contains("No access token"));

    let req = TestRequest::get().uri("/api/my/transactions").insert_header(("Authorization", "Bearer not.a.token"));
    let (status, body) = ctx.send(req).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert!(body["error"].as_str().unwrap().contains("malformed"));
}

#[actix_web::test]
async fn purchase_via_redirect() {
    let ctx = TestContext::new(true).await;
    let buyer = &ctx.market.buyer;
    let bot_id = ctx.market.bot.id;
    let reference = ctx.open_charge(buyer, "purchase", 50_000).await;

    let (status, body) = ctx.get(buyer, &format!("/api/bots/{bot_id}/access")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["has_access"], false);

    ctx.gateway.set_charge(&reference, ChargeStatus::Success, MinorUnits::from(50_000));
    let (status, body) = ctx.get(buyer, &format!("/api/payments/verify?reference={reference}")).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["outcome"], "reconciled");
    assert_eq!(body["transaction"]["status"], "success");
    assert_eq!(body["grant"]["access_type"], "purchase");
    assert!(body["grant"]["expiry_date"].is_null());

    let (status, body) = ctx.get(buyer, &format!("/api/payments/verify?reference={reference}")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["outcome"], "already_reconciled");
    assert_eq!(ctx.db.fetch_grants_for_bot(bot_id).await.unwrap().len(), 1);
    assert_eq!(ctx.db.fetch_sales_for_bot(bot_id).await.unwrap().len(), 1);

    let (status, body) = ctx.get(buyer, &format!("/api/bots/{bot_id}/access")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["has_access"], true);

    // Owning the bot rules out buying it again
    let req = json!({ "amount": 50_000, "bot_id": bot_id, "payment_type": "purchase" });
    let (status, _) = ctx.post(buyer, "/api/payments/initialize", req).await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[actix_web::test]
async fn initialize_refusals() {
    let ctx = TestContext::new(true).await;
    let buyer = &ctx.market.buyer;
    let bot_id = ctx.market.bot.id;
    let reference = ctx.open_charge(buyer, "rent", 5_000).await;

    let req = json!({ "amount": 5_000, "bot_id": bot_id, "payment_type": "rent" });
    let (status, body) = ctx.post(buyer, "/api/payments/initialize", req).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["reference"], reference.as_str());

    let req = json!({ "amount": 49_999, "bot_id": bot_id, "payment_type": "purchase" });
    let (status, _) = ctx.post(buyer, "/api/payments/initialize", req).await;
    assert_eq!(status, StatusCode::PAYMENT_REQUIRED);

    let req = json!({ "amount": 50_000, "bot_id": bot_id, "payment_type": "lease" });
    let (status, _) = ctx.post(buyer, "/api/payments/initialize", req).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let req = json!({ "amount": 50_000, "bot_id": 9_999, "payment_type": "purchase" });
    let (status, _) = ctx.post(buyer, "/api/payments/initialize", req).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    ctx.gateway.set_unreachable(true);
    let req = json!({ "amount": 50_000, "bot_id": bot_id, "payment_type": "purchase" });
    let (status, _) = ctx.post(&ctx.market.other_buyer, "/api/payments/initialize", req).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
}

#[actix_web::test]
async fn callback_for_an_unknown_reference_records_the_rental() {
    let ctx = TestContext::new(false).await;
    let buyer = &ctx.market.buyer;
    let bot_id = ctx.market.bot.id;
    let reference = "ALG_3_1729000000_00ext1";
    ctx.gateway.set_charge(reference, ChargeStatus::Success, MinorUnits::from(5_000));
    ctx.gateway.set_customer_email(reference, &buyer.email);
    let claim = json!({ "reference": reference, "bot_id": bot_id, "payment_type": "rent", "claimed_amount": 9_999 });
    let (status, body) = ctx.post(buyer, "/api/payments/callback", claim).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["outcome"], "reconciled");
    assert_eq!(body["transaction"]["amount"], 5_000);
    assert_eq!(body["transaction"]["payment_type"], "rent");
    assert!(body["grant"]["expiry_date"].is_string());

    let (status, body) = ctx.get(buyer, "/api/my/transactions").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_array().unwrap().len(), 1);
    assert_eq!(body[0]["reference"], reference);
    // Rentals do not count as sales
    assert!(ctx.db.fetch_sales_for_bot(bot_id).await.unwrap().is_empty());
}

#[actix_web::test]
async fn callback_for_an_unknown_charge_paid_by_another_user_is_forbidden() {
    let ctx = TestContext::new(false).await;
    let bot_id = ctx.market.bot.id;
    let reference = "ALG_3_1729000000_00ext2";
    ctx.gateway.set_charge(reference, ChargeStatus::Success, MinorUnits::from(50_000));
    ctx.gateway.set_customer_email(reference, &ctx.market.buyer.email);
    let claim = json!({ "reference": reference, "bot_id": bot_id, "payment_type": "purchase" });
    let (status, _) = ctx.post(&ctx.market.other_buyer, "/api/payments/callback", claim).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert!(ctx.db.fetch_transaction_by_reference(reference).await.unwrap().is_none());
    assert_eq!(ctx.db.fetch_bot(bot_id).await.unwrap().unwrap().owner_id, ctx.market.seller.id);
}

#[actix_web::test]
async fn callback_for_someone_elses_charge_is_forbidden() {
    let ctx = TestContext::new(true).await;
    let bot_id = ctx.market.bot.id;
    let reference = ctx.open_charge(&ctx.market.buyer, "purchase", 50_000).await;
    ctx.gateway.set_charge(&reference, ChargeStatus::Success, MinorUnits::from(50_000));
    let claim = json!({ "reference": reference, "bot_id": bot_id, "payment_type": "purchase" });
    let (status, _) = ctx.post(&ctx.market.other_buyer, "/api/payments/callback", claim).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = ctx.get(&ctx.market.other_buyer, &format!("/api/payments/verify?reference={reference}")).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert!(ctx.db.fetch_grants_for_bot(bot_id).await.unwrap().is_empty());
}

#[actix_web::test]
async fn pending_charges_can_be_marked_failed_once() {
    let ctx = TestContext::new(true).await;
    let buyer = &ctx.market.buyer;
    let reference = ctx.open_charge(buyer, "purchase", 50_000).await;

    let (status, _) = ctx.patch(buyer, "/api/payments/status", json!({ "reference": reference, "status": "success" })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) =
        ctx.patch(&ctx.market.other_buyer, "/api/payments/status", json!({ "reference": reference, "status": "failed" })).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = ctx.patch(buyer, "/api/payments/status", json!({ "reference": reference, "status": "failed" })).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "failed");

    let (status, _) = ctx.patch(buyer, "/api/payments/status", json!({ "reference": reference, "status": "failed" })).await;
    assert_eq!(status, StatusCode::CONFLICT);

    // A late success report cannot revive it
    ctx.gateway.set_charge(&reference, ChargeStatus::Success, MinorUnits::from(50_000));
    let (status, _) = ctx.get(buyer, &format!("/api/payments/verify?reference={reference}")).await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[actix_web::test]
async fn abandoned_checkout_is_marked_failed() {
    let ctx = TestContext::new(true).await;
    let buyer = &ctx.market.buyer;
    let reference = ctx.open_charge(buyer, "purchase", 50_000).await;
    ctx.gateway.set_charge(&reference, ChargeStatus::Abandoned, MinorUnits::from(50_000));
    let (status, body) = ctx.get(buyer, &format!("/api/payments/verify?reference={reference}")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["outcome"], "marked_failed");
    assert_eq!(body["transaction"]["status"], "failed");

    let (status, _) = ctx.get(buyer, "/api/payments/verify?reference=").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}
