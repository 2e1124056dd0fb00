use actix_web::http::StatusCode;
use bot_payment_engine::{db_types::MinorUnits, traits::ChargeStatus};
use serde_json::json;

use super::helpers::TestContext;

#[actix_web::test]
async fn history_and_entitlements_are_per_user() {
    let ctx = TestContext::new(true).await;
    let buyer = &ctx.market.buyer;
    let reference = ctx.open_charge(buyer, "rent", 5_000).await;
    ctx.gateway.set_charge(&reference, ChargeStatus::Success, MinorUnits::from(5_000));
    let (status, _) = ctx.get(buyer, &format!("/api/payments/verify?reference={reference}")).await;
    assert_eq!(status, StatusCode::OK);
    ctx.open_charge(buyer, "purchase", 50_000).await;

    let (status, txs) = ctx.get(buyer, "/api/my/transactions").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(txs.as_array().unwrap().len(), 2);

    let (status, grants) = ctx.get(buyer, "/api/my/entitlements").await;
    assert_eq!(status, StatusCode::OK);
    let grants = grants.as_array().unwrap();
    assert_eq!(grants.len(), 1);
    assert_eq!(grants[0]["access_type"], "rent");
    assert_eq!(grants[0]["is_active"], true);

    let (status, txs) = ctx.get(&ctx.market.other_buyer, "/api/my/transactions").await;
    assert_eq!(status, StatusCode::OK);
    assert!(txs.as_array().unwrap().is_empty());
    let (_, grants) = ctx.get(&ctx.market.other_buyer, "/api/my/entitlements").await;
    assert!(grants.as_array().unwrap().is_empty());
}

#[actix_web::test]
async fn only_admins_set_bank_details() {
    let ctx = TestContext::new(false).await;
    let details = json!({ "bank_code": "058", "account_number": "0123456789", "account_name": "Sally Seller" });

    let (status, _) = ctx.put(&ctx.market.buyer, "/api/admin/bank_details", details.clone()).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, profile) = ctx.put(&ctx.market.seller, "/api/admin/bank_details", details).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(profile["user_id"], ctx.market.seller.id);
    assert_eq!(profile["bank_code"], "058");
    assert!(profile["subaccount_code"].is_null());

    let bad = json!({ "bank_code": "058", "account_number": "01234-567", "account_name": "Sally Seller" });
    let (status, _) = ctx.put(&ctx.market.seller, "/api/admin/bank_details", bad).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    // Superadmins outrank admins
    let details = json!({ "bank_code": "044", "account_number": "9876543210", "account_name": "Root" });
    let (status, _) = ctx.put(&ctx.market.superadmin, "/api/admin/bank_details", details).await;
    assert_eq!(status, StatusCode::OK);
}

#[actix_web::test]
async fn only_superadmins_see_the_ledger() {
    let ctx = TestContext::new(true).await;
    let reference = ctx.open_charge(&ctx.market.buyer, "purchase", 50_000).await;
    ctx.gateway.set_charge(&reference, ChargeStatus::Success, MinorUnits::from(50_000));
    let (status, _) = ctx.get(&ctx.market.buyer, &format!("/api/payments/verify?reference={reference}")).await;
    assert_eq!(status, StatusCode::OK);
    ctx.open_charge(&ctx.market.other_buyer, "rent", 5_000).await;

    let (status, _) = ctx.get(&ctx.market.seller, "/api/transactions").await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, summary) = ctx.get(&ctx.market.superadmin, "/api/transactions").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(summary["transactions"].as_array().unwrap().len(), 2);
    assert_eq!(summary["total_transactions"], 1);
    assert_eq!(summary["total_sales"], 50_000);
    let company = summary["total_company_share"].as_i64().unwrap();
    let admin = summary["total_admin_share"].as_i64().unwrap();
    assert_eq!(company + admin, 50_000);
    assert_eq!(summary["by_admin"][0]["admin_id"], ctx.market.seller.id);
}
