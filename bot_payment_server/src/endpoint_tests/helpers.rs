use std::net::IpAddr;

use actix_web::{body::to_bytes, http::StatusCode, test, test::TestRequest, App};
use bot_payment_engine::{
    db_types::User,
    test_utils::{prepare_test_env, random_db_path, seed_marketplace, Marketplace, StubGateway},
    PaymentGateway,
    SqliteDatabase,
};
use log::debug;
use paystack_tools::PaystackConfig;
use serde_json::Value;

use crate::{
    config::{AuthConfig, ServerConfig},
    integrations::paystack::PaystackGateway,
    server::{configure_app, ServerState},
};

// DO NOT re-use this secret anywhere.
pub const TEST_SECRET: &str = "endpoint-tests-only-secret-0123456789abcdef";

/// A seeded marketplace, a payment gateway and the server state that the app under test is built from.
pub struct TestContext<G = StubGateway> {
    pub db: SqliteDatabase,
    pub gateway: G,
    pub market: Marketplace,
    pub state: ServerState<G>,
}

impl TestContext<StubGateway> {
    pub async fn new(bank_details: bool) -> Self {
        Self::with_whitelist(bank_details, None).await
    }

    pub async fn with_whitelist(bank_details: bool, webhook_whitelist: Option<Vec<IpAddr>>) -> Self {
        Self::with_gateway(bank_details, webhook_whitelist, PaystackConfig::default(), StubGateway::default()).await
    }
}

impl TestContext<PaystackGateway> {
    /// Wires in the real Paystack adapter. Nothing that reaches the Paystack API should be sent through it.
    pub async fn with_paystack(secret_key: &str) -> Self {
        let paystack = PaystackConfig { secret_key: secret_key.to_string().into(), ..Default::default() };
        let gateway = PaystackGateway::new(paystack.clone()).expect("Error creating Paystack gateway");
        Self::with_gateway(true, None, paystack, gateway).await
    }
}

impl<G: PaymentGateway + Clone + 'static> TestContext<G> {
    pub async fn with_gateway(
        bank_details: bool,
        webhook_whitelist: Option<Vec<IpAddr>>,
        paystack: PaystackConfig,
        gateway: G,
    ) -> Self {
        let url = random_db_path();
        prepare_test_env(&url).await;
        let db = SqliteDatabase::new_with_url(&url, 5).await.expect("Error creating database");
        let market = seed_marketplace(&db, bank_details).await;
        let config = ServerConfig {
            host: "127.0.0.1".into(),
            port: 0,
            database_url: url,
            auth: AuthConfig::new(TEST_SECRET),
            use_x_forwarded_for: false,
            use_forwarded: false,
            paystack,
            webhook_whitelist,
        };
        let state = ServerState::new(&config, db.clone(), gateway.clone());
        Self { db, gateway, market, state }
    }

    pub fn token(&self, user: &User) -> String {
        self.state.issuer.issue_token(user.id, &user.email, user.role, None).unwrap()
    }

    /// Sends the request through a freshly built app. Errors raised by middleware are rendered the same way the
    /// running server would render them.
    pub async fn send(&self, req: TestRequest) -> (StatusCode, Value) {
        let state = self.state.clone();
        let app = test::init_service(App::new().configure(|cfg| configure_app(cfg, state))).await;
        let res = match test::try_call_service(&app, req.to_request()).await {
            Ok(res) => res.into_parts().1.map_into_boxed_body(),
            Err(e) => {
                debug!("🚀️ Request failed in middleware: {e}");
                e.error_response()
            },
        };
        let status = res.status();
        let body = to_bytes(res.into_body()).await.unwrap();
        let body = if body.is_empty() { Value::Null } else { serde_json::from_slice(&body).unwrap_or(Value::Null) };
        (status, body)
    }

    pub async fn get(&self, user: &User, path: &str) -> (StatusCode, Value) {
        let req = TestRequest::get().uri(path).insert_header(("Authorization", format!("Bearer {}", self.token(user))));
        self.send(req).await
    }

    pub async fn post(&self, user: &User, path: &str, body: Value) -> (StatusCode, Value) {
        let req = TestRequest::post()
            .uri(path)
            .insert_header(("Authorization", format!("Bearer {}", self.token(user))))
            .set_json(body);
        self.send(req).await
    }

    pub async fn put(&self, user: &User, path: &str, body: Value) -> (StatusCode, Value) {
        let req = TestRequest::put()
            .uri(path)
            .insert_header(("Authorization", format!("Bearer {}", self.token(user))))
            .set_json(body);
        self.send(req).await
    }

    pub async fn patch(&self, user: &User, path: &str, body: Value) -> (StatusCode, Value) {
        let req = TestRequest::patch()
            .uri(path)
            .insert_header(("Authorization", format!("Bearer {}", self.token(user))))
            .set_json(body);
        self.send(req).await
    }

    /// Opens a charge as `user` and returns its reference.
    pub async fn open_charge(&self, user: &User, payment_type: &str, amount: i64) -> String {
        let body = serde_json::json!({
            "amount": amount,
            "bot_id": self.market.bot.id,
            "payment_type": payment_type,
        });
        let (status, body) = self.post(user, "/api/payments/initialize", body).await;
        assert_eq!(status, StatusCode::OK, "{body}");
        body["transaction"]["reference"].as_str().expect("reference").to_string()
    }
}
