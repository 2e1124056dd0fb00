use std::{net::IpAddr, time::Duration};

use actix_web::{
    dev::{Server, Service},
    http::KeepAlive,
    middleware::Logger,
    web,
    web::ServiceConfig,
    App,
    HttpServer,
};
use bot_payment_engine::{
    events::NotificationHub,
    AccountApi,
    PaymentGateway,
    ReconciliationApi,
    SqliteDatabase,
    UpgradeApi,
};
use futures::{future::ok, FutureExt};
use log::{info, warn};

use crate::{
    auth::TokenIssuer,
    config::{ServerConfig, ServerOptions},
    errors::{AuthError, ServerError},
    helpers::get_remote_ip,
    integrations::paystack::PaystackGateway,
    middleware::JwtMiddlewareFactory,
    routes::{
        health,
        notifications,
        AllTransactionsRoute,
        ApproveUpgradeRoute,
        BotAccessRoute,
        InitializeChargeRoute,
        MyEntitlementsRoute,
        MyTransactionsRoute,
        PaymentCallbackRoute,
        PaystackWebhookRoute,
        PendingUpgradesRoute,
        RejectUpgradeRoute,
        RequestUpgradeRoute,
        UpdateBankDetailsRoute,
        UpdatePaymentStatusRoute,
        VerifyPaymentRoute,
    },
};

const MAX_DB_CONNECTIONS: u32 = 25;

pub async fn run_server(config: ServerConfig) -> Result<(), ServerError> {
    let db = SqliteDatabase::new_with_url(&config.database_url, MAX_DB_CONNECTIONS)
        .await
        .map_err(|e| ServerError::InitializeError(e.to_string()))?;
    db.migrate().await.map_err(|e| ServerError::InitializeError(format!("Could not migrate the database. {e}")))?;
    let gateway = PaystackGateway::new(config.paystack.clone())
        .map_err(|e| ServerError::InitializeError(format!("Could not create the Paystack client. {e}")))?;
    let srv = create_server_instance(config, db, gateway)?;
    srv.await.map_err(|e| ServerError::Unspecified(e.to_string()))
}

/// Everything the handlers share. The APIs are built once and handed to every worker, so that all workers see the same
/// notification hub and serialize subaccount creation on the same lock.
#[derive(Clone)]
pub struct ServerState<G> {
    pub reconciliation: web::Data<ReconciliationApi<SqliteDatabase, G>>,
    pub accounts: web::Data<AccountApi<SqliteDatabase>>,
    pub upgrades: web::Data<UpgradeApi<SqliteDatabase>>,
    pub hub: web::Data<NotificationHub>,
    pub options: web::Data<ServerOptions>,
    pub issuer: TokenIssuer,
    pub webhook_whitelist: Option<Vec<IpAddr>>,
}

impl<G: PaymentGateway> ServerState<G> {
    pub fn new(config: &ServerConfig, db: SqliteDatabase, gateway: G) -> Self {
        let hub = NotificationHub::new();
        let reconciliation = ReconciliationApi::new(db.clone(), gateway).with_gateway_timeout(config.paystack.timeout);
        Self {
            reconciliation: web::Data::new(reconciliation),
            accounts: web::Data::new(AccountApi::new(db.clone())),
            upgrades: web::Data::new(UpgradeApi::new(db, hub.clone())),
            hub: web::Data::new(hub),
            options: web::Data::new(ServerOptions::from_config(config)),
            issuer: TokenIssuer::new(&config.auth),
            webhook_whitelist: config.webhook_whitelist.clone(),
        }
    }
}

pub fn create_server_instance<G>(config: ServerConfig, db: SqliteDatabase, gateway: G) -> Result<Server, ServerError>
where G: PaymentGateway + Clone + Send + Sync + 'static {
    let state = ServerState::new(&config, db, gateway);
    let srv = HttpServer::new(move || {
        let state = state.clone();
        App::new()
            .wrap(Logger::new("%t (%D ms) %s %a %{Host}i %U").log_target("bmp::access_log"))
            .configure(|cfg| configure_app(cfg, state))
    })
    .keep_alive(KeepAlive::Timeout(Duration::from_secs(600)))
    .bind((config.host.as_str(), config.port))?
    .run();
    info!("🚀️ Server bound to {}:{}", config.host, config.port);
    Ok(srv)
}

/// Registers the app data, the authenticated `/api` scope, the `/paystack` webhook scope and the health check.
pub fn configure_app<G: PaymentGateway + 'static>(cfg: &mut ServiceConfig, state: ServerState<G>) {
    let ServerState { reconciliation, accounts, upgrades, hub, options, issuer, webhook_whitelist } = state;
    let use_x_forwarded_for = options.use_x_forwarded_for;
    let use_forwarded = options.use_forwarded;
    cfg.app_data(reconciliation).app_data(accounts).app_data(upgrades).app_data(hub).app_data(options);
    // Routes that require authentication
    let auth_scope = web::scope("/api")
        .wrap(JwtMiddlewareFactory::new(issuer))
        .service(InitializeChargeRoute::<SqliteDatabase, G>::new())
        .service(VerifyPaymentRoute::<SqliteDatabase, G>::new())
        .service(PaymentCallbackRoute::<SqliteDatabase, G>::new())
        .service(UpdatePaymentStatusRoute::<SqliteDatabase, G>::new())
        .service(MyTransactionsRoute::<SqliteDatabase>::new())
        .service(MyEntitlementsRoute::<SqliteDatabase>::new())
        .service(BotAccessRoute::<SqliteDatabase>::new())
        .service(UpdateBankDetailsRoute::<SqliteDatabase>::new())
        .service(AllTransactionsRoute::<SqliteDatabase>::new())
        .service(RequestUpgradeRoute::<SqliteDatabase>::new())
        .service(PendingUpgradesRoute::<SqliteDatabase>::new())
        .service(ApproveUpgradeRoute::<SqliteDatabase>::new())
        .service(RejectUpgradeRoute::<SqliteDatabase>::new())
        .service(notifications);
    let paystack_scope = web::scope("/paystack")
        .wrap_fn(move |req, srv| {
            // Collect peer IP from x-forwarded-for, or forwarded headers _if_ `use_nnn` has been set to true
            // in the configuration. Otherwise, use the peer address from the connection info.
            let peer_ip = get_remote_ip(req.request(), use_x_forwarded_for, use_forwarded);
            let whitelisted = match (peer_ip, &webhook_whitelist) {
                (Some(ip), Some(whitelist)) => {
                    info!("🔐️ Paystack webhook from {ip}");
                    whitelist.contains(&ip)
                },
                (_, None) => true,
                (None, Some(_)) => {
                    warn!("🔐️ No IP address found in Paystack remote peer request, denying access.");
                    false
                },
            };
            if whitelisted {
                srv.call(req).boxed_local()
            } else {
                warn!("🔐️ Webhook call from {peer_ip:?} is not on the Paystack whitelist. Denying access.");
                ok(req.error_response(ServerError::AuthenticationError(AuthError::ForbiddenPeer))).boxed_local()
            }
        })
        .service(PaystackWebhookRoute::<SqliteDatabase, G>::new());
    cfg.service(health).service(auth_scope).service(paystack_scope);
}
