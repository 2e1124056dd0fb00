//! Request handler definitions
//!
//! Define each route and its handler here.
//! Handlers that are more than a line or two MUST go into a separate module. Keep this module neat and tidy 🙏
//!
//! A note about performance:
//! Since each worker thread processes its requests sequentially, handlers which block the current thread will cause the
//! current worker to stop processing new requests. Every database and gateway call below is awaited, so a slow Paystack
//! response only parks the request that made it.
use actix_web::{get, http::header, web, HttpRequest, HttpResponse, Responder};
use bot_payment_engine::{
    db_types::{BankDetails, Role},
    events::NotificationHub,
    payment_objects::{CallbackClaim, ChargeInitRequest, WebhookAck},
    traits::{AccountManagement, LedgerStore, PaymentGateway},
    AccountApi,
    ReconciliationApi,
    ReconciliationError,
    UpgradeApi,
};
use futures::{stream, StreamExt};
use log::*;

use crate::{
    auth::JwtClaims,
    config::ServerOptions,
    data_objects::{JsonResponse, MarkFailedParams, VerifyQuery, WebhookReply},
    errors::ServerError,
    helpers::get_remote_ip,
};

/// Paystack signs every webhook body with HMAC-SHA512 and sends the hex digest in this header.
pub const PAYSTACK_SIGNATURE_HEADER: &str = "x-paystack-signature";

// Web-actix cannot handle generics in handlers, so it's implemented manually using the `route!` macro
#[macro_export]
macro_rules! route {
    ($name:ident => $method:ident $path:literal requires [$($roles:expr),*]) => {
        paste::paste! { pub struct [<$name:camel Route>];}
        paste::paste! {
                impl [<$name:camel Route>] {
                #[allow(clippy::new_without_default)]
                pub fn new() -> Self { Self }
            }
        }
        paste::paste! {
            impl actix_web::dev::HttpServiceFactory for [<$name:camel Route>] {
                fn register(self, config: &mut actix_web::dev::AppService) {
                    let res = actix_web::Resource::new($path)
                        .name(stringify!($name))
                        .guard(actix_web::guard::$method())
                        .to($name)
                        .wrap($crate::middleware::AclMiddlewareFactory::new(&[$($roles),+]));
                    actix_web::dev::HttpServiceFactory::register(res, config);
                }
            }
        }
    };

    ($name:ident => $method:ident $path:literal impl $($bounds:ty),+) => {
        paste::paste! { pub struct [<$name:camel Route>]< $( [< T $bounds:camel> ],)+ >( $( core::marker::PhantomData<fn() -> [< T $bounds:camel> ] >,)+ );}
        paste::paste! { impl< $( [< T $bounds:camel> ],)+ > [<$name:camel Route>]< $( [< T $bounds:camel> ],)+ > {
            #[allow(clippy::new_without_default)]
            pub fn new() -> Self {
                Self($( core::marker::PhantomData::<fn() -> [< T $bounds:camel> ] >,)+)
            }
        }}
        paste::paste! { impl<$( [< T $bounds:camel >] , )+> actix_web::dev::HttpServiceFactory for [<$name:camel Route>]<$([<T $bounds:camel>],)+>
        where
            $([<T $bounds:camel>]: $bounds + 'static,)+
        {
            fn register(self, config: &mut actix_web::dev::AppService) {
                let res = actix_web::Resource::new($path)
                    .name(stringify!($name))
                    .guard(actix_web::guard::$method())
                    .to($name::< $( [< T $bounds:camel >], )+>);
                actix_web::dev::HttpServiceFactory::register(res, config);
            }
        }}
    };

    ($name:ident => $method:ident $path:literal impl $($bounds:ty),+ where requires [$($roles:expr),*])  => {
        paste::paste! { pub struct [<$name:camel Route>]<A>(core::marker::PhantomData<fn() -> A>);}
        paste::paste! { impl<A> [<$name:camel Route>]<A> {
            #[allow(clippy::new_without_default)]
            pub fn new() -> Self {
                Self(core::marker::PhantomData::<fn() -> A>)
            }
        }}
        paste::paste! { impl<A> actix_web::dev::HttpServiceFactory for [<$name:camel Route>]<A>
        where
            A: $($bounds)++ 'static,
        {
            fn register(self, config: &mut actix_web::dev::AppService) {
                let res = actix_web::Resource::new($path)
                    .name(stringify!($name))
                    .guard(actix_web::guard::$method())
                    .to($name::<A>)
                    .wrap($crate::middleware::AclMiddlewareFactory::new(&[$($roles),+]));
                actix_web::dev::HttpServiceFactory::register(res, config);
            }
        }}
    };
}

// ----------------------------------------------   Health  ----------------------------------------------------
#[get("/health")]
pub async fn health() -> impl Responder {
    trace!("💻️ Received health check request");
    HttpResponse::Ok().body("👍️\n")
}

//----------------------------------------------   Payments  ----------------------------------------------------
route!(initialize_charge => Post "/payments/initialize" impl LedgerStore, PaymentGateway);
/// Opens a charge for the caller. The response carries the pending transaction and the gateway's checkout URL.
///
/// A second attempt while a charge for the same bot is still pending fails with a 409 whose body includes the
/// existing reference, so the client can resume it instead.
pub async fn initialize_charge<B: LedgerStore, G: PaymentGateway>(
    claims: JwtClaims,
    body: web::Json<ChargeInitRequest>,
    api: web::Data<ReconciliationApi<B, G>>,
) -> Result<HttpResponse, ServerError> {
    let request = body.into_inner();
    debug!("💻️ POST initialize {} for bot #{} from user #{}", request.payment_type, request.bot_id, claims.user_id);
    let charge = api.initialize_charge(&claims.principal(), request).await?;
    Ok(HttpResponse::Ok().json(charge))
}

route!(verify_payment => Get "/payments/verify" impl LedgerStore, PaymentGateway);
/// The redirect path. The browser lands here with `?reference=` after checkout.
pub async fn verify_payment<B: LedgerStore, G: PaymentGateway>(
    claims: JwtClaims,
    query: web::Query<VerifyQuery>,
    api: web::Data<ReconciliationApi<B, G>>,
) -> Result<HttpResponse, ServerError> {
    let reference = query.into_inner().reference;
    debug!("💻️ GET verify [{reference}] for user #{}", claims.user_id);
    let outcome = api.verify_reference(&claims.principal(), &reference).await?;
    Ok(HttpResponse::Ok().json(outcome))
}

route!(payment_callback => Post "/payments/callback" impl LedgerStore, PaymentGateway);
pub async fn payment_callback<B: LedgerStore, G: PaymentGateway>(
    claims: JwtClaims,
    body: web::Json<CallbackClaim>,
    api: web::Data<ReconciliationApi<B, G>>,
) -> Result<HttpResponse, ServerError> {
    let claim = body.into_inner();
    debug!("💻️ POST callback [{}] from user #{}", claim.reference, claims.user_id);
    let outcome = api.frontend_callback(&claims.principal(), claim).await?;
    Ok(HttpResponse::Ok().json(outcome))
}

route!(update_payment_status => Patch "/payments/status" impl LedgerStore, PaymentGateway);
pub async fn update_payment_status<B: LedgerStore, G: PaymentGateway>(
    claims: JwtClaims,
    body: web::Json<MarkFailedParams>,
    api: web::Data<ReconciliationApi<B, G>>,
) -> Result<HttpResponse, ServerError> {
    let MarkFailedParams { reference, status } = body.into_inner();
    debug!("💻️ PATCH status of [{reference}] to '{status}' from user #{}", claims.user_id);
    if !status.trim().eq_ignore_ascii_case("failed") {
        return Err(ReconciliationError::InvalidInput(format!("Cannot set a payment to '{status}'")).into());
    }
    let tx = api.mark_failed(&claims.principal(), &reference).await?;
    Ok(HttpResponse::Ok().json(tx))
}

//----------------------------------------------   Webhook  ----------------------------------------------------
route!(paystack_webhook => Post "/webhook" impl LedgerStore, PaymentGateway);
/// Paystack's server-to-server notification.
///
/// The body is taken as raw bytes because the signature covers them exactly. Anything Paystack does not need to resend
/// gets a 200, including payments that were declined. Signature failures get a 401 and malformed payloads a 400.
pub async fn paystack_webhook<B: LedgerStore, G: PaymentGateway>(
    req: HttpRequest,
    body: web::Bytes,
    options: web::Data<ServerOptions>,
    api: web::Data<ReconciliationApi<B, G>>,
) -> Result<HttpResponse, ServerError> {
    let peer = get_remote_ip(&req, options.use_x_forwarded_for, options.use_forwarded);
    trace!("💻️ Received webhook from {peer:?} ({} bytes)", body.len());
    let signature = req.headers().get(PAYSTACK_SIGNATURE_HEADER).and_then(|v| v.to_str().ok());
    let ack = api.handle_webhook(body.as_ref(), signature).await.map_err(|e| {
        warn!("💻️ Webhook from {peer:?} was not accepted. {e}");
        e
    })?;
    if let WebhookAck::Declined(e) = &ack {
        info!("💻️ Webhook declined: {e}");
    }
    Ok(HttpResponse::Ok().json(WebhookReply::from(&ack)))
}

//----------------------------------------------   Account  ----------------------------------------------------
route!(my_transactions => Get "/my/transactions" impl AccountManagement);
pub async fn my_transactions<B: AccountManagement>(
    claims: JwtClaims,
    api: web::Data<AccountApi<B>>,
) -> Result<HttpResponse, ServerError> {
    debug!("💻️ GET my_transactions for user #{}", claims.user_id);
    let txs = api.transactions_for_user(claims.user_id).await?;
    Ok(HttpResponse::Ok().json(txs))
}

route!(my_entitlements => Get "/my/entitlements" impl AccountManagement);
pub async fn my_entitlements<B: AccountManagement>(
    claims: JwtClaims,
    api: web::Data<AccountApi<B>>,
) -> Result<HttpResponse, ServerError> {
    debug!("💻️ GET my_entitlements for user #{}", claims.user_id);
    let grants = api.grants_for_user(claims.user_id).await?;
    Ok(HttpResponse::Ok().json(grants))
}

route!(bot_access => Get "/bots/{id}/access" impl AccountManagement);
pub async fn bot_access<B: AccountManagement>(
    claims: JwtClaims,
    path: web::Path<i64>,
    api: web::Data<AccountApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let bot_id = path.into_inner();
    trace!("💻️ GET access to bot #{bot_id} for user #{}", claims.user_id);
    let status = api.access_status(claims.user_id, bot_id).await?;
    Ok(HttpResponse::Ok().json(status))
}

route!(update_bank_details => Put "/admin/bank_details" impl AccountManagement where requires [Role::Admin]);
pub async fn update_bank_details<B: AccountManagement>(
    claims: JwtClaims,
    body: web::Json<BankDetails>,
    api: web::Data<AccountApi<B>>,
) -> Result<HttpResponse, ServerError> {
    debug!("💻️ PUT bank details for admin #{}", claims.user_id);
    let profile = api.update_bank_details(claims.user_id, body.into_inner()).await?;
    Ok(HttpResponse::Ok().json(profile))
}

route!(all_transactions => Get "/transactions" impl AccountManagement where requires [Role::SuperAdmin]);
pub async fn all_transactions<B: AccountManagement>(api: web::Data<AccountApi<B>>) -> Result<HttpResponse, ServerError> {
    debug!("💻️ GET all transactions");
    let summary = api.transaction_summary().await?;
    Ok(HttpResponse::Ok().json(summary))
}

//----------------------------------------------   Upgrades  ----------------------------------------------------
route!(request_upgrade => Post "/upgrade/request" impl AccountManagement);
pub async fn request_upgrade<B: AccountManagement>(
    claims: JwtClaims,
    api: web::Data<UpgradeApi<B>>,
) -> Result<HttpResponse, ServerError> {
    debug!("💻️ POST upgrade request from user #{}", claims.user_id);
    api.request_upgrade(claims.user_id).await?;
    Ok(HttpResponse::Ok().json(JsonResponse::success("Upgrade request submitted")))
}

route!(pending_upgrades => Get "/upgrade/pending" impl AccountManagement where requires [Role::SuperAdmin]);
pub async fn pending_upgrades<B: AccountManagement>(
    api: web::Data<UpgradeApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let users = api.pending_requests().await?;
    Ok(HttpResponse::Ok().json(users))
}

route!(approve_upgrade => Post "/upgrade/{id}/approve" impl AccountManagement where requires [Role::SuperAdmin]);
pub async fn approve_upgrade<B: AccountManagement>(
    claims: JwtClaims,
    path: web::Path<i64>,
    api: web::Data<UpgradeApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let user_id = path.into_inner();
    info!("💻️ Superadmin #{} approves the upgrade of user #{user_id}", claims.user_id);
    let user = api.approve_upgrade(user_id).await?;
    Ok(HttpResponse::Ok().json(user))
}

route!(reject_upgrade => Post "/upgrade/{id}/reject" impl AccountManagement where requires [Role::SuperAdmin]);
pub async fn reject_upgrade<B: AccountManagement>(
    claims: JwtClaims,
    path: web::Path<i64>,
    api: web::Data<UpgradeApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let user_id = path.into_inner();
    info!("💻️ Superadmin #{} rejects the upgrade of user #{user_id}", claims.user_id);
    let user = api.reject_upgrade(user_id).await?;
    Ok(HttpResponse::Ok().json(user))
}

//----------------------------------------------   Notifications  ----------------------------------------------------
/// A server-sent event stream of the caller's notifications. Connecting again replaces the previous stream.
#[get("/notifications")]
pub async fn notifications(claims: JwtClaims, hub: web::Data<NotificationHub>) -> impl Responder {
    debug!("💻️ User #{} connected to the notification stream", claims.user_id);
    let subscription = hub.register(claims.user_id, claims.role);
    let hello = stream::once(async { Ok::<_, actix_web::Error>(web::Bytes::from_static(b": connected\n\n")) });
    let events = stream::unfold(subscription, |mut sub| async move {
        let notification = sub.recv().await?;
        let data = serde_json::to_string(&notification).unwrap_or_else(|_| notification.message.clone());
        Some((Ok::<_, actix_web::Error>(web::Bytes::from(format!("data: {data}\n\n"))), sub))
    });
    HttpResponse::Ok()
        .content_type("text/event-stream")
        .insert_header(header::CacheControl(vec![header::CacheDirective::NoCache]))
        .streaming(hello.chain(events))
}
