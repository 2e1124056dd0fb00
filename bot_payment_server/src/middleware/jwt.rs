//! Access token middleware for Actix Web.
//!
//! Wrap a scope with [`JwtMiddlewareFactory`] to require a valid access token on every route inside it. The token is
//! read from the `Authorization: Bearer <token>` header, or failing that, from a `token` query parameter (browsers
//! cannot set headers on an `EventSource`).
//!
//! On success the decoded [`JwtClaims`] are inserted into the request extensions, where the [`AclMiddlewareFactory`]
//! and the handlers pick them up.
//!
//! [`AclMiddlewareFactory`]: super::AclMiddlewareFactory
use std::{
    future::{ready, Ready},
    rc::Rc,
};

use actix_web::{
    dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform},
    http::header::AUTHORIZATION,
    web,
    Error,
    HttpMessage,
};
use futures::future::LocalBoxFuture;
use log::{trace, warn};
use serde::Deserialize;

use crate::{
    auth::{JwtClaims, TokenIssuer},
    errors::{AuthError, ServerError},
};

pub struct JwtMiddlewareFactory {
    issuer: TokenIssuer,
}

impl JwtMiddlewareFactory {
    pub fn new(issuer: TokenIssuer) -> Self {
        JwtMiddlewareFactory { issuer }
    }
}

impl<S, B> Transform<S, ServiceRequest> for JwtMiddlewareFactory
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Error = Error;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;
    type InitError = ();
    type Response = ServiceResponse<B>;
    type Transform = JwtMiddlewareService<S>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(JwtMiddlewareService { issuer: Rc::new(self.issuer.clone()), service: Rc::new(service) }))
    }
}

pub struct JwtMiddlewareService<S> {
    issuer: Rc<TokenIssuer>,
    service: Rc<S>,
}

#[derive(Deserialize)]
struct TokenQuery {
    token: Option<String>,
}

impl<S, B> Service<ServiceRequest> for JwtMiddlewareService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;
    type Response = ServiceResponse<B>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let service = Rc::clone(&self.service);
        let issuer = Rc::clone(&self.issuer);
        Box::pin(async move {
            trace!("🔐️ Checking access token for {}", req.path());
            let token = bearer_token(&req).ok_or_else(|| {
                trace!("🔐️ No access token found in request. Denying access.");
                ServerError::AuthenticationError(AuthError::MissingToken)
            })?;
            let claims = issuer.validate(&token).map_err(|e| {
                warn!("🔐️ Invalid access token presented for {}. {e}", req.path());
                ServerError::AuthenticationError(e)
            })?;
            trace!("🔐️ Access token for user #{} ✅️", claims.user_id);
            req.extensions_mut().insert::<JwtClaims>(claims);
            service.call(req).await
        })
    }
}

fn bearer_token(req: &ServiceRequest) -> Option<String> {
    let from_header = req
        .headers()
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer ").or_else(|| v.strip_prefix("bearer ")))
        .map(|t| t.trim().to_string());
    from_header.or_else(|| {
        web::Query::<TokenQuery>::from_query(req.query_string()).ok().and_then(|q| q.into_inner().token)
    })
    .filter(|t| !t.is_empty())
}
