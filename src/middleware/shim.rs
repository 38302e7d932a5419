//! `Transform`/`Service` pair adapting [`crate::dispatch::dispatch`] to an
//! `actix-web` pipeline, grounded on the reference gateway's
//! `JwtAuth`/`JwtAuthMiddleware` pair (`middleware/auth.rs`): a zero-state
//! `Transform` that clones an `Rc`-shared config into a `Service` wrapper,
//! and does its work inside a boxed future built with `forward_ready!`.

use crate::collaborators::{Events, KeystoreProvider, Persistence, ProducerPool};
use crate::dispatch::{self, DispatchOutcome};
use crate::models::response::HeaderBag;
use crate::models::{Channel, RequestContext};
use crate::response_adapter::AdaptedResponse;
use actix_web::dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform};
use actix_web::http::StatusCode;
use actix_web::{Error, HttpMessage, HttpResponse};
use bytes::{Bytes, BytesMut};
use futures::future::{ok, LocalBoxFuture, Ready};
use futures::StreamExt;
use std::rc::Rc;
use std::sync::Arc;

/// Inserted into a `ServiceRequest`'s extensions by an upstream
/// authentication/channel-resolution stage (out of scope for this crate) so
/// [`RouterMiddleware`] knows which channel and transaction a request
/// belongs to.
#[derive(Debug, Clone)]
pub struct ChannelBinding {
    pub channel: Channel,
    pub transaction_id: String,
}

/// The external collaborators the dispatch engine needs, bundled once at
/// application startup and shared across every request.
pub struct RouterServices {
    pub keystore_provider: Arc<dyn KeystoreProvider>,
    pub producer_pool: Arc<dyn ProducerPool>,
    pub persistence: Arc<dyn Persistence>,
    pub events: Arc<dyn Events>,
    pub http_client: reqwest::Client,
    pub default_timeout_ms: u64,
    pub kafka_brokers: Vec<String>,
}

pub struct RouterMiddleware {
    services: Rc<RouterServices>,
}

impl RouterMiddleware {
    pub fn new(services: RouterServices) -> Self {
        Self {
            services: Rc::new(services),
        }
    }
}

impl<S, B> Transform<S, ServiceRequest> for RouterMiddleware
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: actix_web::body::MessageBody + 'static,
{
    type Response = ServiceResponse<actix_web::body::BoxBody>;
    type Error = Error;
    type Transform = RouterService<S>;
    type InitError = ();
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ok(RouterService {
            service: Rc::new(service),
            services: self.services.clone(),
        })
    }
}

pub struct RouterService<S> {
    service: Rc<S>,
    services: Rc<RouterServices>,
}

impl<S, B> Service<ServiceRequest> for RouterService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: actix_web::body::MessageBody + 'static,
{
    type Response = ServiceResponse<actix_web::body::BoxBody>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let services = self.services.clone();

        Box::pin(async move {
            let binding = req.extensions().get::<ChannelBinding>().cloned();
            let (http_req, mut payload) = req.into_parts();

            let Some(binding) = binding else {
                log::error!("RouterMiddleware reached without a ChannelBinding in request extensions");
                let resp = HttpResponse::InternalServerError().finish();
                return Ok(ServiceResponse::new(http_req, resp));
            };

            let mut buf = BytesMut::new();
            while let Some(chunk) = payload.next().await {
                match chunk {
                    Ok(bytes) => buf.extend_from_slice(&bytes),
                    Err(e) => {
                        let resp = HttpResponse::BadRequest().body(e.to_string());
                        return Ok(ServiceResponse::new(http_req, resp));
                    }
                }
            }
            let body = buf.freeze();

            let mut ctx = build_context(&http_req, &binding, body);
            let mut adapted: Option<AdaptedResponse> = None;

            if !binding.channel.is_method_allowed(&ctx.method) {
                synthesize_method_not_allowed(&mut ctx, &binding.channel);
            } else {
                match dispatch::dispatch(
                    &mut ctx,
                    &binding.channel,
                    services.keystore_provider.as_ref(),
                    &services.http_client,
                    services.producer_pool.as_ref(),
                    services.persistence.as_ref(),
                    services.events.as_ref(),
                    services.default_timeout_ms,
                    &services.kafka_brokers,
                )
                .await
                {
                    Ok(DispatchOutcome { adapted: a, .. }) => adapted = a,
                    Err(e) => {
                        log::error!("dispatch preflight failed for channel '{}': {e}", binding.channel.name);
                        ctx.response = Some(crate::models::Response {
                            status: 500,
                            headers: HeaderBag::new(),
                            body: b"An internal server error occurred".to_vec(),
                            timestamp: chrono::Utc::now(),
                        });
                    }
                }
            }

            let response = build_http_response(&ctx, adapted.as_ref());
            Ok(ServiceResponse::new(http_req, response).map_into_boxed_body())
        })
    }
}

/// Builds the internal request context from the inbound `HttpRequest`,
/// already-resolved channel binding, and the fully-buffered body.
fn build_context(req: &actix_web::HttpRequest, binding: &ChannelBinding, body: Bytes) -> RequestContext {
    let mut ctx = RequestContext::new(
        binding.transaction_id.clone(),
        binding.channel.name.clone(),
        req.method().as_str(),
        req.path(),
    );
    ctx.querystring = {
        let qs = req.query_string();
        if qs.is_empty() {
            None
        } else {
            Some(qs.to_string())
        }
    };
    for (name, value) in req.headers() {
        if let Ok(v) = value.to_str() {
            ctx.headers.insert(name.as_str(), v);
        }
    }
    ctx.body = body.to_vec();
    ctx
}

/// The `route(ctx, next)` not-allowed branch (spec §4.8): synthesizes a
/// `405` naming the channel's allowed methods, without invoking any
/// transport.
fn synthesize_method_not_allowed(ctx: &mut RequestContext, channel: &Channel) {
    let allowed = channel
        .methods
        .as_ref()
        .map(|m| m.join(", "))
        .unwrap_or_default();
    let body = format!(
        "Request with method {} is not allowed. Only {} methods are allowed",
        ctx.method, allowed
    );
    ctx.response = Some(crate::models::Response {
        status: 405,
        headers: HeaderBag::new(),
        body: body.into_bytes(),
        timestamp: chrono::Utc::now(),
    });
}

/// Translates `ctx.response` into an `actix_web::HttpResponse`, restoring
/// the `Set-Cookie`/`Location`/`Content-Type` pieces the response adapter
/// carried separately from the header bag. A channel with no primary route
/// leaves `ctx.response` unset after a successful dispatch; that is not an
/// error, so it is surfaced as a bare `204`.
fn build_http_response(ctx: &RequestContext, adapted: Option<&AdaptedResponse>) -> HttpResponse {
    let Some(response) = &ctx.response else {
        return HttpResponse::NoContent().finish();
    };
    let status = StatusCode::from_u16(response.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    let mut builder = HttpResponse::build(status);

    for (name, value) in response.headers.iter() {
        for v in value.as_values() {
            builder.append_header((name.as_str(), v));
        }
    }

    if let Some(adapted) = adapted {
        if let Some(content_type) = &adapted.content_type {
            builder.content_type(content_type.as_str());
        }
        if let Some((_, location)) = &adapted.redirect {
            builder.append_header(("Location", location.as_str()));
        }
        for cookie in &adapted.cookies {
            let mut builder_cookie = actix_web::cookie::Cookie::build(cookie.name.clone(), cookie.value.clone());
            if let Some(path) = &cookie.path {
                builder_cookie = builder_cookie.path(path.clone());
            }
            if let Some(domain) = &cookie.domain {
                builder_cookie = builder_cookie.domain(domain.clone());
            }
            if let Some(max_age) = cookie.max_age {
                builder_cookie = builder_cookie.max_age(actix_web::cookie::time::Duration::seconds(max_age));
            }
            if cookie.secure {
                builder_cookie = builder_cookie.secure(true);
            }
            if cookie.http_only.is_some() {
                builder_cookie = builder_cookie.http_only(true);
            }
            builder.cookie(builder_cookie.finish());
        }
    }

    builder.body(response.body.clone())
}
