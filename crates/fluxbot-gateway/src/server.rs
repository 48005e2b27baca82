// SPDX-FileCopyrightText: 2026 FluxBot Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Gateway HTTP server built on axum.
//!
//! Sets up routes, middleware, and shared state for the API.

use std::sync::Arc;

use axum::http::{HeaderValue, Method, header};
use axum::routing::{get, post};
use axum::{Router, middleware as axum_middleware};
use fluxbot_config::model::{SubscriptionConfig, WhatsAppCloudConfig};
use fluxbot_core::{CloudMessenger, FluxbotError, StorageAdapter};
use fluxbot_session::DeviceSessionManager;
use tokio_util::sync::CancellationToken;
use tower::ServiceBuilder;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::auth::auth_middleware;
use crate::handlers;
use crate::password::Passwords;
use crate::token::TokenSigner;

/// Settings handlers read per request.
#[derive(Debug, Clone, Default)]
pub struct GatewaySettings {
    pub subscription: SubscriptionConfig,
    pub whatsapp_cloud: WhatsAppCloudConfig,
}

/// Shared state for axum request handlers.
#[derive(Clone)]
pub struct AppState {
    pub storage: Arc<dyn StorageAdapter>,
    pub sessions: Arc<DeviceSessionManager>,
    pub cloud: Arc<dyn CloudMessenger>,
    pub tokens: Arc<TokenSigner>,
    pub passwords: Passwords,
    pub settings: Arc<GatewaySettings>,
}

fn cors_layer(origin: Option<&str>) -> Result<CorsLayer, FluxbotError> {
    let allow_origin = match origin {
        Some(origin) => AllowOrigin::exact(
            HeaderValue::from_str(origin)
                .map_err(|e| FluxbotError::Config(format!("invalid CORS origin {origin:?}: {e}")))?,
        ),
        None => AllowOrigin::from(Any),
    };
    Ok(CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION]))
}

/// Build the full application router.
///
/// Public: `/health`, `/auth/*`, `/whatsapp-cloud/webhook`.
/// Authenticated: everything else.
pub fn build_router(state: AppState, cors_origin: Option<&str>) -> Result<Router, FluxbotError> {
    let public_routes = Router::new()
        .route("/health", get(handlers::misc::health))
        .route("/auth/register", post(handlers::auth::register))
        .route("/auth/login", post(handlers::auth::login))
        .route(
            "/whatsapp-cloud/webhook",
            get(handlers::cloud::verify_webhook).post(handlers::cloud::receive_webhook),
        )
        .with_state(state.clone());

    let api_routes = Router::new()
        .route("/dashboard/overview", get(handlers::misc::dashboard_overview))
        .route("/subscription/me", get(handlers::misc::subscription_me))
        .route(
            "/devices",
            get(handlers::devices::list).post(handlers::devices::create),
        )
        .route(
            "/devices/{id}",
            get(handlers::devices::get_one)
                .put(handlers::devices::update)
                .delete(handlers::devices::remove),
        )
        .route("/devices/{id}/connect", post(handlers::devices::connect))
        .route(
            "/devices/{id}/disconnect",
            post(handlers::devices::disconnect),
        )
        .route("/devices/{id}/send", post(handlers::devices::send))
        .route("/devices/{id}/messages", get(handlers::devices::messages))
        .route("/whatsapp-cloud/send", post(handlers::cloud::send))
        .route_layer(axum_middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ))
        .with_state(state);

    Ok(Router::new()
        .merge(public_routes)
        .merge(api_routes)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors_layer(cors_origin)?),
        ))
}

/// Serve `app` on `host:port` until `shutdown` is cancelled.
pub async fn start_server(
    host: &str,
    port: u16,
    app: Router,
    shutdown: CancellationToken,
) -> Result<(), FluxbotError> {
    let addr = format!("{host}:{port}");
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| FluxbotError::Channel {
            message: format!("failed to bind gateway to {addr}: {e}"),
            source: Some(Box::new(e)),
        })?;

    info!("API listening on {addr}");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown.cancelled_owned())
        .await
        .map_err(|e| FluxbotError::Channel {
            message: format!("gateway server error: {e}"),
            source: Some(Box::new(e)),
        })?;

    info!("API server stopped");
    Ok(())
}
