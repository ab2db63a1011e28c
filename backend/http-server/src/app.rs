use std::{net, sync::Arc};

use axum::http;
use common_utils::consts;
use domain_types::contestant::Contestant;
use storage::{ContestantStore, InMemoryStore, PaymentStore};
use tokio::{
    signal::unix::{signal, SignalKind},
    sync::oneshot,
};
use tower_http::{request_id::MakeRequestUuid, trace as tower_trace};

use crate::{configs, error::ConfigurationError, logger, metrics, server, utils};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<configs::Config>,
    pub payments: Arc<dyn PaymentStore>,
    pub contestants: Arc<dyn ContestantStore>,
}

impl AppState {
    /// Build the state from configuration, seeding the contestant roster.
    pub async fn from_config(config: Arc<configs::Config>) -> Self {
        let store = InMemoryStore::new();
        let seeds: Vec<_> = config
            .voting
            .contestants
            .iter()
            .map(|seed| Contestant {
                id: seed.id.clone(),
                name: seed.name.clone(),
                vote_total: 0,
            })
            .collect();
        store.seed_contestants(seeds).await;
        Self::with_store(config, store)
    }

    pub fn with_store(config: Arc<configs::Config>, store: InMemoryStore) -> Self {
        Self {
            config,
            payments: Arc::new(store.clone()),
            contestants: Arc::new(store),
        }
    }
}

pub fn router(state: AppState) -> axum::Router {
    let logging_layer = tower_trace::TraceLayer::new_for_http()
        .make_span_with(|request: &http::Request<_>| utils::record_fields_from_header(request))
        .on_request(tower_trace::DefaultOnRequest::new().level(tracing::Level::INFO))
        .on_response(
            tower_trace::DefaultOnResponse::new()
                .level(tracing::Level::INFO)
                .latency_unit(tower_http::LatencyUnit::Micros),
        )
        .on_failure(
            tower_trace::DefaultOnFailure::new()
                .latency_unit(tower_http::LatencyUnit::Micros)
                .level(tracing::Level::ERROR),
        );

    let request_id_layer = tower_http::request_id::SetRequestIdLayer::new(
        http::HeaderName::from_static(consts::X_REQUEST_ID),
        MakeRequestUuid,
    );

    let propagate_request_id_layer = tower_http::request_id::PropagateRequestIdLayer::new(
        http::HeaderName::from_static(consts::X_REQUEST_ID),
    );

    axum::Router::new()
        .route(
            "/health",
            axum::routing::get(server::health_check::health),
        )
        .route(
            "/api/payments",
            axum::routing::post(server::payments::create_payment)
                .get(server::payments::list_payments),
        )
        .route(
            "/api/payments/stats",
            axum::routing::get(server::payments::payment_stats),
        )
        .route(
            "/api/payments/return",
            axum::routing::get(server::payments::payment_return_query)
                .post(server::payments::payment_return_form),
        )
        .route(
            "/api/payments/status/{prn}",
            axum::routing::get(server::payments::payment_by_reference),
        )
        .route(
            "/api/payments/id/{id}",
            axum::routing::get(server::payments::payment_by_id),
        )
        .with_state(state)
        .layer(logging_layer)
        .layer(request_id_layer)
        .layer(propagate_request_id_layer)
}

/// # Panics
///
/// Will panic if signal handler installation fails
pub async fn server_builder(config: configs::Config) -> Result<(), ConfigurationError> {
    let server_config = config.server.clone();
    let socket_addr = net::SocketAddr::new(server_config.host.parse()?, server_config.port);

    // Signal handler
    let (tx, rx) = oneshot::channel();

    #[allow(clippy::expect_used)]
    tokio::spawn(async move {
        let mut sig_int =
            signal(SignalKind::interrupt()).expect("Failed to initialize SIGINT signal handler");
        let mut sig_term =
            signal(SignalKind::terminate()).expect("Failed to initialize SIGTERM signal handler");
        let mut sig_quit =
            signal(SignalKind::quit()).expect("Failed to initialize QUIT signal handler");
        let mut sig_hup =
            signal(SignalKind::hangup()).expect("Failed to initialize SIGHUP signal handler");

        tokio::select! {
            _ = sig_int.recv() => {
                logger::info!("Received SIGINT");
                tx.send(()).expect("Failed to send SIGINT signal");
            }
            _ = sig_term.recv() => {
                logger::info!("Received SIGTERM");
                tx.send(()).expect("Failed to send SIGTERM signal");
            }
            _ = sig_quit.recv() => {
                logger::info!("Received QUIT");
                tx.send(()).expect("Failed to send QUIT signal");
            }
            _ = sig_hup.recv() => {
                logger::info!("Received SIGHUP");
                tx.send(()).expect("Failed to send SIGHUP signal");
            }
        }
    });

    #[allow(clippy::expect_used)]
    let shutdown_signal = async {
        rx.await.expect("Failed to receive shutdown signal");
        logger::info!("Shutdown signal received");
    };

    let state = AppState::from_config(Arc::new(config)).await;

    logger::info!(
        host = %server_config.host,
        port = %server_config.port,
        sandbox = state.config.gateway.sandbox,
        "starting vote payment service"
    );

    let listener = tokio::net::TcpListener::bind(socket_addr).await?;

    axum::serve(listener, router(state).into_make_service())
        .with_graceful_shutdown(shutdown_signal)
        .await?;

    Ok(())
}

pub async fn metrics_server_builder(config: configs::Config) -> Result<(), ConfigurationError> {
    let listener = config.metrics.tcp_listener().await?;

    let router = axum::Router::new().route(
        "/metrics",
        axum::routing::get(|| async {
            let output = metrics::metrics_handler().await;
            match output {
                Ok(metrics) => Ok(metrics),
                Err(error) => {
                    tracing::error!(?error, "Error fetching metrics");

                    Err((
                        http::StatusCode::INTERNAL_SERVER_ERROR,
                        "Error fetching metrics".to_string(),
                    ))
                }
            }
        }),
    );

    axum::serve(listener, router.into_make_service())
        .with_graceful_shutdown(async {
            let output = tokio::signal::ctrl_c().await;
            tracing::error!(?output, "shutting down");
        })
        .await?;

    Ok(())
}
