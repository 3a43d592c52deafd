//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Build the shared state: node pool, prober, forwarder, stats, cache
//! - Create the Axum router with the single proxy handler
//! - Wire up middleware (arrival log, rate limit, body limit, tracing, request ID)
//! - Serve plain HTTP or TLS until the shutdown signal fires

use std::net::SocketAddr;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::Body,
    extract::State,
    http::Request,
    middleware::{self, Next},
    response::Response,
    routing::any,
    Router,
};
use axum_server::tls_rustls::RustlsConfig;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower::ServiceBuilder;
use tower_http::{
    cors::CorsLayer,
    limit::RequestBodyLimitLayer,
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::cache::SelectionCache;
use crate::config::ProxyConfig;
use crate::error::BalancerResult;
use crate::health::{NodeProber, SharedStaleness};
use crate::http::handler::proxy_handler;
use crate::load_balancer::{NodePool, Strategy};
use crate::observability::stats::StatsAggregator;
use crate::resilience::{build_client, Forwarder};
use crate::security::rate_limit::{rate_limit_middleware, RateLimiterState};

/// Grace period for in-flight requests once shutdown starts.
const DRAIN_TIMEOUT: Duration = Duration::from_secs(10);

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ProxyConfig>,
    pub strategy: Strategy,
    pub nodes: Arc<NodePool>,
    pub prober: Arc<NodeProber>,
    pub forwarder: Arc<Forwarder>,
    pub stats: Arc<StatsAggregator>,
    pub cache: Option<Arc<SelectionCache>>,
}

impl AppState {
    /// Wire every component from a validated config.
    pub fn from_config(config: ProxyConfig) -> BalancerResult<Self> {
        let strategy = Strategy::from_str(&config.probe.strategy)?;
        let client = build_client(&config.probe)?;
        let stats = Arc::new(StatsAggregator::new(&config.rate_limit));
        let staleness = Arc::new(SharedStaleness::new());

        let prober = Arc::new(NodeProber::new(
            client.clone(),
            config.probe.clone(),
            staleness,
            stats.clone(),
        ));
        let forwarder = Arc::new(Forwarder::new(
            client,
            &config.probe,
            &config.forward,
            config.observability.logging_max_body_len,
        ));
        let cache = config
            .cache
            .enabled
            .then(|| Arc::new(SelectionCache::new(config.cache.ttl())));

        Ok(Self {
            strategy,
            nodes: Arc::new(NodePool::new(config.nodes.clone())),
            prober,
            forwarder,
            stats,
            cache,
            config: Arc::new(config),
        })
    }
}

/// HTTP server for the balancer.
pub struct HttpServer {
    router: Router,
    state: AppState,
}

impl HttpServer {
    /// Create a new HTTP server with the given configuration.
    pub fn new(config: ProxyConfig) -> BalancerResult<Self> {
        let state = AppState::from_config(config)?;
        tracing::info!(
            nodes = state.nodes.len(),
            strategy = %state.strategy,
            cache = state.cache.is_some(),
            rate_limit = state.config.rate_limit.enabled,
            version = %state.config.version,
            "Balancer initialized"
        );
        let router = Self::build_router(state.clone());
        Ok(Self { router, state })
    }

    /// Build the Axum router with all middleware layers.
    #[allow(deprecated)]
    fn build_router(state: AppState) -> Router {
        let config = state.config.clone();
        let stats = state.stats.clone();
        if let Some(cache) = &state.cache {
            spawn_cache_purge(cache.clone());
        }

        let mut router = Router::new()
            .route("/", any(proxy_handler))
            .route("/{*path}", any(proxy_handler))
            .with_state(state)
            .layer(RequestBodyLimitLayer::new(config.limits.max_payload_size));

        if config.rate_limit.enabled {
            let limiter = Arc::new(RateLimiterState::new(&config.rate_limit));
            spawn_limiter_purge(limiter.clone(), Duration::from_millis(config.rate_limit.window_ms));
            router = router.layer(middleware::from_fn_with_state(limiter, rate_limit_middleware));
        }

        // cors must sit inside the trace layer: its body has no Default
        router = router.layer(CorsLayer::permissive());

        // outermost first
        router.layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
                .layer(PropagateRequestIdLayer::x_request_id())
                .layer(TraceLayer::new_for_http())
                .layer(TimeoutLayer::new(request_deadline(&config)))
                .layer(middleware::from_fn_with_state(stats, track_arrival)),
        )
    }

    /// Shared state, for callers that need the live stats or pool.
    pub fn state(&self) -> &AppState {
        &self.state
    }

    /// Serve plain HTTP on `listener` until `shutdown` fires.
    pub async fn run(
        self,
        listener: TcpListener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        let app = self.router.into_make_service_with_connect_info::<SocketAddr>();
        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!("Shutdown signal received, draining connections");
            })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }

    /// Serve HTTPS on `addr` until `shutdown` fires.
    pub async fn run_tls(
        self,
        addr: SocketAddr,
        tls: RustlsConfig,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        tracing::info!(address = %addr, "HTTPS server starting");

        let handle = axum_server::Handle::new();
        let drain = handle.clone();
        tokio::spawn(async move {
            let _ = shutdown.recv().await;
            tracing::info!("Shutdown signal received, draining connections");
            drain.graceful_shutdown(Some(DRAIN_TIMEOUT));
        });

        axum_server::bind_rustls(addr, tls)
            .handle(handle)
            .serve(self.router.into_make_service_with_connect_info::<SocketAddr>())
            .await?;

        tracing::info!("HTTPS server stopped");
        Ok(())
    }
}

/// Append every arrival to the request log before any other check.
async fn track_arrival(
    State(stats): State<Arc<StatsAggregator>>,
    request: Request<Body>,
    next: Next,
) -> Response {
    stats.record_arrival();
    next.run(request).await
}

fn spawn_limiter_purge(limiter: Arc<RateLimiterState>, every: Duration) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(every.max(Duration::from_secs(1)));
        loop {
            interval.tick().await;
            limiter.purge_expired(std::time::Instant::now());
        }
    });
}

fn spawn_cache_purge(cache: Arc<SelectionCache>) {
    let every = cache.ttl().max(Duration::from_secs(1));
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(every);
        loop {
            interval.tick().await;
            cache.purge_expired(std::time::Instant::now());
        }
    });
}

/// Outer bound on a whole request: every probe wave plus every forward attempt.
pub fn request_deadline(config: &ProxyConfig) -> Duration {
    let timeout = config.probe.timeout();
    let concurrency = config.probe.concurrency.max(1);
    let waves = config.nodes.len().div_ceil(concurrency).max(1) as u32;
    let attempts = config.forward.retry_count.max(1);
    timeout * (waves + attempts) + config.forward.retry_delay() * attempts + Duration::from_secs(1)
}
