//! HTTP server implementation
//!
//! Uses hyper http1 with TokioIo for async handling. Every request except
//! health and CORS preflight passes the rate limiter before any session or
//! profile work happens.

use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{HeaderMap, Method, Request, Response};
use hyper_util::rt::TokioIo;
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::time::Instant;
use tokio::net::TcpListener;
use tracing::{debug, error, info, warn};

use crate::auth::{get_required_gate, EntitlementEvaluator, SessionResolver, SessionVerifier};
use crate::config::Args;
use crate::db::ProfileStore;
use crate::logging::AccessEvent;
use crate::ratelimit::{spawn_sweep_task, RateLimitPolicy, RateLimiter};
use crate::routes;
use crate::server::response::{error_response, not_found_response, preflight_response, FullBody};
use crate::types::{GateError, Result};

type BoxBody = http_body_util::combinators::BoxBody<Bytes, hyper::Error>;

/// Shared application state
pub struct AppState {
    pub args: Args,
    pub sessions: SessionResolver,
    pub entitlements: EntitlementEvaluator,
    pub store: Arc<dyn ProfileStore>,
    pub limiter: Arc<RateLimiter>,
    /// Policy for read routes
    pub read_policy: RateLimitPolicy,
    /// Policy for mutating routes
    pub write_policy: RateLimitPolicy,
    pub started_at: Instant,
}

impl AppState {
    /// Wire the gate components together
    pub fn new(
        args: Args,
        verifier: Arc<dyn SessionVerifier>,
        store: Arc<dyn ProfileStore>,
        limiter: Arc<RateLimiter>,
    ) -> Result<Self> {
        let read_policy = args.read_policy()?;
        let write_policy = args.write_policy()?;
        Ok(Self {
            sessions: SessionResolver::new(verifier),
            entitlements: EntitlementEvaluator::new(Arc::clone(&store)),
            store,
            limiter,
            read_policy,
            write_policy,
            started_at: Instant::now(),
            args,
        })
    }
}

/// Run the HTTP server
pub async fn run(state: Arc<AppState>) -> Result<()> {
    let listener = TcpListener::bind(state.args.listen).await?;

    info!(
        "iPurpose gate listening on {} as node {}",
        state.args.listen, state.args.node_id
    );

    if state.args.dev_mode {
        warn!("Development mode enabled - insecure session secret in use");
    }

    spawn_sweep_task(Arc::clone(&state.limiter), state.args.sweep_interval());

    loop {
        match listener.accept().await {
            Ok((stream, addr)) => {
                let state = Arc::clone(&state);
                tokio::spawn(async move {
                    let io = TokioIo::new(stream);

                    let service = service_fn(move |req| {
                        let state = Arc::clone(&state);
                        async move { handle_request(state, addr, req).await }
                    });

                    if let Err(err) = http1::Builder::new()
                        .serve_connection(io, service)
                        .await
                    {
                        error!("Error serving connection from {}: {:?}", addr, err);
                    }
                });
            }
            Err(e) => {
                error!("Error accepting connection: {:?}", e);
            }
        }
    }
}

async fn handle_request(
    state: Arc<AppState>,
    addr: SocketAddr,
    req: Request<Incoming>,
) -> std::result::Result<Response<BoxBody>, hyper::Error> {
    let (parts, _body) = req.into_parts();
    debug!("[{}] {} {}", addr, parts.method, parts.uri.path());

    let response = dispatch(
        &state,
        addr.ip(),
        &parts.method,
        parts.uri.path(),
        &parts.headers,
    )
    .await;
    Ok(to_boxed(response))
}

/// Route a request. Separated from the connection handling so it can be
/// driven directly with request parts.
pub async fn dispatch(
    state: &AppState,
    client: IpAddr,
    method: &Method,
    path: &str,
    headers: &HeaderMap,
) -> Response<FullBody> {
    match (method, path) {
        (&Method::OPTIONS, _) => return preflight_response(),
        (&Method::GET, "/health") | (&Method::GET, "/healthz") => {
            return routes::health_check(state)
        }
        _ => {}
    }

    let mut event = AccessEvent::new(method.as_str(), path).with_client(client);

    let outcome = match check_rate_limit(state, client, method) {
        Ok(()) => {
            match tokio::time::timeout(
                state.args.request_timeout(),
                route(state, method, path, headers, &mut event),
            )
            .await
            {
                Ok(result) => result,
                Err(_) => Err(GateError::UpstreamUnavailable(format!(
                    "Request timed out after {:?}",
                    state.args.request_timeout()
                ))),
            }
        }
        Err(e) => Err(e),
    };

    match outcome {
        Ok(response) => {
            event.emit();
            response
        }
        Err(GateError::NotFound(_)) => not_found_response(path),
        Err(err) => {
            event = event.with_error(&err);
            event.emit();
            error_response(&err)
        }
    }
}

/// Per-client fixed-window check; writes use the stricter policy
fn check_rate_limit(state: &AppState, client: IpAddr, method: &Method) -> Result<()> {
    let (bucket, policy) = if *method == Method::GET || *method == Method::HEAD {
        ("read", &state.read_policy)
    } else {
        ("write", &state.write_policy)
    };
    let key = format!("{}:{}", bucket, client);
    state.limiter.check(&key, policy).into_result()
}

async fn route(
    state: &AppState,
    method: &Method,
    path: &str,
    headers: &HeaderMap,
    event: &mut AccessEvent,
) -> Result<Response<FullBody>> {
    match (method, path) {
        (&Method::GET, "/api/user") => routes::handle_get_user(state, headers, event).await,

        (&Method::POST, "/api/onboarding/accept") => {
            routes::handle_accept_terms(state, headers, event).await
        }

        (&Method::GET, p) => match get_required_gate(p) {
            Some(gate) => routes::handle_feature(state, headers, p, gate, event).await,
            None => Err(GateError::NotFound(p.to_string())),
        },

        _ => Err(GateError::NotFound(path.to_string())),
    }
}

/// Convert a Full<Bytes> body to BoxBody
fn to_boxed(response: Response<Full<Bytes>>) -> Response<BoxBody> {
    response.map(|body| body.map_err(|never| match never {}).boxed())
}
