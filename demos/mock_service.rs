//! demos/mock_service.rs
//! A stand-in service for trying out bring-up plans locally.
//! Run: cargo run --example mock_service -- <port> [name]
//!
//! `/health` answers `{"status":"STARTING"}` with 503 until WARMUP_SECS have
//! passed, then `{"status":"UP"}` with 200. FAIL_PCT injects 500s.

use hyper::{
    service::{make_service_fn, service_fn},
    Body, Request, Response, Server, StatusCode,
};
use rand::Rng;
use std::{
    convert::Infallible,
    net::SocketAddr,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
    time::{Duration, Instant},
};

#[derive(Clone)]
struct ServiceState {
    name: String,
    started_at: Instant,
    warmup: Duration,
    fail_pct: f64,
    probes: Arc<AtomicU64>,
}

impl ServiceState {
    fn warmed_up(&self) -> bool {
        self.started_at.elapsed() >= self.warmup
    }
}

async fn handle(req: Request<Body>, state: ServiceState) -> Result<Response<Body>, Infallible> {
    let response = match req.uri().path() {
        "/health" => health(&state),
        "/" => json(
            StatusCode::OK,
            format!(r#"{{"service":"{}"}}"#, state.name),
        ),
        _ => json(StatusCode::NOT_FOUND, r#"{"error":"not found"}"#.to_string()),
    };
    Ok(response)
}

fn health(state: &ServiceState) -> Response<Body> {
    let n = state.probes.fetch_add(1, Ordering::SeqCst) + 1;

    if state.fail_pct > 0.0 && rand::thread_rng().gen_bool(state.fail_pct / 100.0) {
        println!("[{}] probe #{n}: injected failure", state.name);
        return json(
            StatusCode::INTERNAL_SERVER_ERROR,
            r#"{"status":"ERROR"}"#.to_string(),
        );
    }

    if state.warmed_up() {
        println!("[{}] probe #{n}: UP", state.name);
        json(StatusCode::OK, r#"{"status":"UP"}"#.to_string())
    } else {
        println!("[{}] probe #{n}: STARTING", state.name);
        json(
            StatusCode::SERVICE_UNAVAILABLE,
            r#"{"status":"STARTING"}"#.to_string(),
        )
    }
}

fn json(status: StatusCode, body: String) -> Response<Body> {
    let mut response = Response::new(Body::from(body));
    *response.status_mut() = status;
    response.headers_mut().insert(
        hyper::header::CONTENT_TYPE,
        hyper::header::HeaderValue::from_static("application/json"),
    );
    response
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let port: u16 = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "9000".into())
        .parse()?;
    let name = std::env::args()
        .nth(2)
        .unwrap_or_else(|| format!("service-{port}"));

    let warmup_secs: u64 = std::env::var("WARMUP_SECS")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(5);
    let fail_pct: f64 = std::env::var("FAIL_PCT")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(0.0);

    let state = ServiceState {
        name: name.clone(),
        started_at: Instant::now(),
        warmup: Duration::from_secs(warmup_secs),
        fail_pct,
        probes: Arc::new(AtomicU64::new(0)),
    };

    let addr = SocketAddr::from(([127, 0, 0, 1], port));
    let make_svc = make_service_fn(move |_conn| {
        let st = state.clone();
        async move { Ok::<_, Infallible>(service_fn(move |req| handle(req, st.clone()))) }
    });

    println!("Mock service '{name}' on http://{addr}  [warmup={warmup_secs}s fail={fail_pct}%]");

    Server::bind(&addr).serve(make_svc).await?;
    Ok(())
}
