//! Mock Heroku and blitz.io APIs served by axum on an ephemeral port
#![allow(dead_code)]

use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::Json;
use axum::routing::{get, patch, put};
use axum::Router;
use parking_lot::Mutex;
use serde_json::{Value, json};
use std::collections::HashMap;
use std::sync::Arc;

pub const APP: &str = "demo";
pub const HEROKU_KEY: &str = "heroku-key";
pub const BLITZ_USER: &str = "me@example.com";
pub const BLITZ_KEY: &str = "blitz-key";
pub const SESSION_KEY: &str = "session-key";

/// Serve `router` on 127.0.0.1 and return its base URL
pub async fn serve(router: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    format!("http://{addr}")
}

type ApiResult = Result<Json<Value>, (StatusCode, Json<Value>)>;

fn reject(status: StatusCode, id: &str, message: &str) -> (StatusCode, Json<Value>) {
    (status, Json(json!({ "id": id, "message": message })))
}

fn header<'a>(headers: &'a HeaderMap, name: &str) -> &'a str {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
}

/// Heroku formation and dyno listing for a single app.
///
/// After every scale, the first `polls_until_up` listings report the new
/// dynos as `starting`.
#[derive(Default)]
pub struct HerokuMock {
    pub polls_until_up: u32,
    pub scales: Mutex<Vec<u32>>,
    pub listings: Mutex<u32>,
    polls_since_scale: Mutex<u32>,
}

impl HerokuMock {
    pub fn new(polls_until_up: u32) -> Arc<Self> {
        Arc::new(HerokuMock {
            polls_until_up,
            ..Default::default()
        })
    }

    pub fn current(&self) -> u32 {
        self.scales.lock().last().copied().unwrap_or(1)
    }

    pub fn router(self: &Arc<Self>) -> Router {
        Router::new()
            .route("/apps/{app}/formation/{process}", patch(heroku_scale))
            .route("/apps/{app}/dynos", get(heroku_dynos))
            .with_state(self.clone())
    }
}

fn heroku_auth(headers: &HeaderMap, app: &str) -> Result<(), (StatusCode, Json<Value>)> {
    if header(headers, "authorization") != format!("Bearer {HEROKU_KEY}") {
        return Err(reject(StatusCode::UNAUTHORIZED, "unauthorized", "Invalid credentials provided."));
    }
    if !header(headers, "accept").contains("version=3") {
        return Err(reject(StatusCode::BAD_REQUEST, "bad_request", "Missing API version."));
    }
    if app != APP {
        return Err(reject(StatusCode::NOT_FOUND, "not_found", "Couldn't find that app."));
    }
    Ok(())
}

async fn heroku_scale(
    State(mock): State<Arc<HerokuMock>>,
    Path((app, process)): Path<(String, String)>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> ApiResult {
    heroku_auth(&headers, &app)?;
    if process != "web" {
        return Err(reject(StatusCode::NOT_FOUND, "not_found", "Couldn't find that formation."));
    }
    let quantity = body["quantity"].as_u64().ok_or_else(|| {
        reject(StatusCode::UNPROCESSABLE_ENTITY, "invalid_params", "quantity is required")
    })? as u32;

    mock.scales.lock().push(quantity);
    *mock.polls_since_scale.lock() = 0;

    Ok(Json(json!({ "type": process, "quantity": quantity, "size": "standard-1X" })))
}

async fn heroku_dynos(
    State(mock): State<Arc<HerokuMock>>,
    Path(app): Path<String>,
    headers: HeaderMap,
) -> ApiResult {
    heroku_auth(&headers, &app)?;

    let poll = {
        let mut polls = mock.polls_since_scale.lock();
        *polls += 1;
        *polls
    };
    *mock.listings.lock() += 1;
    let state = if poll > mock.polls_until_up { "up" } else { "starting" };

    let dynos: Vec<Value> = (1..=mock.current())
        .map(|n| {
            json!({
                "id": format!("0000-{n}"),
                "name": format!("web.{n}"),
                "state": state,
                "type": "web",
                "size": "standard-1X"
            })
        })
        .collect();

    Ok(Json(Value::Array(dynos)))
}

struct Job {
    healthy: bool,
    target: u64,
    polls: u32,
}

type Health = dyn Fn() -> bool + Send + Sync;

/// blitz.io login, execute, status and abort.
///
/// Each job is queued on its first status poll, running with one timeline
/// point on the second, and completed with two points afterwards. Healthy
/// jobs finish at 1% errors, unhealthy ones sit at 50%.
pub struct BlitzMock {
    health: Box<Health>,
    fail_reason: Option<String>,
    pub logins: Mutex<u32>,
    pub requests: Mutex<Vec<Value>>,
    pub aborts: Mutex<Vec<String>>,
    jobs: Mutex<HashMap<String, Job>>,
}

impl BlitzMock {
    fn build(
        health: impl Fn() -> bool + Send + Sync + 'static,
        fail_reason: Option<String>,
    ) -> Arc<Self> {
        Arc::new(BlitzMock {
            health: Box::new(health),
            fail_reason,
            logins: Mutex::new(0),
            requests: Mutex::new(Vec::new()),
            aborts: Mutex::new(Vec::new()),
            jobs: Mutex::new(HashMap::new()),
        })
    }

    fn with_health(health: impl Fn() -> bool + Send + Sync + 'static) -> Arc<Self> {
        Self::build(health, None)
    }

    pub fn healthy() -> Arc<Self> {
        Self::with_health(|| true)
    }

    pub fn unhealthy() -> Arc<Self> {
        Self::with_health(|| false)
    }

    /// Healthy once `heroku` runs at least `capacity` dynos
    pub fn backed_by(heroku: Arc<HerokuMock>, capacity: u32) -> Arc<Self> {
        Self::with_health(move || heroku.current() >= capacity)
    }

    pub fn failing(reason: &str) -> Arc<Self> {
        Self::build(|| true, Some(reason.to_string()))
    }

    pub fn router(self: &Arc<Self>) -> Router {
        Router::new()
            .route("/login/api", get(blitz_login))
            .route("/api/1/curl/execute", axum::routing::post(blitz_execute))
            .route("/api/1/jobs/{id}/status", get(blitz_status))
            .route("/api/1/jobs/{id}/abort", put(blitz_abort))
            .with_state(self.clone())
    }
}

fn blitz_session(headers: &HeaderMap) -> Result<(), (StatusCode, Json<Value>)> {
    if header(headers, "x-api-user") != BLITZ_USER || header(headers, "x-api-key") != SESSION_KEY {
        return Err((
            StatusCode::UNAUTHORIZED,
            Json(json!({ "error": "login", "reason": "bad session" })),
        ));
    }
    Ok(())
}

async fn blitz_login(State(mock): State<Arc<BlitzMock>>, headers: HeaderMap) -> Json<Value> {
    *mock.logins.lock() += 1;
    if header(&headers, "x-api-user") != BLITZ_USER || header(&headers, "x-api-key") != BLITZ_KEY {
        return Json(json!({ "error": "login", "reason": "invalid credentials" }));
    }
    Json(json!({ "ok": true, "api_key": SESSION_KEY }))
}

async fn blitz_execute(
    State(mock): State<Arc<BlitzMock>>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> ApiResult {
    blitz_session(&headers)?;

    let target = body["pattern"]["intervals"][0]["end"].as_u64().unwrap_or(0);
    mock.requests.lock().push(body.clone());

    let mut jobs = mock.jobs.lock();
    let job_id = format!("job-{}", jobs.len() + 1);
    jobs.insert(
        job_id.clone(),
        Job {
            healthy: (mock.health)(),
            target,
            polls: 0,
        },
    );

    Ok(Json(json!({
        "ok": true,
        "job_id": job_id,
        "region": body["region"],
        "status": "queued"
    })))
}

fn timeline_point(healthy: bool, total: u64, volume: u64) -> Value {
    let hits = if healthy { total - total / 100 } else { total / 2 };
    json!({
        "timestamp": volume as f64 / 10.0,
        "duration": 0.08,
        "total": total,
        "executed": hits,
        "errors": total - hits,
        "timeouts": 0,
        "volume": volume,
        "txbytes": total * 100,
        "rxbytes": total * 1000
    })
}

async fn blitz_status(
    State(mock): State<Arc<BlitzMock>>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> ApiResult {
    blitz_session(&headers)?;

    let mut jobs = mock.jobs.lock();
    let job = jobs
        .get_mut(&id)
        .ok_or_else(|| reject(StatusCode::NOT_FOUND, "not_found", "no such job"))?;
    job.polls += 1;

    let body = match job.polls {
        1 => json!({ "_id": id, "status": "queued" }),
        2 => {
            if let Some(reason) = &mock.fail_reason {
                json!({ "_id": id, "error": "rush", "reason": reason })
            } else {
                json!({
                    "_id": id,
                    "status": "running",
                    "result": {
                        "region": "virginia",
                        "timeline": [timeline_point(job.healthy, 100, job.target / 2)]
                    }
                })
            }
        }
        _ => json!({
            "_id": id,
            "status": "completed",
            "result": {
                "region": "virginia",
                "timeline": [
                    timeline_point(job.healthy, 100, job.target / 2),
                    timeline_point(job.healthy, 200, job.target)
                ]
            }
        }),
    };

    Ok(Json(body))
}

async fn blitz_abort(
    State(mock): State<Arc<BlitzMock>>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> ApiResult {
    blitz_session(&headers)?;
    mock.aborts.lock().push(id);
    Ok(Json(json!({ "ok": true })))
}
