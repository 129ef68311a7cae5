use axum::{
    Form, Json, Router,
    extract::{DefaultBodyLimit, Multipart, State, multipart::MultipartError},
    http::{StatusCode, header},
    response::{Html, IntoResponse, Redirect, Response},
    routing::{get, post},
};
use handlebars::{Handlebars, RenderError, TemplateError};
use log::{error, info, warn};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use thiserror::Error;
use tokio::net::TcpListener;
use tokio::task::JoinError;
use tower_http::limit::RequestBodyLimitLayer;

use crate::chart::{self, ChartOptions};
use crate::config::AppConfig;
use crate::error::TrackerError;
use crate::record::{COLUMNS, Record, RecordSet};
use crate::store::{self, RecordStore};

const INDEX_TEMPLATE: &str = include_str!("./static/index.hbs");

pub struct AppState {
    store: Mutex<RecordStore>,
    chart: ChartOptions,
    templates: Handlebars<'static>,
}

impl AppState {
    pub fn new(store: RecordStore, chart: ChartOptions) -> Result<Self, TemplateError> {
        let mut templates = Handlebars::new();
        templates.register_template_string("index", INDEX_TEMPLATE)?;

        Ok(AppState {
            store: Mutex::new(store),
            chart,
            templates,
        })
    }

    // The store keeps nothing in memory, so a poisoned lock is still usable.
    fn store(&self) -> MutexGuard<'_, RecordStore> {
        self.store.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn load(&self) -> Result<RecordSet, TrackerError> {
        self.store().load()
    }
}

#[derive(Deserialize)]
struct EntryForm {
    date: String,
    task: String,
    duration: String,
}

#[derive(Serialize)]
struct StatusResponse {
    status: String,
    message: Option<String>,
}

/// Failures surfaced by the request handlers.
#[derive(Error, Debug)]
pub enum AppError {
    #[error(transparent)]
    Tracker(#[from] TrackerError),

    #[error("Template rendering failed: {0}")]
    Template(#[from] RenderError),

    #[error("Bad upload: {0}")]
    Upload(#[from] MultipartError),

    #[error("Background task failed: {0}")]
    Blocking(#[from] JoinError),

    #[error("{0}")]
    BadRequest(String),
}

impl AppError {
    fn status(&self) -> StatusCode {
        match self {
            AppError::Tracker(e) if e.is_client_error() => StatusCode::BAD_REQUEST,
            AppError::Upload(e) => e.status(),
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Tracker(_) | AppError::Template(_) | AppError::Blocking(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!("Request failed: {}", self);
        } else {
            warn!("Rejected request: {}", self);
        }

        let body = StatusResponse {
            status: "error".to_string(),
            message: Some(self.to_string()),
        };
        (status, Json(body)).into_response()
    }
}

/// Builds the router serving the tracker page and its endpoints.
pub fn router(state: Arc<AppState>, max_body_bytes: usize) -> Router {
    Router::new()
        .route("/", get(serve_index))
        .route("/add", post(add_entry))
        .route("/upload", post(upload_csv))
        .route("/api/records", get(get_records))
        .route("/chart.png", get(get_chart))
        .route("/download", get(download_csv))
        .layer(DefaultBodyLimit::disable())
        .layer(RequestBodyLimitLayer::new(max_body_bytes))
        .with_state(state)
}

pub async fn run(config: AppConfig) -> Result<(), Box<dyn std::error::Error>> {
    let store = RecordStore::new(&config.data_file);
    info!("Using records file {}", store.path().display());

    let app_state = Arc::new(AppState::new(store, config.chart_options())?);
    let app = router(app_state, config.max_upload_bytes);

    let listener = TcpListener::bind(config.bind).await?;
    info!("Listening on http://{}", listener.local_addr()?);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {}", e);
    }
}

/// Runs store I/O and chart drawing on the blocking pool so a slow render does
/// not hold up the async workers.
async fn with_store<T, F>(state: &Arc<AppState>, work: F) -> Result<T, AppError>
where
    F: FnOnce(&AppState) -> Result<T, TrackerError> + Send + 'static,
    T: Send + 'static,
{
    let state = Arc::clone(state);
    let result = tokio::task::spawn_blocking(move || work(&state)).await?;
    Ok(result?)
}

async fn serve_index(State(state): State<Arc<AppState>>) -> Result<Html<String>, AppError> {
    let (records, chart) = with_store(&state, |state: &AppState| {
        let records = state.load()?;
        let chart = chart::render_data_uri(&records, &state.chart)?;
        Ok((records, chart))
    })
    .await?;

    let page = state.templates.render(
        "index",
        &serde_json::json!({
            "columns": COLUMNS,
            "records": records,
            "has_records": !records.is_empty(),
            "chart": chart,
        }),
    )?;

    Ok(Html(page))
}

async fn add_entry(
    State(state): State<Arc<AppState>>,
    Form(form): Form<EntryForm>,
) -> Result<Redirect, AppError> {
    let record = Record::from_entry(&form.date, &form.task, &form.duration)?;
    with_store(&state, move |state: &AppState| state.store().append(record)).await?;

    Ok(Redirect::to("/"))
}

async fn upload_csv(
    State(state): State<Arc<AppState>>,
    mut multipart: Multipart,
) -> Result<Redirect, AppError> {
    let mut file_data = Vec::new();

    while let Some(field) = multipart.next_field().await? {
        if field.name() == Some("file") {
            file_data = field.bytes().await?.to_vec();
        }
    }

    if file_data.is_empty() {
        return Err(AppError::BadRequest("No file data received".to_string()));
    }

    let records = store::parse_csv(file_data.as_slice())
        .map_err(|e| AppError::BadRequest(format!("Uploaded file is not a records CSV: {}", e)))?;
    with_store(&state, move |state: &AppState| state.store().replace(&records)).await?;

    Ok(Redirect::to("/"))
}

async fn get_records(State(state): State<Arc<AppState>>) -> Result<Json<RecordSet>, AppError> {
    let records = with_store(&state, |state: &AppState| state.load()).await?;
    Ok(Json(records))
}

async fn get_chart(State(state): State<Arc<AppState>>) -> Result<impl IntoResponse, AppError> {
    let png = with_store(&state, |state: &AppState| {
        let records = state.load()?;
        chart::render(&records, &state.chart)
    })
    .await?;

    Ok(([(header::CONTENT_TYPE, "image/png")], png))
}

async fn download_csv(State(state): State<Arc<AppState>>) -> Result<impl IntoResponse, AppError> {
    let csv = with_store(&state, |state: &AppState| {
        let records = state.load()?;
        store::to_csv_bytes(&records)
    })
    .await?;

    Ok((
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8"),
            (header::CONTENT_DISPOSITION, "attachment; filename=\"data.csv\""),
        ],
        csv,
    ))
}
