use axum::{
	Json, Router,
	extract::State,
	http::StatusCode,
	response::{IntoResponse, Response},
	routing::{get, post},
};
use serde::Serialize;

use crate::state::AppState;
use sq_service::{
	CatalogStatus, Error, HealthReport, HybridSearchRequest, HybridSearchResponse, ProcessRequest,
	ProcessResponse, SyncReport,
};

pub fn router(state: AppState) -> Router {
	Router::new()
		.route("/health", get(health))
		.route("/v1/requests/process", post(process_request))
		.route("/v1/search/hybrid", post(hybrid_search))
		.route("/v1/catalog/sync", post(sync_catalog))
		.route("/v1/catalog/status", get(catalog_status))
		.with_state(state)
}

async fn health(State(state): State<AppState>) -> (StatusCode, Json<HealthReport>) {
	let report = state.service.health().await;
	let status =
		if report.status == "ok" { StatusCode::OK } else { StatusCode::SERVICE_UNAVAILABLE };

	(status, Json(report))
}

async fn process_request(
	State(state): State<AppState>,
	Json(payload): Json<ProcessRequest>,
) -> Result<Json<ProcessResponse>, ApiError> {
	let response = state.service.process_request(payload).await?;

	Ok(Json(response))
}

async fn hybrid_search(
	State(state): State<AppState>,
	Json(payload): Json<HybridSearchRequest>,
) -> Result<Json<HybridSearchResponse>, ApiError> {
	let response = state.service.hybrid_search(payload).await?;

	Ok(Json(response))
}

async fn sync_catalog(State(state): State<AppState>) -> Result<Json<SyncReport>, ApiError> {
	let report = state.service.sync_catalog().await?;

	Ok(Json(report))
}

async fn catalog_status(State(state): State<AppState>) -> Result<Json<CatalogStatus>, ApiError> {
	let status = state.service.catalog_status().await?;

	Ok(Json(status))
}

#[derive(Debug, Serialize)]
struct ErrorBody {
	error_code: String,
	message: String,
	fields: Option<Vec<String>>,
}

#[derive(Debug)]
pub struct ApiError {
	status: StatusCode,
	error_code: String,
	message: String,
	fields: Option<Vec<String>>,
}
impl ApiError {
	pub fn new(
		status: StatusCode,
		error_code: impl Into<String>,
		message: impl Into<String>,
		fields: Option<Vec<String>>,
	) -> Self {
		Self { status, error_code: error_code.into(), message: message.into(), fields }
	}
}

impl From<Error> for ApiError {
	fn from(err: Error) -> Self {
		match err {
			Error::InvalidRequest { message } => {
				let fields = invalid_field(&message).map(|field| vec![field]);

				ApiError::new(StatusCode::BAD_REQUEST, "INVALID_REQUEST", message, fields)
			},
			Error::NotFound { message } =>
				ApiError::new(StatusCode::NOT_FOUND, "NOT_FOUND", message, None),
			Error::Provider { message } =>
				ApiError::new(StatusCode::BAD_GATEWAY, "PROVIDER_ERROR", message, None),
			Error::Unavailable { message } =>
				ApiError::new(StatusCode::SERVICE_UNAVAILABLE, "UNAVAILABLE", message, None),
			Error::Storage { message } => {
				tracing::error!(error = %message, "Storage failure while serving a request.");

				ApiError::new(
					StatusCode::INTERNAL_SERVER_ERROR,
					"STORAGE_ERROR",
					"Storage request failed.",
					None,
				)
			},
			Error::Qdrant { message } => {
				tracing::error!(error = %message, "Index failure while serving a request.");

				ApiError::new(
					StatusCode::INTERNAL_SERVER_ERROR,
					"INDEX_ERROR",
					"Index request failed.",
					None,
				)
			},
		}
	}
}

impl IntoResponse for ApiError {
	fn into_response(self) -> Response {
		let body =
			ErrorBody { error_code: self.error_code, message: self.message, fields: self.fields };

		(self.status, Json(body)).into_response()
	}
}

/// JSON path of the offending field for messages shaped like `"<field> must ..."`.
fn invalid_field(message: &str) -> Option<String> {
	let (field, _) = message.split_once(" must ")?;

	if field.is_empty() || field.contains(char::is_whitespace) {
		return None;
	}

	Some(format!("$.{field}"))
}
