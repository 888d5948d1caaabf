//! Request handlers.

use super::{AppState, MULTIPART_OVERHEAD};
use crate::inspector::{CertificateSummary, ExtractedFacts};
use crate::reputation::Lookup;
use crate::risk::{RiskAssessment, RiskLabel};
use axum::extract::{Multipart, Path, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{Html, IntoResponse, Response};
use axum::Json;
use chrono::Utc;
use serde::Serialize;
use serde_json::json;
use sha2::{Digest, Sha256};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

/// Full analysis payload returned for an accepted upload.
#[derive(Debug, Serialize)]
pub struct AnalysisResponse {
    pub ok: bool,
    pub filename: String,
    pub sha256: String,
    pub app_name: Option<String>,
    pub package_name: String,
    pub version_name: Option<String>,
    pub version_code: Option<u32>,
    pub debuggable: bool,
    pub risk_score: f32,
    pub risk_label: RiskLabel,
    pub risk_reasons: Vec<String>,
    pub recommendation: String,
    pub recommendation_reason: String,
    pub permissions: Vec<String>,
    pub dangerous_permissions: Vec<String>,
    pub urls: Vec<String>,
    pub activities: Vec<String>,
    pub services: Vec<String>,
    pub receivers: Vec<String>,
    pub certificates: Vec<CertificateSummary>,
}

impl AnalysisResponse {
    fn new(
        filename: String,
        sha256: String,
        facts: ExtractedFacts,
        assessment: RiskAssessment,
    ) -> Self {
        Self {
            ok: true,
            filename,
            sha256,
            app_name: facts.app_name,
            package_name: facts.package_name,
            version_name: facts.version_name,
            version_code: facts.version_code,
            debuggable: facts.debuggable,
            risk_score: assessment.score,
            risk_label: assessment.label,
            risk_reasons: assessment.reasons,
            recommendation: assessment.recommendation,
            recommendation_reason: assessment.recommendation_reason,
            permissions: facts.permissions,
            dangerous_permissions: assessment.dangerous_permissions,
            urls: facts.urls,
            activities: facts.activities,
            services: facts.services,
            receivers: facts.receivers,
            certificates: facts.certificates,
        }
    }
}

/// Serves the single-page front end.
pub async fn index() -> Html<&'static str> {
    Html(include_str!("../../static/index.html"))
}

fn error_response(status: StatusCode, message: &str) -> Response {
    (status, Json(json!({ "ok": false, "error": message }))).into_response()
}

fn allowed_file(name: &str) -> bool {
    std::path::Path::new(name)
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("apk"))
}

/// Accepts a multipart upload, stages it on disk, inspects it and returns
/// the analysis payload. The staged file is removed before responding.
pub async fn upload(
    State(state): State<AppState>,
    headers: HeaderMap,
    mut multipart: Multipart,
) -> Response {
    let limit = state.config.server.max_upload_size;

    // Reject oversized requests before reading the body when the client
    // declares its length.
    let declared = headers
        .get(header::CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<u64>().ok());
    if matches!(declared, Some(len) if len > limit + MULTIPART_OVERHEAD as u64) {
        return error_response(
            StatusCode::PAYLOAD_TOO_LARGE,
            "File too large for analysis",
        );
    }

    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => break,
            Err(_) => {
                return error_response(StatusCode::BAD_REQUEST, "Malformed multipart request")
            }
        };

        if field.name() != Some("file") {
            continue;
        }

        let filename = field.file_name().unwrap_or_default().to_owned();
        if filename.is_empty() {
            return error_response(StatusCode::BAD_REQUEST, "No selected file");
        }
        if !allowed_file(&filename) {
            return error_response(StatusCode::BAD_REQUEST, "Only .apk files are allowed");
        }

        let data = match field.bytes().await {
            Ok(data) => data,
            Err(_) => {
                return error_response(
                    StatusCode::PAYLOAD_TOO_LARGE,
                    "File too large for analysis",
                )
            }
        };
        if data.len() as u64 > limit {
            return error_response(
                StatusCode::PAYLOAD_TOO_LARGE,
                "File too large for analysis",
            );
        }

        return analyze(&state, filename, &data).await;
    }

    error_response(StatusCode::BAD_REQUEST, "No file part")
}

async fn analyze(state: &AppState, filename: String, data: &[u8]) -> Response {
    let sha256 = hex::encode(Sha256::digest(data));
    info!(
        "analyzing upload {filename} ({} bytes, sha256 {sha256})",
        data.len()
    );

    let uploads = &state.config.server.uploads_folder;
    if let Err(e) = tokio::fs::create_dir_all(uploads).await {
        warn!("could not create the uploads folder: {e}");
        return error_response(StatusCode::INTERNAL_SERVER_ERROR, "Internal server error");
    }

    let save_name = format!(
        "{}_{}",
        Utc::now().format("%Y%m%d_%H%M%S_%f"),
        sanitize(&filename)
    );
    let path = uploads.join(save_name);
    if let Err(e) = tokio::fs::write(&path, data).await {
        warn!("could not stage the upload: {e}");
        return error_response(StatusCode::INTERNAL_SERVER_ERROR, "Internal server error");
    }

    let inspector = Arc::clone(&state.inspector);
    let inspect_path = PathBuf::from(&path);
    let result =
        tokio::task::spawn_blocking(move || inspector.inspect(&inspect_path)).await;

    if let Err(e) = tokio::fs::remove_file(&path).await {
        warn!("could not remove the staged upload: {e}");
    }

    match result {
        Ok(Ok(facts)) => {
            let assessment = state.config.policy.classify(&facts);
            info!(
                "{} scored {:.1} ({})",
                facts.package_name, assessment.score, assessment.label
            );
            Json(AnalysisResponse::new(filename, sha256, facts, assessment)).into_response()
        }
        Ok(Err(e)) => error_response(
            StatusCode::UNPROCESSABLE_ENTITY,
            &format!("Failed to parse APK: {e}"),
        ),
        Err(e) => {
            warn!("inspection task failed: {e}");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "Internal server error")
        }
    }
}

/// Keeps only filesystem-safe characters in a client-supplied filename.
fn sanitize(filename: &str) -> String {
    filename
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect()
}

/// Looks up a file hash against the reputation service.
pub async fn reputation_lookup(
    State(state): State<AppState>,
    Path(hash): Path<String>,
) -> Response {
    let valid = (32..=64).contains(&hash.len()) && hash.chars().all(|c| c.is_ascii_hexdigit());
    if !valid {
        return error_response(StatusCode::BAD_REQUEST, "Invalid file hash");
    }

    match state.reputation.lookup(&hash).await {
        Ok(Lookup::Disabled) => Json(json!({ "enabled": false })).into_response(),
        Ok(Lookup::NotFound) => {
            Json(json!({ "enabled": true, "found": false })).into_response()
        }
        Ok(Lookup::Found(report)) => Json(report).into_response(),
        Err(e) => {
            warn!("reputation lookup failed: {e:#}");
            error_response(StatusCode::BAD_GATEWAY, "Reputation lookup failed")
        }
    }
}
