use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use chrono::Utc;
use serde::Deserialize;
use serde_json::json;

use super::{blocking, ApiError, SharedState};
use crate::error::CertissueError;
use crate::export;
use crate::import::{self, ImportReport, SheetFormat};
use crate::pipeline::{BatchOutcome, BulkReport};
use crate::record::{Certificate, CertificateForm, PendingStudent};
use crate::store::{CertificateQuery, Stats};
use crate::template::{TemplateVariant, DEFAULT_BULK_TEMPLATE};

fn attachment(content_type: &str, filename: &str, bytes: Vec<u8>) -> Response {
    (
        [
            (header::CONTENT_TYPE, content_type.to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", filename),
            ),
        ],
        bytes,
    )
        .into_response()
}

pub async fn issue_certificate(
    State(state): State<SharedState>,
    Json(form): Json<CertificateForm>,
) -> Result<(StatusCode, Json<Certificate>), ApiError> {
    let cert = blocking(&state, move |issuer| issuer.issue(&form)).await?;
    Ok((StatusCode::CREATED, Json(cert)))
}

#[derive(Debug, Default, Deserialize)]
pub struct ListParams {
    #[serde(default)]
    search_query: String,
    #[serde(default)]
    course_filter: String,
    #[serde(default)]
    college_filter: String,
    page: Option<String>,
}

pub async fn list_certificates(
    State(state): State<SharedState>,
    Query(params): Query<ListParams>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let body = blocking(&state, move |issuer| {
        let query = CertificateQuery {
            search_query: params.search_query,
            course_filter: params.course_filter,
            college_filter: params.college_filter,
        }
        .trimmed();
        let store = issuer.store();
        let page = store.search(&query, params.page.as_deref())?;
        Ok(json!({
            "page": page,
            "courses": store.distinct_courses()?,
            "colleges": store.distinct_colleges()?,
            "query": query,
        }))
    })
    .await?;
    Ok(Json(body))
}

pub async fn get_certificate(
    State(state): State<SharedState>,
    Path(id): Path<String>,
) -> Result<Json<Certificate>, ApiError> {
    let cert = blocking(&state, move |issuer| issuer.store().require_certificate(&id)).await?;
    Ok(Json(cert))
}

#[derive(Debug, Deserialize)]
pub struct CertificateUpdate {
    is_verified: Option<bool>,
    notes: Option<String>,
}

/// Revokes or reinstates a certificate and edits its notes.
pub async fn update_certificate(
    State(state): State<SharedState>,
    Path(id): Path<String>,
    Json(update): Json<CertificateUpdate>,
) -> Result<Json<Certificate>, ApiError> {
    let cert = blocking(&state, move |issuer| {
        let store = issuer.store();
        if let Some(verified) = update.is_verified {
            store.set_verified(&id, verified)?;
        }
        if let Some(notes) = &update.notes {
            store.set_notes(&id, notes)?;
        }
        store.require_certificate(&id)
    })
    .await?;
    Ok(Json(cert))
}

pub async fn delete_certificate(
    State(state): State<SharedState>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    blocking(&state, move |issuer| issuer.store().delete_certificate(&id)).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn email_certificate(
    State(state): State<SharedState>,
    Path(id): Path<String>,
) -> Result<Json<Certificate>, ApiError> {
    Ok(Json(blocking(&state, move |issuer| issuer.send_email(&id)).await?))
}

pub async fn upload_certificate(
    State(state): State<SharedState>,
    Path(id): Path<String>,
) -> Result<Json<Certificate>, ApiError> {
    Ok(Json(blocking(&state, move |issuer| issuer.upload_one(&id)).await?))
}

pub async fn regenerate_certificate(
    State(state): State<SharedState>,
    Path(id): Path<String>,
) -> Result<Json<Certificate>, ApiError> {
    Ok(Json(blocking(&state, move |issuer| issuer.regenerate_one(&id)).await?))
}

#[derive(Debug, Deserialize)]
pub struct IdList {
    ids: Vec<String>,
}

pub async fn batch_email(
    State(state): State<SharedState>,
    Json(list): Json<IdList>,
) -> Result<Json<BatchOutcome>, ApiError> {
    Ok(Json(blocking(&state, move |issuer| Ok(issuer.send_emails(&list.ids))).await?))
}

pub async fn batch_upload(
    State(state): State<SharedState>,
    Json(list): Json<IdList>,
) -> Result<Json<BatchOutcome>, ApiError> {
    Ok(Json(blocking(&state, move |issuer| Ok(issuer.upload(&list.ids))).await?))
}

pub async fn batch_regenerate(
    State(state): State<SharedState>,
    Json(list): Json<IdList>,
) -> Result<Json<BatchOutcome>, ApiError> {
    Ok(Json(blocking(&state, move |issuer| Ok(issuer.regenerate(&list.ids))).await?))
}

pub async fn stats(State(state): State<SharedState>) -> Result<Json<Stats>, ApiError> {
    Ok(Json(blocking(&state, |issuer| issuer.store().stats()).await?))
}

pub async fn pending_students(
    State(state): State<SharedState>,
) -> Result<Json<Vec<PendingStudent>>, ApiError> {
    Ok(Json(blocking(&state, |issuer| issuer.store().pending_students()).await?))
}

#[derive(Debug, Default, Deserialize)]
pub struct ImportParams {
    format: Option<String>,
}

fn sheet_format(params: &ImportParams, headers: &HeaderMap, body: &[u8]) -> Result<SheetFormat, ApiError> {
    if let Some(format) = params.format.as_deref() {
        return match format.trim().to_ascii_lowercase().as_str() {
            "csv" => Ok(SheetFormat::Csv),
            "xlsx" | "xls" => Ok(SheetFormat::Xlsx),
            other => Err(ApiError::BadRequest(format!("unsupported format '{}'", other))),
        };
    }
    let declared = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .and_then(SheetFormat::from_content_type);
    // xlsx files are zip archives
    Ok(declared.unwrap_or(if body.starts_with(b"PK") {
        SheetFormat::Xlsx
    } else {
        SheetFormat::Csv
    }))
}

pub async fn import_students(
    State(state): State<SharedState>,
    Query(params): Query<ImportParams>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<ImportReport>, ApiError> {
    if body.is_empty() {
        return Err(ApiError::BadRequest("empty upload".to_string()));
    }
    let format = sheet_format(&params, &headers, &body)?;
    let report = blocking(&state, move |issuer| {
        import::import_students(issuer.store(), &body, format)
    })
    .await?;
    Ok(Json(report))
}

#[derive(Debug, Default, Deserialize)]
pub struct GenerateParams {
    template: Option<String>,
}

pub async fn generate_pending(
    State(state): State<SharedState>,
    Query(params): Query<GenerateParams>,
) -> Result<Json<BulkReport>, ApiError> {
    let template = match params.template.as_deref().map(str::trim) {
        None | Some("") => DEFAULT_BULK_TEMPLATE,
        Some(name) => name.parse::<TemplateVariant>()?,
    };
    let report = blocking(&state, move |issuer| issuer.generate_pending(template)).await?;
    Ok(Json(report))
}

pub async fn sample_sheet() -> Result<Response, ApiError> {
    let bytes = import::sample_sheet()?;
    Ok(attachment("text/csv", "student_template.csv", bytes))
}

pub async fn export_csv(
    State(state): State<SharedState>,
    Query(query): Query<CertificateQuery>,
) -> Result<Response, ApiError> {
    let bytes = blocking(&state, move |issuer| {
        let certs = issuer.store().export_selection(&query.trimmed())?;
        export::export_csv(&certs)
    })
    .await?;
    let filename = format!("certificates_{}.csv", Utc::now().format("%Y-%m-%d"));
    Ok(attachment("text/csv", &filename, bytes))
}

pub async fn export_zip(
    State(state): State<SharedState>,
    Query(query): Query<CertificateQuery>,
) -> Result<Response, ApiError> {
    let (filename, bytes) = blocking(&state, move |issuer| {
        let certs = issuer.store().export_selection(&query.trimmed())?;
        if certs.is_empty() {
            return Err(CertissueError::NothingToExport);
        }
        export::export_zip(&certs, issuer.media_root())
    })
    .await?;
    Ok(attachment("application/zip", &filename, bytes))
}
