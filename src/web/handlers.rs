use axum::{
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Deserialize;
use serde_json::json;

use super::{blocking, ApiError, SharedState};
use crate::error::CertissueError;
use crate::template::TemplateVariant;
use crate::verify::{self, PublicCertificate, VerificationMethod};

#[derive(Debug, Default, Deserialize)]
pub struct VerifyParams {
    #[serde(default)]
    method: String,
    #[serde(default)]
    value: String,
}

pub async fn verify(
    State(state): State<SharedState>,
    Query(params): Query<VerifyParams>,
) -> Result<Json<verify::VerificationOutcome>, ApiError> {
    let outcome = blocking(&state, move |issuer| {
        Ok(verify::verify(issuer.store(), &params.method, &params.value))
    })
    .await?;
    Ok(Json(outcome))
}

/// Details of a certificate. Revoked ones are shown with `is_verified`
/// false; only unknown IDs are 404.
pub async fn verify_detail(
    State(state): State<SharedState>,
    Path(id): Path<String>,
) -> Result<Json<PublicCertificate>, ApiError> {
    let cert = blocking(&state, move |issuer| issuer.store().require_certificate(&id)).await?;
    Ok(Json(PublicCertificate::from(&cert)))
}

pub async fn api_verify(
    State(state): State<SharedState>,
    Path(id): Path<String>,
) -> Result<Response, ApiError> {
    let found = blocking(&state, move |issuer| verify::api_verify(issuer.store(), &id)).await?;
    Ok(match found {
        Some(api) => Json(api).into_response(),
        None => (
            StatusCode::NOT_FOUND,
            Json(json!({ "verified": false, "error": "Certificate not found" })),
        )
            .into_response(),
    })
}

pub async fn download(
    State(state): State<SharedState>,
    Path(id): Path<String>,
) -> Result<Response, ApiError> {
    let (filename, bytes) = blocking(&state, move |issuer| {
        let cert = issuer.store().require_certificate(&id)?;
        let relative = cert
            .certificate_image
            .as_deref()
            .ok_or_else(|| CertissueError::NotFound(format!("image of {}", id)))?;
        let bytes = std::fs::read(issuer.media_root().join(relative))
            .map_err(|_| CertissueError::NotFound(format!("image of {}", id)))?;
        Ok((cert.image_filename(), bytes))
    })
    .await?;

    Ok((
        [
            (header::CONTENT_TYPE, "image/png".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", filename),
            ),
        ],
        bytes,
    )
        .into_response())
}

pub async fn templates() -> Json<Vec<&'static str>> {
    Json(TemplateVariant::ALL.iter().map(|t| t.name()).collect())
}

pub async fn healthz() -> Json<serde_json::Value> {
    Json(json!({
        "status": "ok",
        "verification_methods": [
            VerificationMethod::CertificateId.as_str(),
            VerificationMethod::Email.as_str(),
            VerificationMethod::RollNumber.as_str(),
        ],
    }))
}
