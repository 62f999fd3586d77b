//! Template inspection endpoints.

use std::collections::BTreeMap;

use axum::{
    extract::{Path, State},
    Json,
};
use serde::Serialize;

use crate::error::{AppError, Result};
use crate::server::AppState;
use crate::template::{Segment, TemplateSummary};

#[derive(Debug, Serialize)]
pub struct TemplateListResponse {
    pub generation: u64,
    pub templates: Vec<TemplateSummary>,
    pub total: usize,
}

#[derive(Debug, Serialize)]
pub struct TemplateDetail {
    #[serde(flatten)]
    pub summary: TemplateSummary,
    /// Raw text per language
    pub texts: BTreeMap<String, String>,
    /// Parsed default-language segments, for debugging catalog entries
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub segments: Vec<Segment>,
}

/// GET /api/v1/templates - List registered templates
#[tracing::instrument(name = "http.list_templates", skip(state))]
pub async fn list_templates(State(state): State<AppState>) -> Json<TemplateListResponse> {
    let registry = state.localizer.templates();
    let templates: Vec<TemplateSummary> = registry.iter().map(|t| t.summary()).collect();
    let total = templates.len();

    Json(TemplateListResponse {
        generation: registry.generation(),
        templates,
        total,
    })
}

/// GET /api/v1/templates/{key} - Get one template
#[tracing::instrument(name = "http.get_template", skip(state))]
pub async fn get_template(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Result<Json<TemplateDetail>> {
    let registry = state.localizer.templates();
    let template = registry
        .by_key(&key)
        .ok_or_else(|| AppError::NotFound(format!("Template '{}'", key)))?;

    let texts = template
        .texts()
        .map(|(code, text)| (code.to_string(), text.raw().to_string()))
        .collect();
    let segments = template
        .first_language()
        .and_then(|code| template.text_for(code))
        .map(|text| text.segments().to_vec())
        .unwrap_or_default();

    Ok(Json(TemplateDetail {
        summary: template.summary(),
        texts,
        segments,
    }))
}

/// GET /api/v1/signs/{sign_key} - Template bound to a sign
#[tracing::instrument(name = "http.get_sign", skip(state))]
pub async fn get_sign(
    State(state): State<AppState>,
    Path(sign_key): Path<String>,
) -> Result<Json<TemplateSummary>> {
    let registry = state.localizer.templates();
    registry
        .by_sign_key(&sign_key)
        .map(|template| Json(template.summary()))
        .ok_or_else(|| AppError::NotFound(format!("Sign '{}'", sign_key)))
}
