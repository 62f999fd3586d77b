//! Render preview endpoint.

use axum::{extract::State, Json};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::audience::TeamTag;
use crate::color::Color;
use crate::error::{AppError, Result};
use crate::format::Arg;
use crate::language::Resolution;
use crate::server::AppState;
use crate::template::{degraded, RecipientContext};

/// A JSON argument. Plain JSON scalars map to int, float, bool and text;
/// other types use `{"type": "...", "value": ...}`.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum ArgValue {
    Typed {
        #[serde(rename = "type")]
        value_type: String,
        value: Value,
    },
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

impl ArgValue {
    pub fn into_arg(self, index: usize) -> Result<Arg> {
        let invalid = |expected: &str| {
            AppError::Validation(format!("Argument {} is not a valid {}", index, expected))
        };

        match self {
            ArgValue::Bool(value) => Ok(Arg::Bool(value)),
            ArgValue::Int(value) => Ok(Arg::Int(value)),
            ArgValue::Float(value) => Ok(Arg::Float(value)),
            ArgValue::Text(value) => Ok(Arg::Text(value)),
            ArgValue::Typed { value_type, value } => match value_type.to_ascii_lowercase().as_str() {
                "int" => value.as_i64().map(Arg::Int).ok_or_else(|| invalid("int")),
                "float" => value.as_f64().map(Arg::Float).ok_or_else(|| invalid("float")),
                "bool" => value.as_bool().map(Arg::Bool).ok_or_else(|| invalid("bool")),
                "text" => value
                    .as_str()
                    .map(|s| Arg::Text(s.to_string()))
                    .ok_or_else(|| invalid("text")),
                // seconds
                "duration" => value
                    .as_f64()
                    .map(|secs| Arg::Duration(Duration::milliseconds((secs * 1000.0).round() as i64)))
                    .ok_or_else(|| invalid("duration")),
                // RFC 3339 string or unix seconds
                "timestamp" => match &value {
                    Value::String(s) => DateTime::parse_from_rfc3339(s)
                        .map(|t| Arg::Timestamp(t.with_timezone(&Utc)))
                        .map_err(|_| invalid("timestamp")),
                    Value::Number(n) => n
                        .as_i64()
                        .and_then(|secs| DateTime::<Utc>::from_timestamp(secs, 0))
                        .map(Arg::Timestamp)
                        .ok_or_else(|| invalid("timestamp")),
                    _ => Err(invalid("timestamp")),
                },
                "color" => value
                    .as_str()
                    .and_then(|s| s.parse::<Color>().ok())
                    .map(Arg::Color)
                    .ok_or_else(|| invalid("color")),
                other => Err(AppError::Validation(format!(
                    "Argument {} has unsupported type '{}'",
                    index, other
                ))),
            },
        }
    }
}

/// Convert request arguments, failing on the first invalid one
pub fn convert_args(values: Vec<ArgValue>) -> Result<Vec<Arg>> {
    values
        .into_iter()
        .enumerate()
        .map(|(index, value)| value.into_arg(index))
        .collect()
}

#[derive(Debug, Deserialize)]
pub struct RenderRequest {
    pub key: String,
    #[serde(default)]
    pub language: Option<String>,
    #[serde(default)]
    pub args: Vec<ArgValue>,
    #[serde(default)]
    pub team: Option<u8>,
}

#[derive(Debug, Serialize)]
pub struct RenderResponse {
    pub key: String,
    pub resolution: Resolution,
    pub text: String,
    pub degraded: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// POST /api/v1/render - Preview a render without sending it
#[tracing::instrument(
    name = "http.render",
    skip(state, request),
    fields(template = %request.key, language = ?request.language)
)]
pub async fn render_preview(
    State(state): State<AppState>,
    Json(request): Json<RenderRequest>,
) -> Result<Json<RenderResponse>> {
    let args = convert_args(request.args)?;

    let localizer = &state.localizer;
    let registry = localizer.templates();
    let template = registry
        .by_key(&request.key)
        .ok_or_else(|| AppError::NotFound(format!("Template '{}'", request.key)))?;

    let resolution = localizer.resolve(request.language.as_deref(), template);
    let context = RecipientContext::team(request.team.map(TeamTag));

    let response = match localizer
        .renderer(&registry)
        .try_render(template, &resolution, &args, &context)
    {
        Ok(text) => RenderResponse {
            key: template.key.clone(),
            resolution,
            text,
            degraded: false,
            error: None,
        },
        Err(err) => RenderResponse {
            key: template.key.clone(),
            resolution,
            text: degraded(template, &args),
            degraded: true,
            error: Some(err.to_string()),
        },
    };
    Ok(Json(response))
}
