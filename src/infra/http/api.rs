//! JSON endpoints driving the session.

use std::str::FromStr;

use axum::{
    Json,
    body::Bytes,
    extract::{Path, State},
    http::{
        HeaderValue, StatusCode,
        header::{CACHE_CONTROL, CONTENT_DISPOSITION, CONTENT_TYPE},
    },
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};

use crate::application::{
    conversion::ConversionView, session::ToolsView, templates::TemplateSummary,
};
use crate::domain::{
    document::{EXPORT_FILE_NAME, SourceDocument, SourceKind},
    types::ToolId,
};

use super::HttpState;
use super::error::ApiError;

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ConversionRequest {
    pub tool: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ToolSelection {
    pub tool: String,
}

#[derive(Debug, Serialize)]
pub struct JobStarted {
    pub generation: u64,
    pub tool: ToolId,
}

#[derive(Debug, Serialize)]
pub struct ToolSelected {
    pub selected: ToolId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub generation: Option<u64>,
}

fn json_bytes(bytes: Vec<u8>) -> Response {
    let mut response = (StatusCode::OK, bytes).into_response();
    response
        .headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    response
}

fn parse_tool(value: &str) -> Result<ToolId, ApiError> {
    ToolId::new(value).map_err(ApiError::from)
}

pub async fn get_sources(State(state): State<HttpState>) -> Result<Response, ApiError> {
    Ok(json_bytes(state.session.export()?))
}

/// Editor change event: the raw body becomes the new text of one buffer.
pub async fn put_source(
    State(state): State<HttpState>,
    Path(kind): Path<String>,
    body: String,
) -> Result<StatusCode, ApiError> {
    let kind = SourceKind::from_str(&kind)?;
    state.session.edit(kind, body);
    Ok(StatusCode::NO_CONTENT)
}

pub async fn put_sources(
    State(state): State<HttpState>,
    body: Bytes,
) -> Result<StatusCode, ApiError> {
    let document = SourceDocument::from_export_bytes(&body)?;
    state.session.replace_all(document);
    Ok(StatusCode::NO_CONTENT)
}

pub async fn reload_preview(State(state): State<HttpState>) -> StatusCode {
    state.session.reload();
    StatusCode::NO_CONTENT
}

pub async fn viewport_changed(State(state): State<HttpState>) -> StatusCode {
    state.session.viewport_changed();
    StatusCode::NO_CONTENT
}

pub async fn export_sources(State(state): State<HttpState>) -> Result<Response, ApiError> {
    let mut response = json_bytes(state.session.export()?);
    let disposition = format!("attachment; filename=\"{EXPORT_FILE_NAME}\"");
    if let Ok(value) = HeaderValue::from_str(&disposition) {
        response.headers_mut().insert(CONTENT_DISPOSITION, value);
    }
    Ok(response)
}

pub async fn import_sources(
    State(state): State<HttpState>,
    body: Bytes,
) -> Result<Response, ApiError> {
    state.session.import(&body)?;
    get_sources(State(state)).await
}

pub async fn list_templates(State(state): State<HttpState>) -> Json<Vec<TemplateSummary>> {
    Json(state.session.templates().summaries())
}

pub async fn load_template(
    State(state): State<HttpState>,
    Path(name): Path<String>,
) -> Result<Response, ApiError> {
    state.session.load_template(&name)?;
    get_sources(State(state)).await
}

pub async fn list_tools(State(state): State<HttpState>) -> Json<ToolsView> {
    Json(state.session.tools_view())
}

pub async fn select_tool(
    State(state): State<HttpState>,
    Json(selection): Json<ToolSelection>,
) -> Result<Json<ToolSelected>, ApiError> {
    let tool = parse_tool(&selection.tool)?;
    let generation = state.session.select_tool(tool.clone());
    Ok(Json(ToolSelected {
        selected: tool,
        generation,
    }))
}

/// Open the conversion view; an empty body uses the selected tool.
pub async fn start_conversion(
    State(state): State<HttpState>,
    body: Bytes,
) -> Result<(StatusCode, Json<JobStarted>), ApiError> {
    let request: ConversionRequest = if body.is_empty() {
        ConversionRequest::default()
    } else {
        serde_json::from_slice(&body)
            .map_err(|err| ApiError::bad_request("Invalid conversion request", Some(err.to_string())))?
    };
    let tool = request
        .tool
        .as_deref()
        .filter(|value| !value.trim().is_empty())
        .map(parse_tool)
        .transpose()?;

    let (generation, tool) = state.session.request_conversion(tool);
    Ok((StatusCode::ACCEPTED, Json(JobStarted { generation, tool })))
}

pub async fn conversion_status(State(state): State<HttpState>) -> Json<ConversionView> {
    Json(state.session.conversion_view())
}

pub async fn close_conversion(State(state): State<HttpState>) -> StatusCode {
    state.session.close_conversion();
    StatusCode::NO_CONTENT
}

pub async fn conversion_pdf(State(state): State<HttpState>) -> Result<Response, ApiError> {
    let resource = state
        .session
        .displayed_pdf()
        .ok_or_else(|| ApiError::not_found("No PDF is displayed", None))?;

    let mut response = (StatusCode::OK, resource.bytes).into_response();
    let headers = response.headers_mut();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/pdf"));
    headers.insert(CACHE_CONTROL, HeaderValue::from_static("no-store"));
    let disposition = format!("inline; filename=\"{}.pdf\"", resource.tool);
    if let Ok(value) = HeaderValue::from_str(&disposition) {
        headers.insert(CONTENT_DISPOSITION, value);
    }
    Ok(response)
}
