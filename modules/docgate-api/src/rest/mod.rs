//! CREATE/READ handlers, shared by every resource family.

use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::rejection::BytesRejection,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Json, Response},
};
use docgate_common::{
    Document, FamilySchema, OperationMessage, ResourceFamily, ResourceId, ID_FIELD,
};
use serde_json::Value;
use tracing::debug;

use crate::auth::bearer_token;
use crate::error::ApiError;
use crate::AppState;

// --- Helpers ---

/// Decode the body into a flat field map. A body that cannot be read (over
/// the size limit, aborted) or is not a JSON object is a handling fault, not a
/// validation failure.
fn parse_fields(body: Result<Bytes, BytesRejection>) -> Result<Document, ApiError> {
    let body = body.map_err(|e| ApiError::Internal(format!("unreadable request body: {e}")))?;
    match serde_json::from_slice::<Value>(&body) {
        Ok(Value::Object(fields)) => Ok(fields),
        Ok(_) => Err(ApiError::Internal("request body is not a JSON object".into())),
        Err(e) => Err(ApiError::Internal(format!("malformed JSON body: {e}"))),
    }
}

fn required_string<'a>(fields: &'a Document, name: &str) -> Result<&'a str, ApiError> {
    fields
        .get(name)
        .and_then(Value::as_str)
        .ok_or_else(|| ApiError::Validation(format!("missing {name}")))
}

fn required_id(fields: &Document) -> Result<ResourceId, ApiError> {
    let raw = required_string(fields, ID_FIELD)?;
    ResourceId::parse(raw).ok_or_else(|| ApiError::Validation(format!("empty {ID_FIELD}")))
}

fn validate_create(schema: &FamilySchema, fields: &Document) -> Result<ResourceId, ApiError> {
    let resource_id = required_id(fields)?;
    required_string(fields, schema.title_field)?;
    Ok(resource_id)
}

// --- Handlers ---

/// `POST /v1/<family>/create`
///
/// Validate → authenticate → dispatch. Each step ends the request on failure,
/// so an invalid or unauthenticated request never reaches a worker.
pub async fn create_resource(
    state: Arc<AppState>,
    family: ResourceFamily,
    headers: HeaderMap,
    body: Result<Bytes, BytesRejection>,
) -> Result<Response, ApiError> {
    let fields = parse_fields(body)?;
    let resource_id = validate_create(&family.schema(), &fields)?;

    let token = bearer_token(&headers).ok_or(ApiError::Unauthorized)?;
    let claims = state.verifier.verify(token)?;
    debug!(family = %family, resource_id = %resource_id, subject = %claims.subject_id, "Caller verified");

    let message = OperationMessage::create(resource_id, fields, claims.subject_id);
    let document = state.dispatch(family, message).await?;

    Ok((StatusCode::CREATED, Json(document)).into_response())
}

/// `POST /v1/<family>/read`
pub async fn read_resource(
    state: Arc<AppState>,
    family: ResourceFamily,
    body: Result<Bytes, BytesRejection>,
) -> Result<Response, ApiError> {
    let fields = parse_fields(body)?;
    let resource_id = required_id(&fields)?;

    let document = state
        .dispatch(family, OperationMessage::read(resource_id))
        .await?;

    Ok((StatusCode::OK, Json(document)).into_response())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn fields(value: Value) -> Document {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn create_requires_id_and_title() {
        let schema = ResourceFamily::Blog.schema();
        assert!(validate_create(&schema, &fields(json!({"id": "b1", "title": "t"}))).is_ok());
        assert!(matches!(
            validate_create(&schema, &fields(json!({"title": "t"}))),
            Err(ApiError::Validation(_))
        ));
        assert!(matches!(
            validate_create(&schema, &fields(json!({"id": "b1"}))),
            Err(ApiError::Validation(_))
        ));
        assert!(matches!(
            validate_create(&schema, &fields(json!({"id": "", "title": "t"}))),
            Err(ApiError::Validation(_))
        ));
        assert!(matches!(
            validate_create(&schema, &fields(json!({"id": 7, "title": "t"}))),
            Err(ApiError::Validation(_))
        ));
    }

    #[test]
    fn user_create_requires_name() {
        let schema = ResourceFamily::User.schema();
        assert!(validate_create(&schema, &fields(json!({"id": "u1", "name": "Ada"}))).is_ok());
        assert!(validate_create(&schema, &fields(json!({"id": "u1", "title": "Ada"}))).is_err());
    }

    #[test]
    fn non_object_body_is_internal_fault() {
        let body = |raw: &'static [u8]| Ok(Bytes::from_static(raw));
        assert!(matches!(parse_fields(body(b"[1,2]")), Err(ApiError::Internal(_))));
        assert!(matches!(parse_fields(body(b"{oops")), Err(ApiError::Internal(_))));
        assert!(parse_fields(body(b"{\"id\":\"x\"}")).is_ok());
    }
}
