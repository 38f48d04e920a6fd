use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use axum_helpers::{AppError, ErrorCode, ErrorResponse};
use sea_orm::DbErr;
use serde::{Deserialize, Serialize};
use strum::Display;
use thiserror::Error;
use utoipa::ToSchema;

use crate::models::ProjectRecord;
use crate::translate;

/// Input field a failure is attributed to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, ToSchema)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Field {
    Key,
    Name,
}

/// Stable failure taxonomy exposed to callers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, ToSchema)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ErrorKind {
    MissingField,
    InvalidIdentifier,
    DuplicateKey,
    NotFound,
    /// The project was created, only the permission template step failed
    PermissionTemplateFailure,
    Unknown,
}

impl ErrorKind {
    pub fn error_code(self) -> ErrorCode {
        match self {
            Self::MissingField => ErrorCode::ValidationError,
            Self::InvalidIdentifier => ErrorCode::InvalidIdentifier,
            Self::DuplicateKey => ErrorCode::Conflict,
            Self::NotFound => ErrorCode::NotFound,
            Self::PermissionTemplateFailure => ErrorCode::PartiallyApplied,
            Self::Unknown => ErrorCode::InternalError,
        }
    }
}

/// User-displayable description of a failed workflow
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct ErrorDetail {
    pub kind: ErrorKind,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<Field>,
    /// Message bundle key for localized rendering
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message_key: Option<String>,
}

/// Failure reported by a registry or permission backend, before translation.
///
/// The message is kept verbatim; [`translate::translate`] decides what it means.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct BackendError {
    message: String,
}

impl BackendError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl From<DbErr> for BackendError {
    fn from(err: DbErr) -> Self {
        Self::new(err.to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProvisioningError {
    #[error("{} is required", translate::field_label(.0))]
    MissingField(Field),

    #[error("Invalid project identifier: '{0}'")]
    InvalidIdentifier(String),

    #[error("{0}")]
    DuplicateKey(String),

    #[error("{0}")]
    NotFound(String),

    /// Carries the record persisted by the first step of the create path
    #[error("Project '{}' was created but its default permission template could not be applied: {message}", .record.key)]
    PermissionTemplateFailure {
        record: Box<ProjectRecord>,
        message: String,
    },

    #[error("{0}")]
    Unknown(String),
}

pub type ProvisioningResult<T> = Result<T, ProvisioningError>;

impl ProvisioningError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::MissingField(_) => ErrorKind::MissingField,
            Self::InvalidIdentifier(_) => ErrorKind::InvalidIdentifier,
            Self::DuplicateKey(_) => ErrorKind::DuplicateKey,
            Self::NotFound(_) => ErrorKind::NotFound,
            Self::PermissionTemplateFailure { .. } => ErrorKind::PermissionTemplateFailure,
            Self::Unknown(_) => ErrorKind::Unknown,
        }
    }

    pub fn field(&self) -> Option<Field> {
        match self {
            Self::MissingField(field) => Some(*field),
            Self::DuplicateKey(_) => Some(Field::Key),
            _ => None,
        }
    }

    /// True when a project record exists despite the failure
    pub fn record_persisted(&self) -> bool {
        matches!(self, Self::PermissionTemplateFailure { .. })
    }

    /// The record left behind by a partially applied create, if any
    pub fn persisted_record(&self) -> Option<&ProjectRecord> {
        match self {
            Self::PermissionTemplateFailure { record, .. } => Some(record),
            _ => None,
        }
    }

    pub fn detail(&self) -> ErrorDetail {
        ErrorDetail {
            kind: self.kind(),
            message: self.to_string(),
            field: self.field(),
            message_key: translate::message_key(self).map(str::to_string),
        }
    }

    /// HTTP status used when the error is rendered outside the provisioning form
    pub fn status(&self) -> StatusCode {
        match self.kind() {
            ErrorKind::MissingField | ErrorKind::InvalidIdentifier => StatusCode::BAD_REQUEST,
            ErrorKind::DuplicateKey => StatusCode::CONFLICT,
            ErrorKind::NotFound => StatusCode::NOT_FOUND,
            ErrorKind::PermissionTemplateFailure | ErrorKind::Unknown => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Response body shared by every rendering of this error
    pub fn error_response(&self) -> ErrorResponse {
        let detail = self.detail();
        let mut details = serde_json::json!({
            "kind": detail.kind,
            "field": detail.field,
            "message_key": detail.message_key,
            "record_persisted": self.record_persisted(),
        });
        if let Some(record) = self.persisted_record() {
            details["record"] = serde_json::json!(record);
        }

        ErrorResponse::new(detail.kind.error_code(), detail.message).with_details(details)
    }
}

/// Convert ProvisioningError to AppError for standardized error responses
impl From<ProvisioningError> for AppError {
    fn from(err: ProvisioningError) -> Self {
        match err.kind() {
            ErrorKind::MissingField | ErrorKind::InvalidIdentifier => {
                AppError::BadRequest(err.to_string())
            }
            ErrorKind::DuplicateKey => AppError::Conflict(err.to_string()),
            ErrorKind::NotFound => AppError::NotFound(err.to_string()),
            ErrorKind::PermissionTemplateFailure | ErrorKind::Unknown => {
                AppError::InternalServerError(err.to_string())
            }
        }
    }
}

impl IntoResponse for ProvisioningError {
    fn into_response(self) -> Response {
        if self.status().is_server_error() {
            tracing::error!(kind = %self.kind(), "Provisioning failed: {}", self);
        } else {
            tracing::info!(kind = %self.kind(), "Provisioning rejected: {}", self);
        }
        (self.status(), Json(self.error_response())).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ComponentId, Qualifier, Scope};
    use chrono::Utc;

    fn record() -> ProjectRecord {
        ProjectRecord {
            id: ComponentId::new(1),
            key: "proj1".into(),
            name: "Project One".into(),
            scope: Scope::Project,
            qualifier: Qualifier::Project,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_missing_field_detail() {
        let detail = ProvisioningError::MissingField(Field::Name).detail();
        assert_eq!(detail.kind, ErrorKind::MissingField);
        assert_eq!(detail.field, Some(Field::Name));
        assert_eq!(detail.message, "Name is required");
        assert_eq!(detail.message_key.as_deref(), Some("provisioning.missing.name"));
    }

    #[test]
    fn test_only_template_failure_reports_persisted_record() {
        let partial = ProvisioningError::PermissionTemplateFailure {
            record: Box::new(record()),
            message: "template store offline".into(),
        };
        assert!(partial.record_persisted());
        assert_eq!(partial.persisted_record().unwrap().key, "proj1");

        for err in [
            ProvisioningError::MissingField(Field::Key),
            ProvisioningError::DuplicateKey("taken".into()),
            ProvisioningError::NotFound("gone".into()),
            ProvisioningError::Unknown("boom".into()),
        ] {
            assert!(!err.record_persisted(), "{:?}", err);
        }
    }

    #[test]
    fn test_error_response_carries_kind_and_record() {
        let partial = ProvisioningError::PermissionTemplateFailure {
            record: Box::new(record()),
            message: "template store offline".into(),
        };
        let json = serde_json::to_value(partial.error_response()).unwrap();

        assert_eq!(json["error"], "PARTIALLY_APPLIED");
        assert_eq!(json["details"]["kind"], "permission_template_failure");
        assert_eq!(json["details"]["record_persisted"], true);
        assert_eq!(json["details"]["record"]["key"], "proj1");
    }

    #[test]
    fn test_unknown_preserves_message_verbatim() {
        let err = ProvisioningError::Unknown("Disk quota exceeded on /var".into());
        assert_eq!(err.detail().message, "Disk quota exceeded on /var");
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_app_error_conversion() {
        let app: AppError = ProvisioningError::DuplicateKey("taken".into()).into();
        assert!(matches!(app, AppError::Conflict(_)));

        let app: AppError = ProvisioningError::InvalidIdentifier("x".into()).into();
        assert!(matches!(app, AppError::BadRequest(_)));
    }
}
