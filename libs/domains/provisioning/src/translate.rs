//! Error translation.
//!
//! Backends fail with free-form messages. This module maps them onto the stable
//! [`ErrorKind`] taxonomy and resolves message-bundle keys to display text, so backend
//! wording never reaches callers without a kind attached.

use crate::error::{BackendError, ErrorKind, Field, ProvisioningError};

pub const MISSING_KEY: &str = "provisioning.missing.key";
pub const MISSING_NAME: &str = "provisioning.missing.name";
pub const INVALID_ID: &str = "provisioning.invalid.id";
pub const DUPLICATE_KEY: &str = "provisioning.duplicate.key";
pub const NOT_FOUND: &str = "provisioning.not_found";
pub const PERMISSION_TEMPLATE_FAILED: &str = "provisioning.permission_template.failed";
pub const RESOURCE_DELETED: &str = "resource_viewer.resource_deleted";

/// Default (English) message bundle
const BUNDLE: &[(&str, &str)] = &[
    (MISSING_KEY, "Key is required"),
    (MISSING_NAME, "Name is required"),
    (INVALID_ID, "Invalid project identifier"),
    (DUPLICATE_KEY, "A project with this key already exists"),
    (NOT_FOUND, "Project not found"),
    (
        PERMISSION_TEMPLATE_FAILED,
        "The project was created but its default permission template could not be applied",
    ),
    (RESOURCE_DELETED, "Resource deleted"),
];

/// Lower-cased fragments identifying a uniqueness violation on a project key.
///
/// Anchored on the registries' own wording and on Postgres' unique-index message, so schema
/// failures such as `relation "x" already exists` stay `Unknown`.
const DUPLICATE_PATTERNS: &[&str] = &[
    "project, key already exists:",
    "duplicate key value violates unique constraint",
];

/// Lower-cased prefixes the registries use for a missing component
const NOT_FOUND_PATTERNS: &[&str] = &["component not found:", "project not found:"];

/// Looks up a bundle key
pub fn message(key: &str) -> Option<&'static str> {
    BUNDLE
        .iter()
        .find(|(k, _)| *k == key)
        .map(|(_, text)| *text)
}

/// Bundle text for `raw` when it is a bundle key, otherwise `raw` itself
pub fn resolve(raw: &str) -> String {
    message(raw.trim()).map_or_else(|| raw.to_string(), str::to_string)
}

pub fn field_label(field: &Field) -> &'static str {
    match field {
        Field::Key => "Key",
        Field::Name => "Name",
    }
}

/// Bundle key describing `err`
pub fn message_key(err: &ProvisioningError) -> Option<&'static str> {
    match err {
        ProvisioningError::MissingField(Field::Key) => Some(MISSING_KEY),
        ProvisioningError::MissingField(Field::Name) => Some(MISSING_NAME),
        ProvisioningError::InvalidIdentifier(_) => Some(INVALID_ID),
        ProvisioningError::DuplicateKey(_) => Some(DUPLICATE_KEY),
        ProvisioningError::NotFound(_) => Some(NOT_FOUND),
        ProvisioningError::PermissionTemplateFailure { .. } => Some(PERMISSION_TEMPLATE_FAILED),
        ProvisioningError::Unknown(_) => None,
    }
}

/// Classifies a raw backend message
pub fn classify(raw: &str) -> ErrorKind {
    match raw.trim() {
        MISSING_KEY | MISSING_NAME => return ErrorKind::MissingField,
        INVALID_ID => return ErrorKind::InvalidIdentifier,
        DUPLICATE_KEY => return ErrorKind::DuplicateKey,
        NOT_FOUND => return ErrorKind::NotFound,
        _ => {}
    }

    let lowered = raw.to_lowercase();
    if DUPLICATE_PATTERNS.iter().any(|p| lowered.contains(p)) {
        ErrorKind::DuplicateKey
    } else if NOT_FOUND_PATTERNS.iter().any(|p| lowered.contains(p)) {
        ErrorKind::NotFound
    } else {
        ErrorKind::Unknown
    }
}

/// Maps a backend failure onto the provisioning taxonomy.
///
/// Unrecognized messages become [`ProvisioningError::Unknown`] with the original text
/// preserved.
pub fn translate(err: &BackendError) -> ProvisioningError {
    let raw = err.message();
    let text = resolve(raw);

    match classify(raw) {
        ErrorKind::MissingField if raw.trim() == MISSING_NAME => {
            ProvisioningError::MissingField(Field::Name)
        }
        ErrorKind::MissingField => ProvisioningError::MissingField(Field::Key),
        ErrorKind::InvalidIdentifier => ProvisioningError::InvalidIdentifier(text),
        ErrorKind::DuplicateKey => ProvisioningError::DuplicateKey(text),
        ErrorKind::NotFound => ProvisioningError::NotFound(text),
        // classify never yields PermissionTemplateFailure; only the service raises it
        _ => ProvisioningError::Unknown(text),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn backend(msg: &str) -> BackendError {
        BackendError::new(msg)
    }

    #[test]
    fn test_constraint_violations_become_duplicate_key() {
        for msg in [
            "Could not create Project, key already exists: proj1",
            "Could not update Project, key already exists: proj1",
            "Execution Error: error returned from database: duplicate key value violates unique constraint \"components_key_idx\"",
        ] {
            let err = translate(&backend(msg));
            assert_eq!(err.kind(), ErrorKind::DuplicateKey, "{}", msg);
            assert_eq!(err.to_string(), msg);
        }
    }

    #[test]
    fn test_missing_component_becomes_not_found() {
        let err = translate(&backend("Component not found: 7"));
        assert_eq!(err, ProvisioningError::NotFound("Component not found: 7".into()));
    }

    #[test]
    fn test_schema_errors_stay_unknown() {
        for msg in [
            "Execution Error: error returned from database: relation \"components\" does not exist",
            "Execution Error: error returned from database: relation \"components_key_idx\" already exists",
            "column \"root_id\" does not exist",
        ] {
            let err = translate(&backend(msg));
            assert_eq!(err, ProvisioningError::Unknown(msg.into()));
            assert_eq!(err.status(), axum::http::StatusCode::INTERNAL_SERVER_ERROR);
            assert_eq!(err.field(), None);
        }
    }

    #[test]
    fn test_classify_never_yields_template_failure() {
        for msg in [PERMISSION_TEMPLATE_FAILED, "permission template failed", "boom"] {
            assert_ne!(classify(msg), ErrorKind::PermissionTemplateFailure, "{}", msg);
        }
    }

    #[test]
    fn test_unrecognized_message_is_preserved() {
        let err = translate(&backend("connection reset by peer"));
        assert_eq!(err, ProvisioningError::Unknown("connection reset by peer".into()));
    }

    #[test]
    fn test_bundle_keys_resolve_to_text() {
        let err = translate(&backend(DUPLICATE_KEY));
        assert_eq!(
            err,
            ProvisioningError::DuplicateKey("A project with this key already exists".into())
        );

        let err = translate(&backend(MISSING_NAME));
        assert_eq!(err, ProvisioningError::MissingField(Field::Name));
    }

    #[test]
    fn test_resolve_passes_unknown_keys_through() {
        assert_eq!(resolve(RESOURCE_DELETED), "Resource deleted");
        assert_eq!(resolve("some.unknown.key"), "some.unknown.key");
    }

    #[test]
    fn test_every_kind_except_unknown_has_a_bundle_entry() {
        let errors = [
            ProvisioningError::MissingField(Field::Key),
            ProvisioningError::MissingField(Field::Name),
            ProvisioningError::InvalidIdentifier("x".into()),
            ProvisioningError::DuplicateKey("x".into()),
            ProvisioningError::NotFound("x".into()),
        ];
        for err in errors {
            let key = message_key(&err).unwrap();
            assert!(message(key).is_some(), "missing bundle entry for {}", key);
        }
    }
}
