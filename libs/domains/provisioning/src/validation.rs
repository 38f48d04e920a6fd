use validator::{Validate, ValidationErrors};

use crate::error::{Field, ProvisioningError, ProvisioningResult};
use crate::models::{ComponentId, ProvisioningRequest};

/// A request whose key and name are known to be present, trimmed.
///
/// Only [`validate`] can build one, so holding a value proves the check ran.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedRequest {
    id: Option<ComponentId>,
    key: String,
    name: String,
}

impl ValidatedRequest {
    pub fn id(&self) -> Option<ComponentId> {
        self.id
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

/// Key is reported before name when both are missing
fn first_missing(errors: &ValidationErrors) -> ProvisioningError {
    let fields = errors.field_errors();
    if fields.contains_key("key") {
        ProvisioningError::MissingField(Field::Key)
    } else {
        ProvisioningError::MissingField(Field::Name)
    }
}

/// Checks a create-or-update request without touching any backend.
pub fn validate(request: ProvisioningRequest) -> ProvisioningResult<ValidatedRequest> {
    let result = match &request {
        ProvisioningRequest::Create(req) => req.validate(),
        ProvisioningRequest::Update(req) => req.validate(),
    };
    result.map_err(|e| first_missing(&e))?;

    Ok(ValidatedRequest {
        id: request.id(),
        key: request.key().trim().to_string(),
        name: request.name().trim().to_string(),
    })
}
