//! Provisioning Domain
//!
//! Manual registration of projects ahead of their first analysis: administrators create,
//! edit and delete project records, and every new project receives the default permission
//! template.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────┐
//! │  Handlers   │  ← HTTP endpoints, AdminCapability guard
//! └──────┬──────┘
//!        │
//! ┌──────▼──────┐
//! │   Service   │  ← validate → registry → permission template
//! └──────┬──────┘
//!        │
//! ┌──────▼──────────────────────────┐
//! │ ComponentRegistry               │  ← trait + in-memory / Postgres
//! │ PermissionTemplateApplier       │
//! └──────┬──────────────────────────┘
//!        │ BackendError
//! ┌──────▼──────┐
//! │  Translate  │  ← raw backend failure → ProvisioningError
//! └─────────────┘
//! ```
//!
//! # Usage
//!
//! ```rust,ignore
//! use domain_provisioning::{
//!     handlers, InMemoryComponentRegistry, InMemoryPermissionTemplates, PermissionTemplate,
//!     ProvisioningService,
//! };
//!
//! let registry = InMemoryComponentRegistry::new();
//! let templates = InMemoryPermissionTemplates::new(registry.clone(), PermissionTemplate::default());
//! let service = ProvisioningService::new(registry, templates);
//!
//! let router = handlers::router(service, jwt_auth);
//! ```

pub mod auth;
pub mod entity;
pub mod error;
pub mod handlers;
pub mod models;
pub mod permissions;
pub mod postgres;
pub mod registry;
pub mod service;
pub mod translate;
pub mod validation;

// Re-export commonly used types
pub use auth::{ADMIN_ROLE, AccessDenied, AdminCapability};
pub use error::{
    BackendError, ErrorDetail, ErrorKind, Field, ProvisioningError, ProvisioningResult,
};
pub use handlers::ApiDoc;
pub use models::{
    ComponentFilter, ComponentId, CreateRequest, FormId, Page, PermissionGrant, ProjectRecord,
    ProvisionedQuery, ProvisioningForm, ProvisioningRequest, Qualifier, ResourceKind, Scope,
    UpdateRequest,
};
pub use permissions::{InMemoryPermissionTemplates, PermissionTemplate, PermissionTemplateApplier};
pub use postgres::{PgComponentRegistry, PgPermissionTemplates};
pub use registry::{ComponentRegistry, InMemoryComponentRegistry, Resource};
pub use service::ProvisioningService;
pub use translate::translate;
pub use validation::{ValidatedRequest, validate};
