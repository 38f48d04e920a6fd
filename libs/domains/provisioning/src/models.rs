use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use strum::{Display, EnumString};
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

use crate::error::ProvisioningError;

/// Default number of rows per listing page
pub const DEFAULT_PAGE_SIZE: u64 = 50;
/// Upper bound on the listing page size
pub const MAX_PAGE_SIZE: u64 = 500;

/// Rejects empty and whitespace-only values
fn not_blank(value: &str) -> Result<(), validator::ValidationError> {
    if value.trim().is_empty() {
        return Err(validator::ValidationError::new("blank"));
    }
    Ok(())
}

/// Numeric identifier the registry assigns to a component on creation
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, ToSchema,
)]
#[serde(transparent)]
#[schema(value_type = i64)]
pub struct ComponentId(i64);

impl ComponentId {
    pub const fn new(value: i64) -> Self {
        Self(value)
    }

    pub const fn value(self) -> i64 {
        self.0
    }
}

impl fmt::Display for ComponentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for ComponentId {
    type Err = ProvisioningError;

    /// Accepts positive decimal integers, surrounding whitespace ignored
    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().parse::<i64>() {
            Ok(value) if value > 0 => Ok(Self(value)),
            _ => Err(ProvisioningError::InvalidIdentifier(raw.to_string())),
        }
    }
}

/// Entity kind tag stored alongside every component
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString, ToSchema,
)]
pub enum Qualifier {
    #[serde(rename = "TRK")]
    #[strum(serialize = "TRK")]
    Project,
    #[serde(rename = "BRC")]
    #[strum(serialize = "BRC")]
    Module,
    #[serde(rename = "DIR")]
    #[strum(serialize = "DIR")]
    Directory,
    #[serde(rename = "FIL")]
    #[strum(serialize = "FIL")]
    File,
}

/// Coarse grouping of qualifiers
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString, ToSchema,
)]
pub enum Scope {
    #[serde(rename = "PRJ")]
    #[strum(serialize = "PRJ")]
    Project,
    #[serde(rename = "DIR")]
    #[strum(serialize = "DIR")]
    Directory,
    #[serde(rename = "FIL")]
    #[strum(serialize = "FIL")]
    File,
}

/// A project as persisted by the component registry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct ProjectRecord {
    pub id: ComponentId,
    /// Globally unique key
    pub key: String,
    /// Display name
    pub name: String,
    pub scope: Scope,
    pub qualifier: Qualifier,
    pub created_at: DateTime<Utc>,
}

/// Input for registering a new project
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate, ToSchema)]
pub struct CreateRequest {
    #[validate(custom(function = "not_blank"))]
    pub key: String,
    #[validate(custom(function = "not_blank"))]
    pub name: String,
}

/// Input for editing an existing project
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate, ToSchema)]
pub struct UpdateRequest {
    pub id: ComponentId,
    #[validate(custom(function = "not_blank"))]
    pub key: String,
    #[validate(custom(function = "not_blank"))]
    pub name: String,
}

/// One create-or-update invocation, already tagged by the caller
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProvisioningRequest {
    Create(CreateRequest),
    Update(UpdateRequest),
}

impl ProvisioningRequest {
    pub fn create(key: impl Into<String>, name: impl Into<String>) -> Self {
        Self::Create(CreateRequest {
            key: key.into(),
            name: name.into(),
        })
    }

    pub fn update(id: ComponentId, key: impl Into<String>, name: impl Into<String>) -> Self {
        Self::Update(UpdateRequest {
            id,
            key: key.into(),
            name: name.into(),
        })
    }

    pub fn id(&self) -> Option<ComponentId> {
        match self {
            Self::Create(_) => None,
            Self::Update(req) => Some(req.id),
        }
    }

    pub fn key(&self) -> &str {
        match self {
            Self::Create(req) => &req.key,
            Self::Update(req) => &req.key,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Self::Create(req) => &req.name,
            Self::Update(req) => &req.name,
        }
    }
}

/// Form `id` as submitted: HTML forms send text, JSON clients may send a number
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(untagged)]
pub enum FormId {
    Number(i64),
    Text(String),
}

impl FormId {
    /// True when the id selects the create path
    pub fn is_blank(&self) -> bool {
        matches!(self, Self::Text(text) if text.trim().is_empty())
    }

    fn parse(&self) -> Result<ComponentId, ProvisioningError> {
        match self {
            Self::Number(value) if *value > 0 => Ok(ComponentId::new(*value)),
            Self::Number(value) => Err(ProvisioningError::InvalidIdentifier(value.to_string())),
            Self::Text(text) => text.parse(),
        }
    }
}

impl From<&str> for FormId {
    fn from(text: &str) -> Self {
        Self::Text(text.to_string())
    }
}

impl From<i64> for FormId {
    fn from(value: i64) -> Self {
        Self::Number(value)
    }
}

/// Raw `{id?, key, name}` payload submitted by the provisioning form.
///
/// Every field is optional so that an absent key or name reaches the validator
/// and is reported as a missing field rather than a JSON rejection.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct ProvisioningForm {
    #[serde(default)]
    pub id: Option<FormId>,
    #[serde(default)]
    pub key: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
}

impl ProvisioningForm {
    pub fn is_update(&self) -> bool {
        self.id.as_ref().is_some_and(|id| !id.is_blank())
    }
}

impl TryFrom<ProvisioningForm> for ProvisioningRequest {
    type Error = ProvisioningError;

    /// A blank or absent id selects the create path; anything else must parse as an id.
    fn try_from(form: ProvisioningForm) -> Result<Self, Self::Error> {
        let key = form.key.unwrap_or_default();
        let name = form.name.unwrap_or_default();

        match form.id {
            Some(id) if !id.is_blank() => Ok(Self::update(id.parse()?, key, name)),
            _ => Ok(Self::create(key, name)),
        }
    }
}

/// Listing parameters accepted from the caller
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, ToSchema, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ProvisionedQuery {
    /// Case-insensitive substring matched against key and name
    pub text: Option<String>,
    /// 1-based page number
    pub page: Option<u64>,
    pub page_size: Option<u64>,
}

/// Query forwarded to the component registry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComponentFilter {
    pub qualifiers: Vec<Qualifier>,
    pub text: Option<String>,
    pub page: u64,
    pub page_size: u64,
}

impl ComponentFilter {
    /// Restricts `query` to the given qualifiers and clamps pagination.
    pub fn provisioned(qualifiers: Vec<Qualifier>, query: ProvisionedQuery) -> Self {
        Self {
            qualifiers,
            text: query
                .text
                .map(|t| t.trim().to_string())
                .filter(|t| !t.is_empty()),
            page: query.page.unwrap_or(1).max(1),
            page_size: query
                .page_size
                .unwrap_or(DEFAULT_PAGE_SIZE)
                .clamp(1, MAX_PAGE_SIZE),
        }
    }

    /// Rows to skip; saturates at the largest offset Postgres accepts
    pub fn offset(&self) -> u64 {
        self.page
            .saturating_sub(1)
            .saturating_mul(self.page_size)
            .min(i64::MAX as u64)
    }

    /// Case-insensitive match on key or name; no text matches everything
    pub fn matches_text(&self, record: &ProjectRecord) -> bool {
        match &self.text {
            None => true,
            Some(text) => {
                let needle = text.to_lowercase();
                record.key.to_lowercase().contains(&needle)
                    || record.name.to_lowercase().contains(&needle)
            }
        }
    }
}

/// One page of a listing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub page: u64,
    pub page_size: u64,
    /// Matching rows across all pages
    pub total: u64,
}

/// Resources nested under a project and removed with it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, ToSchema)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ResourceKind {
    Module,
    Snapshot,
    Measure,
    Permission,
}

/// A role granted to a group on a project
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
pub struct PermissionGrant {
    pub role: String,
    pub group: String,
}

impl FromStr for PermissionGrant {
    type Err = String;

    /// Parses `role:group`
    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.split_once(':') {
            Some((role, group)) if !role.trim().is_empty() && !group.trim().is_empty() => {
                Ok(Self {
                    role: role.trim().to_string(),
                    group: group.trim().to_string(),
                })
            }
            _ => Err(format!("expected 'role:group', got '{}'", raw)),
        }
    }
}
