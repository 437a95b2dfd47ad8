use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};

use crate::store::StoreResult;

/// The authenticated employee an operation runs on behalf of.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Principal {
    pub employee_id: u64,
    pub organization_id: Option<u64>,
}

/// How far an actor's visibility reaches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Scope {
    #[serde(rename = "self")]
    #[strum(to_string = "self")]
    Own,
    Team,
    Company,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, AsRefStr)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum Permission {
    AttendanceApproveRegularization,
    AttendanceViewReports,
    AttendanceOverride,
}

/// Role and team lookups owned by the wider HR system.
#[async_trait]
pub trait AccessScope: Send + Sync {
    async fn resolve_scope(&self, actor: &Principal) -> StoreResult<Scope>;
    async fn team_members(&self, actor_id: u64, organization_id: u64) -> StoreResult<Vec<u64>>;
    async fn has_permission(
        &self,
        actor_id: u64,
        organization_id: u64,
        permission: Permission,
    ) -> StoreResult<bool>;
}

/// Employees an actor may see.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Visibility {
    Organization,
    Employees(Vec<u64>),
}

impl Visibility {
    pub fn includes(&self, employee_id: u64) -> bool {
        match self {
            Visibility::Organization => true,
            Visibility::Employees(ids) => ids.contains(&employee_id),
        }
    }
}
