//! The attendance engine: shift resolution, the daily clock state machine,
//! regularization and reports. Every operation takes the request's `now`
//! explicitly and converts it to company-local time once.

pub mod access;
pub mod attendance;
pub mod regularization;
pub mod report;
pub mod shift;
pub mod time_math;

use chrono::{DateTime, NaiveDateTime, Utc};
use chrono_tz::Tz;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use crate::error::AttendanceError;
use crate::model::settings::CompanySettings;
use crate::service::access::{AccessScope, Permission, Principal, Scope, Visibility};
use crate::store::AttendanceStore;
use crate::utils::settings_cache::SettingsCache;

pub struct AttendanceEngine {
    store: Arc<dyn AttendanceStore>,
    access: Arc<dyn AccessScope>,
    settings: SettingsCache,
    default_timezone: Tz,
}

impl AttendanceEngine {
    pub fn new(
        store: Arc<dyn AttendanceStore>,
        access: Arc<dyn AccessScope>,
        settings_ttl: Duration,
        default_timezone: Tz,
    ) -> Self {
        Self {
            store,
            access,
            settings: SettingsCache::new(settings_ttl),
            default_timezone,
        }
    }

    /// Resolves the token's employee link into a principal.
    pub async fn current_employee(
        &self,
        employee_id: Option<u64>,
    ) -> Result<Principal, AttendanceError> {
        let employee_id = employee_id.ok_or(AttendanceError::Unauthenticated)?;
        let employee = self
            .store
            .employee(employee_id)
            .await?
            .ok_or_else(|| AttendanceError::NotFound("Employee".into()))?;
        Ok(Principal {
            employee_id: employee.id,
            organization_id: employee.organization_id,
        })
    }

    /// Settings for an organization, or defaults when there is none.
    pub(crate) async fn settings_for(
        &self,
        organization_id: Option<u64>,
    ) -> Result<Arc<CompanySettings>, AttendanceError> {
        let Some(org) = organization_id else {
            return Ok(Arc::new(CompanySettings::defaults(None, self.default_timezone)));
        };
        let store = self.store.clone();
        let timezone = self.default_timezone;
        let settings = self
            .settings
            .get_or_load(org, || async move {
                store
                    .company_settings(org)
                    .await
                    .map(|found| found.unwrap_or_else(|| CompanySettings::defaults(Some(org), timezone)))
            })
            .await?;
        Ok(settings)
    }

    pub(crate) fn local_now(settings: &CompanySettings, now: DateTime<Utc>) -> NaiveDateTime {
        now.with_timezone(&settings.timezone).naive_local()
    }

    /// Organization of the actor, required for any cross-employee action.
    pub(crate) fn organization_of(actor: &Principal) -> Result<u64, AttendanceError> {
        actor
            .organization_id
            .ok_or_else(|| AttendanceError::unauthorized("No organization assigned"))
    }

    /// Employees whose records the actor may see.
    /// Reports pass a permission that widens a lower scope to the whole organization.
    pub(crate) async fn visibility(
        &self,
        actor: &Principal,
        widened_by: Option<Permission>,
    ) -> Result<Visibility, AttendanceError> {
        let scope = self.access.resolve_scope(actor).await?;
        if scope == Scope::Company {
            return Ok(Visibility::Organization);
        }
        if let (Some(permission), Some(org)) = (widened_by, actor.organization_id) {
            if self
                .access
                .has_permission(actor.employee_id, org, permission)
                .await?
            {
                return Ok(Visibility::Organization);
            }
        }
        let mut ids = vec![actor.employee_id];
        if scope == Scope::Team {
            if let Some(org) = actor.organization_id {
                ids.extend(self.access.team_members(actor.employee_id, org).await?);
            }
        }
        debug!(employee_id = actor.employee_id, %scope, visible = ids.len(), "Resolved visibility");
        Ok(Visibility::Employees(ids))
    }

    /// Permission OR direct-report membership.
    pub(crate) async fn can_approve_for(
        &self,
        actor: &Principal,
        organization_id: u64,
        target_employee_id: u64,
    ) -> Result<bool, AttendanceError> {
        if self
            .access
            .has_permission(
                actor.employee_id,
                organization_id,
                Permission::AttendanceApproveRegularization,
            )
            .await?
        {
            return Ok(true);
        }
        let team = self
            .access
            .team_members(actor.employee_id, organization_id)
            .await?;
        Ok(team.contains(&target_employee_id))
    }
}
