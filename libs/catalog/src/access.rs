use async_trait::async_trait;

use crate::error::ApiError;
use crate::model::{Catalog, Principal, PrincipalRole, PrincipalWithCredentials};

/// Fixed name of the administrative principal. Fixed names make a re-run
/// without `--replace` fail deterministically on the name collision.
pub const OMNIPOTENT_PRINCIPAL: &str = "omnipotent-principal";
/// Principal-role assigned to the omnipotent principal.
pub const OMNIPOTENT_PRINCIPAL_ROLE: &str = "omnipotent-principal-role";
/// Per-catalog role name; catalog-roles are scoped to their catalog, so the
/// same name is reused in every catalog.
pub const OMNIPOTENT_CATALOG_ROLE: &str = "omnipotent-catalog-role";

/// Catalog-level privileges granted to the omnipotent catalog-role.
pub fn grant_privileges(write_access: bool) -> &'static [&'static str] {
    if write_access {
        &["CATALOG_MANAGE_CONTENT"]
    } else {
        &["TABLE_READ_DATA", "VIEW_READ_PROPERTIES"]
    }
}

/// Capability surface over the catalog-management service consumed by the
/// provisioning orchestrator.
///
/// Every call is network-bound and may fail independently; implementations
/// do not retry internally.
#[async_trait]
pub trait AccessControl: Send + Sync {
    /// Enumerates all catalogs visible at the time of the call.
    async fn list_catalogs(&self) -> Result<Vec<Catalog>, ApiError>;

    /// Creates the omnipotent principal and returns its one-time credential
    /// pair. With `replace`, an existing principal of the same name is
    /// deleted first; without it, a name collision is an error.
    async fn create_omnipotent_principal(
        &self,
        replace: bool,
    ) -> Result<PrincipalWithCredentials, ApiError>;

    /// Creates the omnipotent principal-role and assigns it to `principal`.
    async fn create_and_assign_principal_role(
        &self,
        principal: &Principal,
        replace: bool,
    ) -> Result<PrincipalRole, ApiError>;

    /// Creates the per-catalog catalog-role, adds its grants, and assigns it
    /// to `principal_role`.
    async fn setup_role_for_catalog(
        &self,
        catalog_name: &str,
        principal_role: &PrincipalRole,
        replace: bool,
        write_access: bool,
    ) -> Result<(), ApiError>;
}
