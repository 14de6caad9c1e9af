//! Entity models and the access-control client used to provision principals,
//! roles, and grants against a catalog-management REST API.

mod access;
mod error;
mod model;
mod rest;

pub use access::{
    AccessControl, OMNIPOTENT_CATALOG_ROLE, OMNIPOTENT_PRINCIPAL, OMNIPOTENT_PRINCIPAL_ROLE,
    grant_privileges,
};
pub use error::ApiError;
pub use model::{
    Catalog, CatalogRole, Principal, PrincipalCredentials, PrincipalRole, PrincipalWithCredentials,
};
pub use rest::{ApiRequest, ApiResponse, HttpTransport, ReqwestTransport, RestAccessControl};
