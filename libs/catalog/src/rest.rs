use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use reqwest::{Method, StatusCode, Url};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::debug;

use icesync_auth::{ConnectionProperties, CredentialSession};

use crate::access::{
    AccessControl, OMNIPOTENT_CATALOG_ROLE, OMNIPOTENT_PRINCIPAL, OMNIPOTENT_PRINCIPAL_ROLE,
    grant_privileges,
};
use crate::error::ApiError;
use crate::model::{Catalog, CatalogRole, Principal, PrincipalRole, PrincipalWithCredentials};

const MANAGEMENT_PREFIX: &str = "api/management/v1/";

#[derive(serde::Deserialize)]
struct CatalogListResponse {
    catalogs: Vec<Catalog>,
}

#[derive(Serialize)]
struct CreatePrincipalRequest<'a> {
    principal: &'a Principal,
}

#[derive(Serialize)]
struct PrincipalRoleBody<'a> {
    #[serde(rename = "principalRole")]
    principal_role: &'a PrincipalRole,
}

#[derive(Serialize)]
struct CatalogRoleBody<'a> {
    #[serde(rename = "catalogRole")]
    catalog_role: &'a CatalogRole,
}

#[derive(Serialize)]
struct GrantBody<'a> {
    grant: Grant<'a>,
}

#[derive(Serialize)]
#[serde(tag = "type", rename = "catalog")]
struct Grant<'a> {
    privilege: &'a str,
}

/// One request against the management API, already carrying the session's
/// header snapshot.
#[derive(Debug, Clone)]
pub struct ApiRequest {
    pub method: Method,
    pub url: Url,
    pub headers: HashMap<String, String>,
    pub body: Option<serde_json::Value>,
}

#[derive(Debug, Clone)]
pub struct ApiResponse {
    pub status: StatusCode,
    pub body: Vec<u8>,
}

/// Wire seam under [`RestAccessControl`].
#[async_trait]
pub trait HttpTransport: Send + Sync {
    async fn execute(&self, request: ApiRequest) -> Result<ApiResponse, ApiError>;
}

/// [`HttpTransport`] over a `reqwest` client.
#[derive(Clone, Default)]
pub struct ReqwestTransport {
    http: reqwest::Client,
}

impl ReqwestTransport {
    pub fn new(http: reqwest::Client) -> Self {
        Self { http }
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn execute(&self, request: ApiRequest) -> Result<ApiResponse, ApiError> {
        let mut builder = self.http.request(request.method, request.url);
        for (name, value) in &request.headers {
            builder = builder.header(name, value);
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let response = builder
            .send()
            .await
            .map_err(|err| ApiError::Transport(anyhow::Error::new(err)))?;
        let status = response.status();
        let body = response
            .bytes()
            .await
            .map_err(|err| ApiError::Transport(anyhow::Error::new(err)))?
            .to_vec();
        Ok(ApiResponse { status, body })
    }
}

/// [`AccessControl`] over the management REST API.
///
/// Every request carries the credential session's current header snapshot,
/// so an autonomous token refresh is picked up by the next call.
pub struct RestAccessControl<T: HttpTransport = ReqwestTransport> {
    transport: T,
    base: Url,
    session: Arc<CredentialSession>,
}

impl RestAccessControl<ReqwestTransport> {
    pub fn new(http: reqwest::Client, base: Url, session: Arc<CredentialSession>) -> Self {
        Self::with_transport(ReqwestTransport::new(http), base, session)
    }

    pub fn from_properties(
        properties: &ConnectionProperties,
        session: Arc<CredentialSession>,
    ) -> Result<Self, ApiError> {
        let base = properties.base_url().ok_or(ApiError::MissingBaseUrl)?;
        let base = Url::parse(base).map_err(ApiError::InvalidBaseUrl)?;
        Ok(Self::new(reqwest::Client::new(), base, session))
    }
}

impl<T: HttpTransport> RestAccessControl<T> {
    pub fn with_transport(transport: T, base: Url, session: Arc<CredentialSession>) -> Self {
        Self {
            transport,
            base: normalize_base(base),
            session,
        }
    }

    fn endpoint(&self, path: &str) -> Result<Url, ApiError> {
        self.base
            .join(&format!("{MANAGEMENT_PREFIX}{path}"))
            .map_err(ApiError::InvalidBaseUrl)
    }

    async fn send(
        &self,
        method: Method,
        path: &str,
        body: Option<serde_json::Value>,
    ) -> Result<ApiResponse, ApiError> {
        let request = ApiRequest {
            method,
            url: self.endpoint(path)?,
            headers: self.session.headers(),
            body,
        };
        self.transport.execute(request).await
    }

    /// Replace semantics: delete the existing entity if present, treating a
    /// 404 as "nothing to replace".
    async fn delete_if_exists(
        &self,
        path: &str,
        entity: &'static str,
        name: &str,
    ) -> Result<(), ApiError> {
        let response = self.send(Method::DELETE, path, None).await?;
        if response.status == StatusCode::NOT_FOUND {
            debug!(entity, name, "nothing to replace");
            return Ok(());
        }
        expect_success(response, entity, name).map(drop)
    }
}

fn normalize_base(mut base: Url) -> Url {
    if !base.path().ends_with('/') {
        let path = format!("{}/", base.path());
        base.set_path(&path);
    }
    base
}

fn json_body<B: Serialize>(body: &B) -> Result<Option<serde_json::Value>, ApiError> {
    serde_json::to_value(body).map(Some).map_err(ApiError::Encode)
}

/// Maps a non-success response to a typed error; 409 becomes the
/// name-collision variant so callers can distinguish "already provisioned".
fn expect_success(
    response: ApiResponse,
    entity: &'static str,
    name: &str,
) -> Result<ApiResponse, ApiError> {
    if response.status.is_success() {
        return Ok(response);
    }
    if response.status == StatusCode::CONFLICT {
        return Err(ApiError::Conflict {
            entity,
            name: name.to_string(),
        });
    }
    Err(ApiError::Status {
        status: response.status,
        body: String::from_utf8_lossy(&response.body).into_owned(),
    })
}

fn decode<T: DeserializeOwned>(response: ApiResponse) -> Result<T, ApiError> {
    serde_json::from_slice(&response.body).map_err(ApiError::Decode)
}

#[async_trait]
impl<T: HttpTransport> AccessControl for RestAccessControl<T> {
    async fn list_catalogs(&self) -> Result<Vec<Catalog>, ApiError> {
        let response = self.send(Method::GET, "catalogs", None).await?;
        let response = expect_success(response, "catalog listing", "catalogs")?;
        let list: CatalogListResponse = decode(response)?;
        Ok(list.catalogs)
    }

    async fn create_omnipotent_principal(
        &self,
        replace: bool,
    ) -> Result<PrincipalWithCredentials, ApiError> {
        if replace {
            self.delete_if_exists(
                &format!("principals/{OMNIPOTENT_PRINCIPAL}"),
                "principal",
                OMNIPOTENT_PRINCIPAL,
            )
            .await?;
        }

        let principal = Principal::named(OMNIPOTENT_PRINCIPAL);
        let response = self
            .send(
                Method::POST,
                "principals",
                json_body(&CreatePrincipalRequest {
                    principal: &principal,
                })?,
            )
            .await?;
        let response = expect_success(response, "principal", OMNIPOTENT_PRINCIPAL)?;
        decode(response)
    }

    async fn create_and_assign_principal_role(
        &self,
        principal: &Principal,
        replace: bool,
    ) -> Result<PrincipalRole, ApiError> {
        if replace {
            self.delete_if_exists(
                &format!("principal-roles/{OMNIPOTENT_PRINCIPAL_ROLE}"),
                "principal role",
                OMNIPOTENT_PRINCIPAL_ROLE,
            )
            .await?;
        }

        let role = PrincipalRole::named(OMNIPOTENT_PRINCIPAL_ROLE);
        let body = json_body(&PrincipalRoleBody {
            principal_role: &role,
        })?;

        let response = self
            .send(Method::POST, "principal-roles", body.clone())
            .await?;
        expect_success(response, "principal role", OMNIPOTENT_PRINCIPAL_ROLE)?;

        let response = self
            .send(
                Method::PUT,
                &format!("principals/{}/principal-roles", principal.name),
                body,
            )
            .await?;
        expect_success(response, "principal role assignment", &principal.name)?;

        Ok(role)
    }

    async fn setup_role_for_catalog(
        &self,
        catalog_name: &str,
        principal_role: &PrincipalRole,
        replace: bool,
        write_access: bool,
    ) -> Result<(), ApiError> {
        let role = CatalogRole::named(OMNIPOTENT_CATALOG_ROLE);
        let role_path = format!("catalogs/{catalog_name}/catalog-roles/{OMNIPOTENT_CATALOG_ROLE}");
        let role_body = json_body(&CatalogRoleBody {
            catalog_role: &role,
        })?;

        if replace {
            self.delete_if_exists(&role_path, "catalog role", OMNIPOTENT_CATALOG_ROLE)
                .await?;
        }

        let response = self
            .send(
                Method::POST,
                &format!("catalogs/{catalog_name}/catalog-roles"),
                role_body.clone(),
            )
            .await?;
        expect_success(response, "catalog role", OMNIPOTENT_CATALOG_ROLE)?;

        for privilege in grant_privileges(write_access).iter().copied() {
            let response = self
                .send(
                    Method::PUT,
                    &format!("{role_path}/grants"),
                    json_body(&GrantBody {
                        grant: Grant { privilege },
                    })?,
                )
                .await?;
            expect_success(response, "grant", privilege)?;
        }

        let response = self
            .send(
                Method::PUT,
                &format!(
                    "principal-roles/{}/catalog-roles/{catalog_name}",
                    principal_role.name
                ),
                role_body,
            )
            .await?;
        expect_success(response, "catalog role assignment", catalog_name)?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::Mutex;

    use super::*;

    #[derive(Default)]
    struct MockTransport {
        responses: Mutex<VecDeque<ApiResponse>>,
        requests: Mutex<Vec<(Method, String)>>,
        captured_headers: Mutex<Vec<HashMap<String, String>>>,
    }

    impl MockTransport {
        fn with_responses(responses: Vec<ApiResponse>) -> Arc<Self> {
            Arc::new(Self {
                responses: Mutex::new(responses.into()),
                ..Self::default()
            })
        }

        fn requests(&self) -> Vec<(Method, String)> {
            self.requests.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl HttpTransport for Arc<MockTransport> {
        async fn execute(&self, request: ApiRequest) -> Result<ApiResponse, ApiError> {
            self.requests
                .lock()
                .unwrap()
                .push((request.method.clone(), request.url.to_string()));
            self.captured_headers.lock().unwrap().push(request.headers);
            Ok(self
                .responses
                .lock()
                .unwrap()
                .pop_front()
                .expect("no response queued for request"))
        }
    }

    fn response(status: u16, body: &str) -> ApiResponse {
        ApiResponse {
            status: StatusCode::from_u16(status).expect("status"),
            body: body.as_bytes().to_vec(),
        }
    }

    const CREDENTIALS_BODY: &str = r#"{
        "principal": {"name": "omnipotent-principal", "clientId": "abc123"},
        "credentials": {"clientId": "abc123", "clientSecret": "shhh"}
    }"#;

    async fn client(transport: Arc<MockTransport>) -> RestAccessControl<Arc<MockTransport>> {
        let properties = ConnectionProperties::from_pairs([("bearer-token", "abc")]);
        let session = Arc::new(
            CredentialSession::open(&properties)
                .await
                .expect("session"),
        );
        RestAccessControl::with_transport(
            transport,
            Url::parse("http://localhost:8181").expect("url"),
            session,
        )
    }

    #[tokio::test]
    async fn replace_deletes_the_existing_principal_before_creating() {
        let transport = MockTransport::with_responses(vec![
            response(204, ""),
            response(201, CREDENTIALS_BODY),
        ]);
        let client = client(transport.clone()).await;

        let created = client
            .create_omnipotent_principal(true)
            .await
            .expect("created");

        assert_eq!(created.credentials.client_secret, "shhh");
        assert_eq!(
            transport.requests(),
            vec![
                (
                    Method::DELETE,
                    "http://localhost:8181/api/management/v1/principals/omnipotent-principal"
                        .to_string()
                ),
                (
                    Method::POST,
                    "http://localhost:8181/api/management/v1/principals".to_string()
                ),
            ]
        );
    }

    #[tokio::test]
    async fn replace_treats_a_missing_principal_as_nothing_to_replace() {
        let transport = MockTransport::with_responses(vec![
            response(404, "no such principal"),
            response(201, CREDENTIALS_BODY),
        ]);
        let client = client(transport.clone()).await;

        let created = client
            .create_omnipotent_principal(true)
            .await
            .expect("404 on delete must not fail the replace");

        assert_eq!(created.principal.name, "omnipotent-principal");
        assert_eq!(transport.requests().len(), 2);
    }

    #[tokio::test]
    async fn without_replace_no_delete_is_issued_and_conflicts_surface() {
        let transport = MockTransport::with_responses(vec![response(409, "")]);
        let client = client(transport.clone()).await;

        let err = client
            .create_omnipotent_principal(false)
            .await
            .expect_err("conflict");

        assert!(matches!(
            err,
            ApiError::Conflict {
                entity: "principal",
                ..
            }
        ));
        let requests = transport.requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].0, Method::POST);
    }

    #[tokio::test]
    async fn catalog_role_setup_grants_then_assigns() {
        let transport = MockTransport::with_responses(vec![
            response(201, ""),
            response(200, ""),
            response(200, ""),
            response(200, ""),
        ]);
        let client = client(transport.clone()).await;
        let role = PrincipalRole::named(OMNIPOTENT_PRINCIPAL_ROLE);

        client
            .setup_role_for_catalog("analytics", &role, false, false)
            .await
            .expect("setup");

        let requests = transport.requests();
        let base = "http://localhost:8181/api/management/v1";
        assert_eq!(
            requests,
            vec![
                (
                    Method::POST,
                    format!("{base}/catalogs/analytics/catalog-roles")
                ),
                (
                    Method::PUT,
                    format!("{base}/catalogs/analytics/catalog-roles/omnipotent-catalog-role/grants")
                ),
                (
                    Method::PUT,
                    format!("{base}/catalogs/analytics/catalog-roles/omnipotent-catalog-role/grants")
                ),
                (
                    Method::PUT,
                    format!("{base}/principal-roles/omnipotent-principal-role/catalog-roles/analytics")
                ),
            ]
        );
    }

    #[tokio::test]
    async fn catalog_role_replace_deletes_first_and_write_access_grants_once() {
        let transport = MockTransport::with_responses(vec![
            response(404, ""),
            response(201, ""),
            response(200, ""),
            response(200, ""),
        ]);
        let client = client(transport.clone()).await;
        let role = PrincipalRole::named(OMNIPOTENT_PRINCIPAL_ROLE);

        client
            .setup_role_for_catalog("analytics", &role, true, true)
            .await
            .expect("setup");

        let requests = transport.requests();
        assert_eq!(requests.len(), 4);
        assert_eq!(requests[0].0, Method::DELETE);
        assert!(requests[0].1.ends_with("catalog-roles/omnipotent-catalog-role"));
    }

    #[tokio::test]
    async fn requests_carry_the_session_header_snapshot() {
        let transport =
            MockTransport::with_responses(vec![response(200, r#"{"catalogs":[{"name":"a"}]}"#)]);
        let client = client(transport.clone()).await;

        let catalogs = client.list_catalogs().await.expect("catalogs");

        assert_eq!(catalogs.len(), 1);
        assert_eq!(catalogs[0].name, "a");
        let headers = transport.captured_headers.lock().unwrap();
        assert_eq!(
            headers[0].get("Authorization").map(String::as_str),
            Some("Bearer abc")
        );
    }

    #[tokio::test]
    async fn conflict_maps_to_name_collision() {
        let err = expect_success(response(409, ""), "principal", "omnipotent-principal")
            .expect_err("conflict");
        match err {
            ApiError::Conflict { entity, name } => {
                assert_eq!(entity, "principal");
                assert_eq!(name, "omnipotent-principal");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn other_failures_carry_status_and_body() {
        let err = expect_success(response(503, "overloaded"), "grant", "TABLE_READ_DATA")
            .expect_err("failure");
        match err {
            ApiError::Status { status, body } => {
                assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
                assert_eq!(body, "overloaded");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn endpoints_resolve_under_the_management_prefix() {
        let base = normalize_base(Url::parse("http://localhost:8181").expect("url"));
        assert_eq!(
            base.join(&format!("{MANAGEMENT_PREFIX}catalogs")).expect("join").as_str(),
            "http://localhost:8181/api/management/v1/catalogs"
        );
    }

    #[test]
    fn base_url_without_trailing_slash_keeps_its_path() {
        let base = normalize_base(Url::parse("http://localhost:8181/catalog").expect("url"));
        assert_eq!(
            base.join(&format!("{MANAGEMENT_PREFIX}principals")).expect("join").as_str(),
            "http://localhost:8181/catalog/api/management/v1/principals"
        );
    }

    #[test]
    fn grant_body_encodes_tagged_catalog_grant() {
        let body = serde_json::to_value(GrantBody {
            grant: Grant {
                privilege: "CATALOG_MANAGE_CONTENT",
            },
        })
        .expect("encode");
        assert_eq!(body["grant"]["type"], "catalog");
        assert_eq!(body["grant"]["privilege"], "CATALOG_MANAGE_CONTENT");
    }
}
