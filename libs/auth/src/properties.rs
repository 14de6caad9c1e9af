use std::collections::HashMap;

use crate::error::AuthError;

/// Root address of the catalog service.
pub const PROP_BASE_URL: &str = "base-url";
/// Token-issuing endpoint; presence enables OAuth2 flows.
pub const PROP_OAUTH2_SERVER_URI: &str = "oauth2-server-uri";
/// Client id half of the client-credentials pair.
pub const PROP_CLIENT_ID: &str = "client-id";
/// Client secret half of the client-credentials pair.
pub const PROP_CLIENT_SECRET: &str = "client-secret";
/// Static bearer token; used when no client-credentials pair is supplied.
pub const PROP_BEARER_TOKEN: &str = "bearer-token";
/// Accepted alias for [`PROP_BEARER_TOKEN`].
pub const PROP_TOKEN: &str = "token";
/// OAuth2 scope requested during token exchange.
pub const PROP_SCOPE: &str = "scope";

/// String-keyed configuration for one catalog-service endpoint.
///
/// The session layer only interprets the keys named by the `PROP_*`
/// constants; every other entry is opaque pass-through data for whichever
/// collaborator receives the properties next.
#[derive(Debug, Clone, Default)]
pub struct ConnectionProperties {
    entries: HashMap<String, String>,
}

impl ConnectionProperties {
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            entries: pairs
                .into_iter()
                .map(|(key, value)| (key.into(), value.into()))
                .collect(),
        }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(String::as_str)
    }

    /// Inserts `value` under `key` unless the caller already supplied one.
    pub fn insert_if_absent(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.entries.entry(key.into()).or_insert_with(|| value.into());
    }

    pub fn base_url(&self) -> Option<&str> {
        self.get(PROP_BASE_URL)
    }

    pub fn oauth2_server_uri(&self) -> Option<&str> {
        self.get(PROP_OAUTH2_SERVER_URI)
    }

    pub fn scope(&self) -> Option<&str> {
        self.get(PROP_SCOPE)
    }

    /// Selects the authentication flow the supplied properties describe.
    ///
    /// The client-credentials pair wins over a bearer token when both are
    /// present; neither present is a hard construction error.
    pub fn auth_flow(&self) -> Result<AuthFlow, AuthError> {
        if let (Some(client_id), Some(client_secret)) =
            (self.get(PROP_CLIENT_ID), self.get(PROP_CLIENT_SECRET))
        {
            return Ok(AuthFlow::ClientCredentials {
                client_id: client_id.to_string(),
                client_secret: client_secret.to_string(),
            });
        }

        if let Some(token) = self.get(PROP_BEARER_TOKEN).or_else(|| self.get(PROP_TOKEN)) {
            return Ok(AuthFlow::StaticToken(token.to_string()));
        }

        Err(AuthError::MissingCredentials)
    }
}

/// Closed set of supported authentication flows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthFlow {
    ClientCredentials {
        client_id: String,
        client_secret: String,
    },
    StaticToken(String),
}
