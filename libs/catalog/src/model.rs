//! Wire models for the management API. Field names follow the service's
//! camelCase JSON; fields this tool does not interpret are carried opaquely.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A catalog as returned by the listing endpoint. Only the name matters to
/// the provisioning flow; everything else rides along untouched.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Catalog {
    pub name: String,
    #[serde(flatten, default)]
    pub properties: Map<String, Value>,
}

impl Catalog {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            properties: Map::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Principal {
    pub name: String,
    #[serde(rename = "clientId", default, skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,
}

impl Principal {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            client_id: None,
        }
    }
}

/// The credential pair is returned exactly once, at principal creation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PrincipalCredentials {
    #[serde(rename = "clientId")]
    pub client_id: String,
    #[serde(rename = "clientSecret")]
    pub client_secret: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PrincipalWithCredentials {
    pub principal: Principal,
    pub credentials: PrincipalCredentials,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PrincipalRole {
    pub name: String,
}

impl PrincipalRole {
    pub fn named(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CatalogRole {
    pub name: String,
}

impl CatalogRole {
    pub fn named(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn principal_with_credentials_decodes_service_response() {
        let raw = r#"{
            "principal": {"name": "omnipotent-principal", "clientId": "abc123"},
            "credentials": {"clientId": "abc123", "clientSecret": "shhh"}
        }"#;

        let decoded: PrincipalWithCredentials = serde_json::from_str(raw).expect("decode");
        assert_eq!(decoded.principal.name, "omnipotent-principal");
        assert_eq!(decoded.credentials.client_id, "abc123");
        assert_eq!(decoded.credentials.client_secret, "shhh");
    }

    #[test]
    fn catalog_keeps_unknown_fields_opaque() {
        let raw = r#"{"name": "analytics", "type": "INTERNAL", "properties": {"default-base-location": "s3://x"}}"#;

        let decoded: Catalog = serde_json::from_str(raw).expect("decode");
        assert_eq!(decoded.name, "analytics");
        assert_eq!(decoded.properties["type"], "INTERNAL");

        let round_tripped = serde_json::to_value(&decoded).expect("encode");
        assert_eq!(round_tripped["properties"]["default-base-location"], "s3://x");
    }

    #[test]
    fn principal_without_client_id_omits_the_field() {
        let encoded = serde_json::to_string(&Principal::named("p")).expect("encode");
        assert_eq!(encoded, r#"{"name":"p"}"#);
    }
}
