//! Connection properties and bearer-credential sessions for talking to a
//! catalog-management service.

mod error;
pub mod form;
mod properties;
mod session;

pub use error::AuthError;
pub use properties::{
    AuthFlow, ConnectionProperties, PROP_BASE_URL, PROP_BEARER_TOKEN, PROP_CLIENT_ID,
    PROP_CLIENT_SECRET, PROP_OAUTH2_SERVER_URI, PROP_SCOPE, PROP_TOKEN,
};
pub use session::{
    CredentialSession, ReqwestTokenTransport, TokenGrant, TokenRequest, TokenTransport,
};
