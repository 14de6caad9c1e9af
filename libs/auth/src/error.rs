use thiserror::Error;

/// Failures raised while constructing a credential session.
///
/// Session construction is fatal-on-error: nothing here is retried
/// internally, the caller decides whether to retry or abort startup.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error(
        "unable to construct an authenticated session: provide either `client-id`/`client-secret` or `bearer-token`"
    )]
    MissingCredentials,

    #[error("`oauth2-server-uri` is required for the client-credentials flow")]
    MissingTokenEndpoint,

    #[error("invalid `oauth2-server-uri`: {0}")]
    InvalidTokenEndpoint(#[source] url::ParseError),

    #[error("token exchange failed: {0}")]
    Exchange(#[source] anyhow::Error),
}
