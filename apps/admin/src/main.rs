//! `icesync-admin`: creates the omnipotent principal, its principal role,
//! and a catalog role with grants for every catalog on one endpoint.
//!
//! Exit code 0 means the bootstrap succeeded, even when some catalogs failed
//! (those are reported, not fatal); exit code 1 means the bootstrap itself
//! failed and nothing was fanned out.

use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use tracing::{error, info, warn};

use icesync_auth::{ConnectionProperties, CredentialSession};
use icesync_catalog::{PrincipalWithCredentials, RestAccessControl};
use icesync_provision::{ProvisionSettings, provision};

#[derive(Parser, Debug)]
#[command(
    name = "icesync-admin",
    version,
    about = "Creates a principal, associated principal role, and a catalog role for each catalog with appropriate access permissions."
)]
struct Cli {
    /// Connection properties for the catalog-management API (repeatable).
    /// Recognized keys: base-url, oauth2-server-uri, client-id,
    /// client-secret, bearer-token (alias: token), scope. Unrecognized keys
    /// pass through to the service layer.
    #[arg(
        long = "api-properties",
        value_name = "KEY=VALUE",
        value_parser = parse_key_value,
        required = true
    )]
    api_properties: Vec<(String, String)>,

    /// Overwrite the existing omnipotent principal and associated entities
    /// if they exist.
    #[arg(long)]
    replace: bool,

    /// Create the principal with write access to every catalog. Required if
    /// this endpoint is the target of a sync.
    #[arg(long = "write-access")]
    write_access: bool,

    /// Number of concurrent workers used to set up catalog roles.
    #[arg(long, default_value_t = 1, allow_negative_numbers = true)]
    concurrency: i64,
}

fn parse_key_value(raw: &str) -> Result<(String, String), String> {
    raw.split_once('=')
        .map(|(key, value)| (key.trim().to_string(), value.to_string()))
        .filter(|(key, _)| !key.is_empty())
        .ok_or_else(|| format!("expected KEY=VALUE, got `{raw}`"))
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    run(Cli::parse()).await
}

async fn run(cli: Cli) -> ExitCode {
    let mut properties = ConnectionProperties::from_pairs(cli.api_properties.clone());
    // The access level travels with the connection properties as opaque
    // pass-through data for the service layer.
    properties.insert_if_absent("write-access", cli.write_access.to_string());

    let session = match CredentialSession::open(&properties).await {
        Ok(session) => Arc::new(session),
        Err(err) => {
            error!(error = %err, "failed to open authenticated session");
            return ExitCode::FAILURE;
        }
    };

    let code = bootstrap(&cli, &properties, Arc::clone(&session)).await;

    // Released exactly once, on every exit path.
    session.close();
    code
}

async fn bootstrap(
    cli: &Cli,
    properties: &ConnectionProperties,
    session: Arc<CredentialSession>,
) -> ExitCode {
    let client = match RestAccessControl::from_properties(properties, session) {
        Ok(client) => Arc::new(client),
        Err(err) => {
            error!(error = %err, "failed to construct catalog service client");
            return ExitCode::FAILURE;
        }
    };

    let settings = ProvisionSettings {
        replace: cli.replace,
        write_access: cli.write_access,
        concurrency: cli.concurrency,
    };

    let outcome = match provision(client, &settings).await {
        Ok(outcome) => outcome,
        Err(err) => {
            error!(error = %err, "failed to bootstrap omnipotent principal");
            return ExitCode::FAILURE;
        }
    };

    if outcome.failures.is_empty() {
        info!(
            total = outcome.total,
            succeeded = outcome.succeeded,
            "finished omnipotent principal setup for all catalogs"
        );
    } else {
        warn!(
            total = outcome.total,
            succeeded = outcome.succeeded,
            failed = ?outcome.failed_catalogs(),
            "encountered issues creating catalog roles for some catalogs"
        );
    }

    // Disclosed exactly once, only after a successful bootstrap.
    print_credentials(&outcome.credentials);
    ExitCode::SUCCESS
}

fn print_credentials(credentials: &PrincipalWithCredentials) {
    println!("======================================================");
    println!("Omnipotent Principal Credentials:");
    println!("\tname = {}", credentials.principal.name);
    println!("\tclientId = {}", credentials.credentials.client_id);
    println!("\tclientSecret = {}", credentials.credentials.client_secret);
    println!("======================================================");
}
