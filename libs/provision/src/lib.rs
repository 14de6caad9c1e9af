//! Concurrent provisioning of the omnipotent principal's per-catalog roles.
//!
//! The bootstrap phase (principal, then principal-role) is sequential and
//! fail-fast; the per-catalog phase fans out across a fixed-size worker pool
//! and aggregates failures instead of aborting the batch.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use thiserror::Error;
use tokio::sync::Mutex;
use tokio::task::JoinSet;
use tracing::{info, warn};

use icesync_catalog::{AccessControl, ApiError, Catalog, PrincipalRole, PrincipalWithCredentials};

/// Caller-supplied knobs for one provisioning run.
#[derive(Debug, Clone)]
pub struct ProvisionSettings {
    /// Delete and recreate entities that already exist instead of failing.
    pub replace: bool,
    /// Grant write access to every catalog instead of read access.
    pub write_access: bool,
    /// Number of parallel catalog-setup workers; must be at least 1,
    /// validated by [`provision`].
    pub concurrency: i64,
}

impl Default for ProvisionSettings {
    fn default() -> Self {
        Self {
            replace: false,
            write_access: false,
            concurrency: 1,
        }
    }
}

/// One catalog whose setup failed, with the error that stopped it.
#[derive(Debug)]
pub struct CatalogFailure {
    pub catalog: String,
    pub error: ApiError,
}

/// Aggregate result of one run. Only constructed after every worker has
/// finished; there is no partial view.
#[derive(Debug)]
pub struct ProvisioningOutcome {
    /// One-time credentials of the freshly created principal.
    pub credentials: PrincipalWithCredentials,
    /// Catalogs attempted (the full enumeration).
    pub total: usize,
    /// Catalogs fully set up; always `total - failures.len()`.
    pub succeeded: usize,
    /// Failed catalogs, in no particular order.
    pub failures: Vec<CatalogFailure>,
}

impl ProvisioningOutcome {
    pub fn failed_catalogs(&self) -> Vec<&str> {
        self.failures
            .iter()
            .map(|failure| failure.catalog.as_str())
            .collect()
    }
}

/// Fatal errors from the sequential phases. Any of these aborts the run
/// before (or without) fan-out and maps to a non-zero exit code.
#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error("concurrency must be at least 1, got {0}")]
    InvalidConcurrency(i64),

    #[error("failed to create omnipotent principal: {0}")]
    Principal(#[source] ApiError),

    #[error("failed to create omnipotent principal role and assign it to the principal: {0}")]
    PrincipalRole(#[source] ApiError),

    #[error("failed to list catalogs: {0}")]
    ListCatalogs(#[source] ApiError),
}

/// Runs the full provisioning sequence: principal → principal-role →
/// enumeration → bounded fan-out → join.
///
/// Per-catalog failures are aggregated into the outcome, never escalated;
/// only the sequential phases are fatal.
pub async fn provision(
    client: Arc<dyn AccessControl>,
    settings: &ProvisionSettings,
) -> Result<ProvisioningOutcome, BootstrapError> {
    if settings.concurrency < 1 {
        return Err(BootstrapError::InvalidConcurrency(settings.concurrency));
    }

    // Each bootstrap step is a hard dependency of the next; no parallelism here.
    let credentials = client
        .create_omnipotent_principal(settings.replace)
        .await
        .map_err(BootstrapError::Principal)?;
    info!(principal = %credentials.principal.name, "created omnipotent principal");

    let principal_role = client
        .create_and_assign_principal_role(&credentials.principal, settings.replace)
        .await
        .map_err(BootstrapError::PrincipalRole)?;
    info!(
        role = %principal_role.name,
        principal = %credentials.principal.name,
        "created omnipotent principal role and assigned it to the principal"
    );

    // Enumerated once; catalogs created mid-run are not part of this batch.
    let catalogs = client
        .list_catalogs()
        .await
        .map_err(BootstrapError::ListCatalogs)?;
    let total = catalogs.len();
    info!(total, "identified catalogs to create catalog roles for");

    let failures = run_fanout(client, settings, principal_role, catalogs).await;
    let succeeded = total - failures.len();

    Ok(ProvisioningOutcome {
        credentials,
        total,
        succeeded,
        failures,
    })
}

/// Fixed pool of `concurrency` workers pulling catalogs off a shared queue.
/// Returns only after every submitted catalog has been attempted.
async fn run_fanout(
    client: Arc<dyn AccessControl>,
    settings: &ProvisionSettings,
    principal_role: PrincipalRole,
    catalogs: Vec<Catalog>,
) -> Vec<CatalogFailure> {
    let total = catalogs.len();
    let queue = Arc::new(Mutex::new(catalogs.into_iter()));
    // Counts attempts (success and failure alike) so progress lines stay
    // monotonic; the outcome derives success counts separately.
    let attempted = Arc::new(AtomicUsize::new(0));
    let failures = Arc::new(Mutex::new(Vec::new()));
    let access = if settings.write_access { "write" } else { "read" };

    let workers = (settings.concurrency as usize).min(total.max(1));
    let mut pool = JoinSet::new();
    for _ in 0..workers {
        let client = Arc::clone(&client);
        let queue = Arc::clone(&queue);
        let attempted = Arc::clone(&attempted);
        let failures = Arc::clone(&failures);
        let role = principal_role.clone();
        let replace = settings.replace;
        let write_access = settings.write_access;

        pool.spawn(async move {
            loop {
                // The guard is dropped before the setup call; the queue lock
                // is never held across network IO.
                let next = queue.lock().await.next();
                let Some(catalog) = next else { break };

                match client
                    .setup_role_for_catalog(&catalog.name, &role, replace, write_access)
                    .await
                {
                    Ok(()) => {
                        let done = attempted.fetch_add(1, Ordering::SeqCst) + 1;
                        info!(
                            catalog = %catalog.name,
                            access,
                            progress = %format_args!("{done}/{total}"),
                            "finished omnipotent role setup for catalog"
                        );
                    }
                    Err(error) => {
                        let done = attempted.fetch_add(1, Ordering::SeqCst) + 1;
                        warn!(
                            catalog = %catalog.name,
                            access,
                            progress = %format_args!("{done}/{total}"),
                            error = %error,
                            "failed omnipotent role setup for catalog"
                        );
                        failures.lock().await.push(CatalogFailure {
                            catalog: catalog.name,
                            error,
                        });
                    }
                }
            }
        });
    }

    // No aggregate state is read until every worker has physically finished.
    while let Some(joined) = pool.join_next().await {
        if let Err(err) = joined {
            warn!(error = %err, "provisioning worker aborted");
        }
    }

    let mut failures = failures.lock().await;
    std::mem::take(&mut *failures)
}
