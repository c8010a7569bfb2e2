//! # PostgreSQL Secret Rotator
//!
//! Lambda entry point. Each invocation runs exactly one rotation step and
//! returns an empty result on success. Failures are returned to the runtime,
//! which reports them to Secrets Manager so the step is retried.

use std::sync::Arc;

use lambda_runtime::{service_fn, Error, LambdaEvent};
use tracing::{debug, info, info_span, Instrument};

use pg_secret_rotator::database::PgConnector;
use pg_secret_rotator::observability::init_tracing;
use pg_secret_rotator::password::PasswordPolicy;
use pg_secret_rotator::provider::aws::AwsSecretsManager;
use pg_secret_rotator::{RotationConfig, RotationEvent, Rotator};

#[tokio::main]
async fn main() -> Result<(), Error> {
    // Must run before any TLS connection is attempted
    if rustls::crypto::ring::default_provider()
        .install_default()
        .is_err()
    {
        debug!("rustls crypto provider already installed");
    }

    let config = RotationConfig::from_env();
    init_tracing(config.log_format)?;

    info!(
        version = env!("CARGO_PKG_VERSION"),
        git_hash = env!("BUILD_GIT_HASH"),
        build_time = env!("BUILD_DATETIME"),
        "Starting PostgreSQL secret rotation handler"
    );
    debug!(?config, "Loaded rotation configuration");

    let store = AwsSecretsManager::new(&config).await?;
    let connector = PgConnector::from_config(&config);
    let rotator = Arc::new(Rotator::new(
        store,
        connector,
        PasswordPolicy::from_config(&config),
    ));

    lambda_runtime::run(service_fn(move |event: LambdaEvent<RotationEvent>| {
        let rotator = Arc::clone(&rotator);
        let span = info_span!("invocation", request_id = %event.context.request_id);
        async move {
            rotator
                .handle(&event.payload)
                .await
                .map(|_| ())
                .map_err(Error::from)
        }
        .instrument(span)
    }))
    .await
}
