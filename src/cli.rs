//! # ROTATECTL CLI
//!
//! Operator tool for the PostgreSQL secret rotator.
//!
//! Runs the same step logic as the Lambda handler from a workstation, which is
//! useful for resuming a rotation that stalled or for checking a secret before
//! enabling rotation.
//!
//! ## Usage
//!
//! ```bash
//! # Show which version holds which stage label
//! rotatectl stages --secret-id prod/app/postgres
//!
//! # Validate the current version and try to log in with it
//! rotatectl validate --secret-id prod/app/postgres --connect
//!
//! # Run one rotation step by hand
//! rotatectl step --secret-id prod/app/postgres --token 7c4a... --step set-secret
//!
//! # Run all four steps in order for a staged token
//! rotatectl rotate --secret-id prod/app/postgres --token 7c4a...
//! ```

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};

use pg_secret_rotator::database::{get_connection, ConnectOutcome, DatabaseSession, PgConnector};
use pg_secret_rotator::observability::init_tracing;
use pg_secret_rotator::password::PasswordPolicy;
use pg_secret_rotator::provider::aws::AwsSecretsManager;
use pg_secret_rotator::provider::{SecretStore, VersionStage};
use pg_secret_rotator::secret::SecretRecord;
use pg_secret_rotator::{RotationConfig, RotationEvent, RotationStep, Rotator};

/// PostgreSQL secret rotator CLI
#[derive(Parser)]
#[command(name = "rotatectl")]
#[command(
    about = "Inspect and drive PostgreSQL password rotation in AWS Secrets Manager",
    long_about = None,
    after_help = "\
Examples:
  rotatectl stages --secret-id prod/app/postgres
  rotatectl validate --secret-id prod/app/postgres --stage pending --connect
  rotatectl step --secret-id prod/app/postgres --token <version-id> --step finish-secret
"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Secrets Manager endpoint override (defaults to SECRETS_MANAGER_ENDPOINT)
    #[arg(long, global = true)]
    endpoint: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one rotation step
    Step {
        /// Secret name or ARN
        #[arg(long)]
        secret_id: String,

        /// Client request token (the version being rotated in)
        #[arg(long)]
        token: String,

        #[arg(long, value_enum)]
        step: StepArg,
    },
    /// Run createSecret, setSecret, testSecret and finishSecret in order
    ///
    /// Stops at the first failing step. Completed steps are no-ops when re-run.
    Rotate {
        /// Secret name or ARN
        #[arg(long)]
        secret_id: String,

        /// Client request token already staged as AWSPENDING
        #[arg(long)]
        token: String,
    },
    /// List versions and their stage labels
    Stages {
        /// Secret name or ARN
        #[arg(long)]
        secret_id: String,
    },
    /// Fetch a version and check it against the secret schema
    Validate {
        /// Secret name or ARN
        #[arg(long)]
        secret_id: String,

        #[arg(long, value_enum, default_value = "current")]
        stage: StageArg,

        /// Specific version id (pending is usually addressed by token)
        #[arg(long)]
        version_id: Option<String>,

        /// Also log into the database with the credential
        #[arg(long)]
        connect: bool,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum StepArg {
    #[value(name = "create-secret", alias = "createSecret")]
    CreateSecret,
    #[value(name = "set-secret", alias = "setSecret")]
    SetSecret,
    #[value(name = "test-secret", alias = "testSecret")]
    TestSecret,
    #[value(name = "finish-secret", alias = "finishSecret")]
    FinishSecret,
}

impl From<StepArg> for RotationStep {
    fn from(step: StepArg) -> Self {
        match step {
            StepArg::CreateSecret => RotationStep::CreateSecret,
            StepArg::SetSecret => RotationStep::SetSecret,
            StepArg::TestSecret => RotationStep::TestSecret,
            StepArg::FinishSecret => RotationStep::FinishSecret,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum StageArg {
    Current,
    Pending,
    Previous,
}

impl From<StageArg> for VersionStage {
    fn from(stage: StageArg) -> Self {
        match stage {
            StageArg::Current => VersionStage::Current,
            StageArg::Pending => VersionStage::Pending,
            StageArg::Previous => VersionStage::Previous,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Must run before the database connector negotiates TLS
    if rustls::crypto::ring::default_provider()
        .install_default()
        .is_err()
    {
        eprintln!("rustls crypto provider already installed");
    }

    let cli = Cli::parse();

    let mut config = RotationConfig::from_env();
    if let Some(endpoint) = cli.endpoint {
        config.secrets_manager_endpoint = Some(endpoint);
    }
    init_tracing(config.log_format)?;

    let store = AwsSecretsManager::new(&config)
        .await
        .context("Failed to create Secrets Manager client. Ensure AWS credentials are configured.")?;

    match cli.command {
        Commands::Step {
            secret_id,
            token,
            step,
        } => {
            let rotator = rotator_for(store, &config);
            run_step(&rotator, &secret_id, &token, step.into()).await
        }
        Commands::Rotate { secret_id, token } => {
            let rotator = rotator_for(store, &config);
            for step in RotationStep::ALL {
                run_step(&rotator, &secret_id, &token, step).await?;
            }
            println!();
            println!("✅ Rotation of {secret_id} finished");
            Ok(())
        }
        Commands::Stages { secret_id } => stages_command(&store, &secret_id).await,
        Commands::Validate {
            secret_id,
            stage,
            version_id,
            connect,
        } => {
            validate_command(
                &store,
                &config,
                &secret_id,
                stage.into(),
                version_id.as_deref(),
                connect,
            )
            .await
        }
    }
}

fn rotator_for(
    store: AwsSecretsManager,
    config: &RotationConfig,
) -> Rotator<AwsSecretsManager, PgConnector> {
    Rotator::new(
        store,
        PgConnector::from_config(config),
        PasswordPolicy::from_config(config),
    )
}

async fn run_step(
    rotator: &Rotator<AwsSecretsManager, PgConnector>,
    secret_id: &str,
    token: &str,
    step: RotationStep,
) -> Result<()> {
    let event = RotationEvent {
        secret_id: secret_id.to_string(),
        client_request_token: token.to_string(),
        step: step.as_str().to_string(),
    };

    println!("🔄 Running {step} for {secret_id}");
    println!("   Version: {token}");

    let outcome = rotator
        .handle(&event)
        .await
        .with_context(|| format!("{step} failed for secret {secret_id}"))?;

    if outcome.is_mutation() {
        println!("   ✅ {step} completed ({outcome})");
    } else {
        println!("   ✅ Nothing to do ({outcome})");
    }
    Ok(())
}

/// Version ids and labels only; secret values are never fetched
async fn stages_command(store: &AwsSecretsManager, secret_id: &str) -> Result<()> {
    let metadata = store.describe_secret(secret_id).await?;

    let rotation = match metadata.rotation_enabled {
        Some(true) => "enabled",
        Some(false) => "disabled",
        None => "not reported",
    };
    println!("📋 Secret: {secret_id}");
    println!("   Rotation: {rotation}");

    if metadata.version_ids_to_stages.is_empty() {
        println!("   No versions found");
        return Ok(());
    }

    let mut versions: Vec<_> = metadata.version_ids_to_stages.iter().collect();
    versions.sort_by(|a, b| a.0.cmp(b.0));

    println!();
    println!("{:<40} STAGES", "VERSION");
    for (version, stages) in versions {
        println!("{version:<40} {}", stages.join(", "));
    }
    Ok(())
}

async fn validate_command(
    store: &AwsSecretsManager,
    config: &RotationConfig,
    secret_id: &str,
    stage: VersionStage,
    version_id: Option<&str>,
    connect: bool,
) -> Result<()> {
    let raw = store
        .get_secret_value(secret_id, stage, version_id)
        .await?
        .ok_or_else(|| anyhow::anyhow!("Secret '{secret_id}' has no {stage} version"))?;
    let record = SecretRecord::parse(&raw)?;

    println!("🔍 {stage} version of {secret_id}");
    println!("   ✅ Schema valid");
    println!("   Engine:   {}", record.engine());
    println!("   Host:     {}:{}", record.host(), record.port());
    println!("   Database: {}", record.dbname());
    println!("   Username: {}", record.username());
    let policy = record.ssl_policy();
    println!(
        "   TLS:      {}",
        match (policy.required, policy.fallback) {
            (true, true) => "required, plaintext fallback allowed",
            (true, false) => "required",
            (false, _) => "disabled",
        }
    );

    if !connect {
        return Ok(());
    }

    let connector = PgConnector::from_config(config);
    match get_connection(&connector, &record).await {
        ConnectOutcome::Connected(mut session) => {
            let result = session.check().await;
            session.close().await;
            result?;
            println!("   ✅ Logged in and ran test query");
            Ok(())
        }
        ConnectOutcome::Failed(failure) => Err(anyhow::anyhow!(
            "Unable to log into {}:{} as {}: {}",
            record.host(),
            record.port(),
            record.username(),
            failure.message
        )),
    }
}
