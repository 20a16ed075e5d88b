//! Binary entry point for the gatewright CLI.

use std::io::{self, Write};
use std::process;

use camino::Utf8PathBuf;
use clap::Parser;
use serde_json::json;
use thiserror::Error;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use gatewright::{
    AwsControlPlane, AwsError, Checkpoint, CheckpointStore, ClientCredentials, CognitoTokenClient,
    ConfigError, ConfigStoreError, DiscoveryProbe, GatewayClient, GatewayClientError,
    ProvisionError, ProvisionSummary, Provisioner, ProvisionerConfig, ProvisioningStep,
    StepAction, TeardownCoordinator, TeardownReport, TokenCache, TokenError, TokenSource,
    ToolDescriptor,
    find_tool,
};

mod cli;

use cli::{Cli, ProvisionCommand, ToolsCommand};

#[derive(Debug, Error)]
enum CliError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
    #[error("AWS error: {0}")]
    Aws(#[from] AwsError),
    #[error("provisioning failed: {0}")]
    Provision(#[from] Box<ProvisionError<AwsError>>),
    #[error("checkpoint error: {0}")]
    Checkpoint(#[from] ConfigStoreError),
    #[error("no gateway recorded in {0}; run `gatewright provision` first")]
    NotProvisioned(Utf8PathBuf),
    #[error("teardown could not remove {0} resource(s); see warnings above")]
    TeardownIncomplete(usize),
    #[error("gateway does not list the cost estimation tool; the target may still be syncing")]
    ToolMissing,
    #[error("token error: {0}")]
    Token(#[from] TokenError),
    #[error("gateway error: {0}")]
    Gateway(#[from] GatewayClientError),
    #[error("failed to write output: {0}")]
    Output(#[from] io::Error),
}

#[tokio::main]
async fn main() {
    init_tracing();
    let cli = Cli::parse();
    let exit_code = match dispatch(cli).await {
        Ok(code) => code,
        Err(err) => {
            error!("❌ {err}");
            report_error(&err);
            1
        }
    };

    process::exit(exit_code);
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .init();
}

async fn dispatch(cli: Cli) -> Result<i32, CliError> {
    match cli {
        Cli::Provision(command) => provision(command).await,
        Cli::Teardown => teardown().await,
        Cli::Status => status(),
        Cli::Tools(command) => tools(command).await,
    }
}

async fn provision(command: ProvisionCommand) -> Result<i32, CliError> {
    let config = ProvisionerConfig::load_without_cli_args()?;
    let settings = config.provision_settings(command.lambda_arn)?;
    let control = AwsControlPlane::from_env(&settings.region).await?;
    let provisioner = Provisioner::new(
        control,
        config.checkpoint_store(),
        DiscoveryProbe::new(),
        settings,
    );

    let summary = provisioner
        .provision(command.force)
        .await
        .map_err(Box::new)?;
    write_summary(io::stdout(), &summary)?;
    info!("Next step: run `gatewright tools` to call the gateway");
    Ok(0)
}

async fn teardown() -> Result<i32, CliError> {
    let config = ProvisionerConfig::load_without_cli_args()?;
    let store = config.checkpoint_store();
    let checkpoint = match store.load() {
        Ok(checkpoint) => checkpoint,
        Err(err) if err.is_not_found() => {
            info!("No checkpoint at {}; nothing to tear down", store.path());
            return Ok(0);
        }
        Err(err) => return Err(err.into()),
    };

    let region = match checkpoint.region.clone() {
        Some(region) => region,
        None => config.require_region()?,
    };
    let control = AwsControlPlane::from_env(&region).await?;
    let coordinator =
        TeardownCoordinator::new(&control, &store, config.resource_server_id.clone());
    let report = coordinator.teardown(&checkpoint).await;
    write_teardown(io::stdout(), &report)?;

    if report.is_clean() {
        Ok(0)
    } else {
        Err(CliError::TeardownIncomplete(report.failures.len()))
    }
}

fn status() -> Result<i32, CliError> {
    let config = ProvisionerConfig::load_without_cli_args()?;
    let store = config.checkpoint_store();
    match store.load() {
        Ok(checkpoint) => write_status(io::stdout(), &checkpoint)?,
        Err(err) if err.is_not_found() => {
            writeln!(io::stdout(), "No checkpoint found at {}", store.path())?;
        }
        Err(err) => return Err(err.into()),
    }
    Ok(0)
}

async fn tools(command: ToolsCommand) -> Result<i32, CliError> {
    let config = ProvisionerConfig::load_without_cli_args()?;
    let store = config.checkpoint_store();
    let not_provisioned = || CliError::NotProvisioned(store.path().to_path_buf());
    let checkpoint = match store.load() {
        Ok(checkpoint) => checkpoint,
        Err(err) if err.is_not_found() => return Err(not_provisioned()),
        Err(err) => return Err(err.into()),
    };
    let cognito = checkpoint.cognito.as_ref().ok_or_else(not_provisioned)?;
    let gateway = checkpoint.gateway().ok_or_else(not_provisioned)?;

    let source = CognitoTokenClient::new(ClientCredentials::from(cognito));
    let gateway_client = GatewayClient::new(gateway.url);
    exercise_gateway(
        &TokenCache::default(),
        &config.credential_provider_name,
        &source,
        &gateway_client,
        command.architecture.as_deref(),
        io::stdout(),
    )
    .await?;
    Ok(0)
}

// The listing and the call share `cache`, so the call reuses the token.
async fn exercise_gateway<T: TokenSource>(
    cache: &TokenCache,
    provider: &str,
    source: &T,
    client: &GatewayClient,
    architecture: Option<&str>,
    mut out: impl Write,
) -> Result<(), CliError> {
    let token = cache.token(provider, source).await?;
    let listed = client.list_tools(&token).await?;
    write_tools(&mut out, &listed)?;

    let Some(architecture) = architecture else {
        if find_tool(&listed).is_none() {
            warn!("⚠️ Cost estimation tool not listed; the target may still be syncing");
        }
        return Ok(());
    };
    let tool = find_tool(&listed).ok_or(CliError::ToolMissing)?;
    let token = cache.token(provider, source).await?;
    let answer = client
        .call_tool(
            &token,
            &tool.name,
            json!({ "architecture_description": architecture }),
        )
        .await?;
    writeln!(out, "{answer}")?;
    Ok(())
}

fn write_summary(mut out: impl Write, summary: &ProvisionSummary) -> io::Result<()> {
    if summary.already_configured {
        writeln!(out, "All components already configured (use --force to recreate)")?;
    }
    for report in &summary.steps {
        let action = match report.action {
            StepAction::Created => "created",
            StepAction::Reused => "reused",
        };
        writeln!(out, "{:<10} {action}", report.step.name())?;
    }
    writeln!(out, "gateway_id   {}", summary.gateway.id)?;
    writeln!(out, "gateway_url  {}", summary.gateway.url)?;
    writeln!(out, "target_id    {}", summary.target_id)?;
    writeln!(out, "client_id    {}", summary.client_id)?;
    writeln!(out, "checkpoint   {}", summary.checkpoint_path)?;
    if summary.discovery_ready == Some(false) {
        writeln!(out, "discovery    not ready yet")?;
    }
    Ok(())
}

fn write_status(mut out: impl Write, checkpoint: &Checkpoint) -> io::Result<()> {
    for step in ProvisioningStep::ALL {
        let state = if step.is_satisfied(checkpoint) {
            "recorded"
        } else {
            "missing"
        };
        writeln!(out, "{:<10} {state}", step.name())?;
    }
    if let Some(gateway) = checkpoint.gateway() {
        writeln!(out, "gateway_url  {}", gateway.url)?;
    }
    if let Some(arn) = &checkpoint.lambda_arn {
        writeln!(out, "lambda_arn   {arn}")?;
    }
    if let Some(region) = &checkpoint.region {
        writeln!(out, "region       {region}")?;
    }
    Ok(())
}

fn write_teardown(mut out: impl Write, report: &TeardownReport) -> io::Result<()> {
    for resource in &report.deleted {
        writeln!(out, "deleted  {resource}")?;
    }
    for failure in &report.failures {
        writeln!(out, "failed   {}: {}", failure.resource, failure.message)?;
    }
    if report.checkpoint_removed {
        writeln!(out, "checkpoint removed")?;
    }
    Ok(())
}

fn write_tools(mut out: impl Write, tools: &[ToolDescriptor]) -> io::Result<()> {
    for tool in tools {
        match &tool.description {
            Some(description) => writeln!(out, "{}  {description}", tool.name)?,
            None => writeln!(out, "{}", tool.name)?,
        }
    }
    Ok(())
}

fn report_error(err: &CliError) {
    write_error(io::stderr(), err);
}

fn write_error(mut target: impl Write, err: &CliError) {
    writeln!(target, "{err}").ok();
}
