//! Command-line interface definitions for the `gatewright` binary.
//!
//! The parser lives here so the build script can render the manual page from
//! the same definitions the binary uses.

use clap::Parser;

/// Top-level CLI for the `gatewright` binary.
#[derive(Debug, Parser)]
#[command(
    name = "gatewright",
    about = "Provision an OAuth-protected MCP gateway with a Lambda tool target on AWS",
    arg_required_else_help = true
)]
pub(crate) enum Cli {
    /// Create the authorizer, gateway and target, resuming from the checkpoint.
    #[command(
        name = "provision",
        about = "Create the authorizer, gateway and target, resuming from the checkpoint"
    )]
    Provision(ProvisionCommand),
    /// Delete every recorded resource and discard the checkpoint.
    #[command(
        name = "teardown",
        about = "Delete every recorded resource and discard the checkpoint"
    )]
    Teardown,
    /// Print what the checkpoint records without calling AWS.
    #[command(name = "status", about = "Print what the checkpoint records without calling AWS")]
    Status,
    /// List the tools exposed by the gateway, optionally calling the cost tool.
    #[command(
        name = "tools",
        about = "List the tools exposed by the gateway, optionally calling the cost tool"
    )]
    Tools(ToolsCommand),
}

/// Arguments for the `gatewright provision` subcommand.
#[derive(Debug, Parser)]
pub(crate) struct ProvisionCommand {
    /// Function ARN to bind to the target instead of the stack output.
    #[arg(long, value_name = "ARN")]
    pub(crate) lambda_arn: Option<String>,
    /// Tear down recorded resources and recreate everything.
    #[arg(long)]
    pub(crate) force: bool,
}

/// Arguments for the `gatewright tools` subcommand.
#[derive(Debug, Parser)]
pub(crate) struct ToolsCommand {
    /// Architecture to price with the cost estimation tool.
    #[arg(long, value_name = "TEXT")]
    pub(crate) architecture: Option<String>,
}
