use std::{path::Path, sync::Arc};

use alloy_primitives::Address;
use anyhow::{anyhow, Context, Result};
use clap::{Args, Parser, Subcommand};
use pragma_delegation_encoder::{
    build_delegation, encoding::parse_address, parse_native_amount, typed_data::delegation_digest,
    DelegationParams,
};
use pragma_delegation_types::resolve_protocols;
use pragma_session::{
    config::{expand_path, DEFAULT_API_BASE, DEFAULT_CONFIG_PATH, DEFAULT_SESSION_KEY_PATH},
    flow::{RequestDelegationParams, RequestIdParams, Selection, SetupSessionParams},
    Clock, DelegationError, DelegationFlow, HttpApprovalApi, SessionKeyStore, SystemClock,
};
use serde_json::{json, Value};
use tracing::debug;
use tracing_subscriber::EnvFilter;

/// Drive the Pragma delegation approval flow from a terminal.
///
/// Results are printed as JSON on stdout; logs go to stderr (`RUST_LOG` controls verbosity).
#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Cli {
    /// Session key file.
    #[arg(long, env = "PRAGMA_SESSION_KEY_PATH", default_value = DEFAULT_SESSION_KEY_PATH, global = true)]
    session_key_path: String,

    /// Shared local config file (also read by the tool server).
    #[arg(long, env = "PRAGMA_CONFIG_PATH", default_value = DEFAULT_CONFIG_PATH, global = true)]
    config_path: String,

    /// Base URL of the delegation approval API.
    #[arg(long, env = "PRAGMA_API_BASE", default_value = DEFAULT_API_BASE, global = true)]
    api_base: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Create the session key if needed and, given --sa, register it.
    SetupSession {
        /// Smart account address (0x...).
        #[arg(long)]
        sa: Option<String>,
        #[arg(long)]
        label: Option<String>,
        #[arg(long)]
        agent_type: Option<String>,
    },
    /// Build a delegation for the session key and submit it for approval.
    Request(RequestArgs),
    /// Show the status of a delegation request.
    Poll { request_id: String },
    /// Store the signed delegation of an approved request next to the session key.
    Retrieve { request_id: String },
    /// Build a delegation offline and print both forms with the EIP-712 digest.
    Build(BuildArgs),
}

#[derive(Args, Debug)]
struct ScopeArgs {
    /// Protocols to allow (dex, leverup, nadfun, wmon). Default: all.
    #[arg(long, value_delimiter = ',')]
    protocols: Vec<String>,

    #[arg(long, default_value_t = 7)]
    expiry_days: u64,

    #[arg(long, default_value_t = 100)]
    max_calls: u64,

    /// Native value ceiling per transaction, in MON.
    #[arg(long, default_value_t = 1.0)]
    max_value_per_tx_mon: f64,

    /// Leave out the transfer groups.
    #[arg(long)]
    no_transfers: bool,

    /// Transfer recipient (repeatable). Default: the session key.
    #[arg(long = "recipient")]
    recipients: Vec<String>,
}

#[derive(Args, Debug)]
struct RequestArgs {
    /// Smart account address (0x...).
    #[arg(long)]
    sa: String,

    #[command(flatten)]
    scope: ScopeArgs,

    /// Off-chain budget in USD.
    #[arg(long)]
    budget_usd: Option<f64>,

    /// Gas budget in MON.
    #[arg(long)]
    budget_mon: Option<f64>,

    /// Allowed tokens. Default: all.
    #[arg(long = "token")]
    tokens: Vec<String>,

    #[arg(long)]
    agent_id: Option<String>,

    #[arg(long)]
    description: Option<String>,
}

#[derive(Args, Debug)]
struct BuildArgs {
    /// Smart account address (0x...).
    #[arg(long)]
    sa: String,

    /// Delegate address. Default: the stored session key.
    #[arg(long)]
    session_key: Option<String>,

    #[command(flatten)]
    scope: ScopeArgs,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let output = run(&cli).await?;
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

async fn run(cli: &Cli) -> Result<Value> {
    let value = match &cli.command {
        Command::SetupSession { sa, label, agent_type } => {
            let params = SetupSessionParams { sa: sa.clone(), label: label.clone(), agent_type: agent_type.clone() };
            serde_json::to_value(flow(cli)?.setup_session(params).await.map_err(report)?)?
        }
        Command::Request(args) => {
            let params = request_params(args);
            serde_json::to_value(flow(cli)?.request_delegation(params).await.map_err(report)?)?
        }
        Command::Poll { request_id } => {
            let params = RequestIdParams { request_id: Some(request_id.clone()) };
            serde_json::to_value(flow(cli)?.poll_delegation(params).await.map_err(report)?)?
        }
        Command::Retrieve { request_id } => {
            let params = RequestIdParams { request_id: Some(request_id.clone()) };
            serde_json::to_value(flow(cli)?.retrieve_delegation(params).await.map_err(report)?)?
        }
        Command::Build(args) => build_offline(args, &expand_path(&cli.session_key_path))?,
    };
    Ok(value)
}

fn flow(cli: &Cli) -> Result<DelegationFlow> {
    let api = HttpApprovalApi::new(&cli.api_base).map_err(report)?;
    debug!(api_base = %api.base_url(), "using approval API");
    Ok(DelegationFlow::new(
        Arc::new(api),
        expand_path(&cli.session_key_path),
        expand_path(&cli.config_path),
    ))
}

fn request_params(args: &RequestArgs) -> RequestDelegationParams {
    RequestDelegationParams {
        sa: Some(args.sa.clone()),
        protocols: (!args.scope.protocols.is_empty()).then(|| Selection::List(args.scope.protocols.clone())),
        expiry_days: Some(args.scope.expiry_days),
        max_calls: Some(args.scope.max_calls),
        max_value_per_tx_mon: Some(args.scope.max_value_per_tx_mon),
        budget_usd: args.budget_usd,
        budget_mon: args.budget_mon,
        allowed_tokens: (!args.tokens.is_empty()).then(|| Selection::List(args.tokens.clone())),
        agent_id: args.agent_id.clone(),
        description: args.description.clone(),
        enable_transfers: Some(!args.scope.no_transfers),
        transfer_recipients: (!args.scope.recipients.is_empty()).then(|| args.scope.recipients.clone()),
    }
}

fn build_offline(args: &BuildArgs, session_key_path: &Path) -> Result<Value> {
    let delegator = parse_address(&args.sa)?;
    let delegate: Address = match &args.session_key {
        Some(s) => parse_address(s)?,
        None => {
            SessionKeyStore::new(session_key_path)
                .load()
                .context("no --session-key given and no stored session key")?
                .address
        }
    };
    let recipients = args
        .scope
        .recipients
        .iter()
        .map(|r| parse_address(r))
        .collect::<Result<Vec<_>, _>>()?;

    let params = DelegationParams {
        protocols: resolve_protocols(&args.scope.protocols),
        expiry_days: args.scope.expiry_days,
        max_calls: args.scope.max_calls,
        max_value_per_tx: parse_native_amount(args.scope.max_value_per_tx_mon)?,
        enable_transfers: !args.scope.no_transfers,
        transfer_recipients: (!recipients.is_empty()).then_some(recipients),
        ..DelegationParams::new(delegator, delegate)
    };
    let built = build_delegation(&params, SystemClock.unix_seconds())?;

    Ok(json!({
        "unsignedDelegation": built.unsigned,
        "typedData": built.typed_data,
        "digest": delegation_digest(&built.typed_data),
        "protocols": built.protocols,
        "expiresAt": built.expires_at,
    }))
}

/// Keep the stable error code visible in the CLI's error output.
fn report(e: DelegationError) -> anyhow::Error {
    anyhow!("{}: {e}", e.code())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_flags_map_to_params() {
        let cli = Cli::try_parse_from([
            "pragma",
            "request",
            "--sa",
            "0x1111111111111111111111111111111111111111",
            "--protocols",
            "dex,wmon",
            "--no-transfers",
            "--token",
            "USDC",
        ])
        .unwrap();
        let Command::Request(args) = &cli.command else { panic!("expected request") };
        let params = request_params(args);

        assert_eq!(params.protocols, Some(Selection::List(vec!["dex".into(), "wmon".into()])));
        assert_eq!(params.enable_transfers, Some(false));
        assert_eq!(params.expiry_days, Some(7));
        assert_eq!(params.allowed_tokens, Some(Selection::List(vec!["USDC".into()])));
        assert_eq!(params.transfer_recipients, None);
    }

    #[test]
    fn build_is_offline_with_explicit_delegate() {
        let cli = Cli::try_parse_from([
            "pragma",
            "build",
            "--sa",
            "0x1111111111111111111111111111111111111111",
            "--session-key",
            "0x2222222222222222222222222222222222222222",
            "--protocols",
            "nadfun",
        ])
        .unwrap();
        let Command::Build(args) = &cli.command else { panic!("expected build") };
        let out = build_offline(args, Path::new("/nonexistent/session-key.json")).unwrap();

        assert_eq!(out["protocols"], json!(["nadfun"]));
        assert_eq!(out["typedData"]["primaryType"], "Delegation");
        assert_eq!(out["digest"].as_str().map(str::len), Some(66));
    }
}
