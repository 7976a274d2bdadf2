//! Tx Risk Gate - validate one unsigned transaction before signing
//!
//! Usage:
//!   tx_risk_gate <tx.json> [--threshold <level>] [--no-simulate]
//!
//! The file holds either the raw transaction object or
//! `{ "tx": {...}, "intent": {...} }`.
//!
//! Environment:
//!   FLARE_NETWORK, FLARE_RPC_URL, RISK_THRESHOLD, TENDERLY_*, PRICE_API_*
//!   RUST_LOG - Log level (default: info)
//!
//! Exit codes: 0 valid, 2 rejected, 1 error.

use eyre::{eyre, Result, WrapErr};
use serde::Deserialize;
use tracing::info;
use tracing_subscriber::{EnvFilter, FmtSubscriber};
use tx_risk_gate::utils::constants::{APP_NAME, APP_VERSION};
use tx_risk_gate::{GuardConfig, RiskLevel, TradeIntent, TransactionValidator, TxRequest, ValidationRequest};

/// Exit code for a rejected transaction
const EXIT_REJECTED: i32 = 2;

#[derive(Debug)]
struct CliArgs {
    path: String,
    threshold: Option<RiskLevel>,
    simulate: bool,
}

#[derive(Deserialize)]
struct WrappedInput {
    tx: TxRequest,
    #[serde(default)]
    intent: Option<TradeIntent>,
}

/// Accepts the raw transaction object or `{ "tx": ..., "intent": ... }`
fn parse_input(raw: &str) -> Result<(TxRequest, Option<TradeIntent>)> {
    let value: serde_json::Value = serde_json::from_str(raw).wrap_err("parsing transaction JSON")?;
    if value.get("tx").is_some() {
        let input: WrappedInput = serde_json::from_value(value).wrap_err("parsing wrapped transaction")?;
        Ok((input.tx, input.intent))
    } else {
        let tx: TxRequest = serde_json::from_value(value).wrap_err("parsing transaction")?;
        Ok((tx, None))
    }
}

fn usage() -> String {
    "usage: tx_risk_gate <tx.json> [--threshold <low|medium|high|critical>] [--no-simulate]".to_string()
}

fn parse_args(mut args: impl Iterator<Item = String>) -> Result<CliArgs> {
    let mut path = None;
    let mut threshold = None;
    let mut simulate = true;

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--threshold" => {
                let value = args.next().ok_or_else(|| eyre!("--threshold needs a value\n{}", usage()))?;
                threshold = Some(value.parse::<RiskLevel>().map_err(|e| eyre!("{}", e))?);
            }
            "--no-simulate" => simulate = false,
            "-h" | "--help" => return Err(eyre!(usage())),
            other if other.starts_with("--") => return Err(eyre!("unknown flag {}\n{}", other, usage())),
            other => path = Some(other.to_string()),
        }
    }

    Ok(CliArgs {
        path: path.ok_or_else(|| eyre!(usage()))?,
        threshold,
        simulate,
    })
}

#[tokio::main]
async fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .compact()
        .init();

    let args = parse_args(std::env::args().skip(1))?;
    info!("🛡️ {} v{}", APP_NAME, APP_VERSION);

    let raw = tokio::fs::read_to_string(&args.path)
        .await
        .wrap_err_with(|| format!("reading {}", args.path))?;
    let (tx, intent) = parse_input(&raw)?;

    let mut config = GuardConfig::default();
    if let Some(threshold) = args.threshold {
        config.risk_threshold = threshold;
    }

    let validator = TransactionValidator::from_config(&config).map_err(|e| eyre!("{}", e))?;

    let mut request = ValidationRequest::new(tx);
    request.simulate = args.simulate;
    request.intent = intent;

    let verdict = validator.validate_with(request).await.map_err(|e| eyre!("{}", e))?;
    println!("{}", serde_json::to_string_pretty(&verdict)?);

    if !verdict.valid {
        std::process::exit(EXIT_REJECTED);
    }
    Ok(())
}
