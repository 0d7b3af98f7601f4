//! Elefantpay operation runner
//!
//! Runs one named operation against the configured store:
//!
//! ```text
//! elefantpay [--env dev] [--init-schema] <Operation> < request.json > response.json
//! ```
//!
//! The request is a JSON object `{path, query, headers, body}`; the response
//! `{status, headers, body}` is printed to stdout. Logs go to the configured
//! file and stderr. A fatal store error exits with status 2.

use std::io::Read;

use anyhow::{Context, bail};

use elefantpay::api::{self, AppContext, Request, registry};
use elefantpay::config::AppConfig;
use elefantpay::db::{Database, schema};

// ============================================================
// ARGUMENTS
// ============================================================

struct Args {
    env: String,
    init_schema: bool,
    operation: Option<String>,
}

fn parse_args() -> anyhow::Result<Args> {
    let mut args = Args {
        env: "dev".to_string(),
        init_schema: false,
        operation: None,
    };

    let mut iter = std::env::args().skip(1);
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--env" | "-e" => {
                args.env = iter.next().context("--env requires a value")?;
            }
            "--init-schema" => args.init_schema = true,
            "--list" => {
                for name in registry::names() {
                    println!("{}", name);
                }
                std::process::exit(0);
            }
            other if other.starts_with('-') => bail!("Unknown option {}", other),
            other => {
                if args.operation.is_some() {
                    bail!("Only one operation per run, got extra argument {}", other);
                }
                args.operation = Some(other.to_string());
            }
        }
    }
    Ok(args)
}

// ============================================================
// MAIN
// ============================================================

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = parse_args()?;

    // Unknown operation names fail before anything else is touched
    let operation = match &args.operation {
        Some(name) => Some(registry::create(name)?),
        None => None,
    };

    let config = AppConfig::load(&args.env)?;
    let log_guard = elefantpay::logging::init_logging(&config);
    tracing::info!(
        build = env!("ELEFANT_BUILD"),
        env = %args.env,
        "Starting elefantpay"
    );

    let db = Database::connect(
        &config.database.url,
        config.database.max_connections,
        config.acquire_timeout(),
    )
    .await
    .context("Failed to connect to PostgreSQL")?;

    if args.init_schema {
        schema::init_schema(db.pool())
            .await
            .context("Failed to initialize schema")?;
        tracing::info!("Schema initialized");
    }

    let Some(operation) = operation else {
        if !args.init_schema {
            bail!("No operation given, see --list");
        }
        return Ok(());
    };

    let mut input = String::new();
    std::io::stdin()
        .read_to_string(&mut input)
        .context("Failed to read request from stdin")?;
    let request: Request = if input.trim().is_empty() {
        Request::default()
    } else {
        serde_json::from_str(&input).context("Request is not valid JSON")?
    };

    let ctx = AppContext::new(config, db)?;
    match api::dispatch(&ctx, operation.as_ref(), request).await {
        Ok(response) => {
            println!("{}", serde_json::to_string_pretty(&response)?);
            Ok(())
        }
        Err(e) => {
            tracing::error!(error = %e, "Fatal error, stopping");
            eprintln!("fatal: {}", e);
            drop(log_guard);
            std::process::exit(2);
        }
    }
}
