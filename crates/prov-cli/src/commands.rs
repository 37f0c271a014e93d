use std::fs::File;
use std::io::{self, Read};
use std::process::ExitCode;
use std::time::Duration;

use anyhow::Context;
use colored::Colorize;
use prov_anchor::{AnchorReport, AnchorScheduler, ProvenanceService, ServiceConfig};
use prov_crypto::ContentHasher;
use prov_ledger::{LedgerWriteResult, Outcome};
use prov_server::{ProvServer, ServerConfig};
use prov_types::Digest;
use serde::Serialize;
use serde_json::json;
use tokio_util::sync::CancellationToken;

use crate::cli::*;

pub async fn run_command(cli: Cli) -> anyhow::Result<ExitCode> {
    let format = cli.format;
    let config = service_config(&cli)?;
    let service = ProvenanceService::from_config(&config)?;

    match cli.command {
        Command::Hash(args) => cmd_hash(&args, format),
        Command::Sign(args) => cmd_sign(&service, &args, format),
        Command::Verify(args) => cmd_verify(&service, &args, format),
        Command::Pubkey => cmd_pubkey(&service, format),
        Command::PublishPubkey => cmd_publish_pubkey(&service, format).await,
        Command::Ingest(args) => cmd_ingest(&service, &args, format),
        Command::Record(args) => cmd_record(&service, &args, format),
        Command::Root => cmd_root(&service, format),
        Command::Proof(args) => cmd_proof(&service, &args, format),
        Command::Anchor(args) => cmd_anchor(&service, &args, format).await,
        Command::Schedule(args) => cmd_schedule(&service, &args, format).await,
        Command::Serve(args) => cmd_serve(service, &args).await,
    }
}

/// File settings, then `PROV_KEY_PATH`/`PROV_HASH_LOG`, then flags.
pub fn service_config(cli: &Cli) -> anyhow::Result<ServiceConfig> {
    let base = match &cli.ledger_config {
        Some(path) => ServiceConfig::from_toml_file(path)?,
        None => ServiceConfig::default(),
    };
    let mut config = base.with_env_overrides();
    if let Some(path) = &cli.key_path {
        config.key_path = path.clone();
    }
    if let Some(path) = &cli.log_path {
        config.hash_log_path = path.clone();
    }
    Ok(config)
}

pub fn parse_digest_arg(input: &str) -> anyhow::Result<Digest> {
    Digest::from_hex(input).with_context(|| format!("invalid digest {input:?}"))
}

/// Read a file, or stdin for `-`.
pub fn read_input(input: &str) -> anyhow::Result<Vec<u8>> {
    let mut buf = Vec::new();
    if input == "-" {
        io::stdin().lock().read_to_end(&mut buf).context("reading stdin")?;
    } else {
        File::open(input)
            .and_then(|mut f| f.read_to_end(&mut buf))
            .with_context(|| format!("reading {input}"))?;
    }
    Ok(buf)
}

/// Cancelled on Ctrl-C. Aborts pending ledger retry waits and stops the
/// scheduler and server.
fn cancel_on_ctrl_c() -> CancellationToken {
    let token = CancellationToken::new();
    let trigger = token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("interrupt received, cancelling");
            trigger.cancel();
        }
    });
    token
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn cmd_hash(args: &InputArgs, format: OutputFormat) -> anyhow::Result<ExitCode> {
    let digest = if args.input == "-" {
        ContentHasher::hash_reader(io::stdin().lock()).context("reading stdin")?
    } else {
        let file = File::open(&args.input).with_context(|| format!("opening {}", args.input))?;
        ContentHasher::hash_reader(file).with_context(|| format!("reading {}", args.input))?
    };
    match format {
        OutputFormat::Json => print_json(&json!({ "digest": digest }))?,
        OutputFormat::Text => println!("{digest}"),
    }
    Ok(ExitCode::SUCCESS)
}

fn cmd_sign(service: &ProvenanceService, args: &DigestArgs, format: OutputFormat) -> anyhow::Result<ExitCode> {
    let signed = service.sign(&args.digest)?;
    match format {
        OutputFormat::Json => print_json(&signed)?,
        OutputFormat::Text => {
            println!("{}", signed.signature.to_hex());
            println!("  {} {}", "signed at".dimmed(), signed.signed_at.to_rfc3339());
        }
    }
    Ok(ExitCode::SUCCESS)
}

fn cmd_verify(service: &ProvenanceService, args: &VerifyArgs, format: OutputFormat) -> anyhow::Result<ExitCode> {
    let valid = service.verify(&args.digest, &args.signature)?;
    match format {
        OutputFormat::Json => print_json(&json!({ "valid": valid }))?,
        OutputFormat::Text if valid => println!("{} signature valid", "✓".green().bold()),
        OutputFormat::Text => println!("{} signature invalid", "✗".red().bold()),
    }
    Ok(if valid { ExitCode::SUCCESS } else { ExitCode::FAILURE })
}

fn cmd_pubkey(service: &ProvenanceService, format: OutputFormat) -> anyhow::Result<ExitCode> {
    let pem = service.public_key()?;
    match format {
        OutputFormat::Json => print_json(&json!({ "public_pem": pem }))?,
        OutputFormat::Text => print!("{pem}"),
    }
    Ok(ExitCode::SUCCESS)
}

async fn cmd_publish_pubkey(service: &ProvenanceService, format: OutputFormat) -> anyhow::Result<ExitCode> {
    let report = service.publish_public_key(&cancel_on_ctrl_c()).await?;
    match format {
        OutputFormat::Json => print_json(&report)?,
        OutputFormat::Text => {
            print!("{}", report.public_pem);
            print_result(&report.result);
        }
    }
    Ok(exit_for(&report.result))
}

fn cmd_ingest(service: &ProvenanceService, args: &DigestArgs, format: OutputFormat) -> anyhow::Result<ExitCode> {
    let digest = parse_digest_arg(&args.digest)?;
    let appended = service.ingest_digest(digest)?;
    match format {
        OutputFormat::Json => print_json(&json!({ "digest": digest, "appended": appended }))?,
        OutputFormat::Text if appended => println!("{} appended {}", "✓".green(), digest.to_string().yellow()),
        OutputFormat::Text => println!("already logged {}", digest.to_string().yellow()),
    }
    Ok(ExitCode::SUCCESS)
}

fn cmd_record(service: &ProvenanceService, args: &InputArgs, format: OutputFormat) -> anyhow::Result<ExitCode> {
    let content = read_input(&args.input)?;
    let record = service.record_content(&content)?;
    match format {
        OutputFormat::Json => print_json(&record)?,
        OutputFormat::Text => {
            let status = if record.appended { "appended".green() } else { "already logged".normal() };
            println!("{} {}", record.digest.to_string().yellow(), status);
            println!("  {} {}", "signature".dimmed(), record.signature.to_hex());
            println!("  {} {}", "signed at".dimmed(), record.signed_at.to_rfc3339());
        }
    }
    Ok(ExitCode::SUCCESS)
}

fn cmd_root(service: &ProvenanceService, format: OutputFormat) -> anyhow::Result<ExitCode> {
    let summary = service.current_root()?;
    match format {
        OutputFormat::Json => print_json(&summary)?,
        OutputFormat::Text => match summary.root {
            Some(root) => println!("{} ({} leaves)", root.to_string().yellow(), summary.leaf_count),
            None => println!("hash log is empty"),
        },
    }
    Ok(ExitCode::SUCCESS)
}

fn cmd_proof(service: &ProvenanceService, args: &DigestArgs, format: OutputFormat) -> anyhow::Result<ExitCode> {
    let Some(proof) = service.inclusion_proof(&args.digest)? else {
        eprintln!("{} digest is not in the hash log", "✗".red());
        return Ok(ExitCode::FAILURE);
    };
    match format {
        OutputFormat::Json => print_json(&proof)?,
        OutputFormat::Text => {
            println!("leaf {}", proof.leaf.to_string().yellow());
            for step in &proof.path {
                println!("  {:<5} {}", format!("{:?}", step.side).to_lowercase(), step.sibling);
            }
            println!("root {}", proof.root.to_string().yellow());
        }
    }
    Ok(ExitCode::SUCCESS)
}

async fn cmd_anchor(service: &ProvenanceService, args: &AnchorArgs, format: OutputFormat) -> anyhow::Result<ExitCode> {
    let report = service
        .anchor(args.batch_id.as_deref(), &cancel_on_ctrl_c())
        .await?;
    match format {
        OutputFormat::Json => print_json(&report)?,
        OutputFormat::Text => print_report(&report),
    }
    Ok(exit_for(&report.result))
}

async fn cmd_schedule(service: &ProvenanceService, args: &ScheduleArgs, format: OutputFormat) -> anyhow::Result<ExitCode> {
    let scheduler = AnchorScheduler::new(
        service.coordinator(),
        Duration::from_secs(args.interval),
        args.runs,
    )?;
    let summary = scheduler.run(cancel_on_ctrl_c()).await;
    match format {
        OutputFormat::Json => print_json(&summary)?,
        OutputFormat::Text => {
            println!(
                "{} runs: {} succeeded, {} dry run, {} failed{}",
                summary.runs,
                summary.succeeded.to_string().green(),
                summary.dry_runs,
                summary.failed.to_string().red(),
                if summary.cancelled { " (interrupted)" } else { "" }
            );
        }
    }
    Ok(ExitCode::SUCCESS)
}

async fn cmd_serve(service: ProvenanceService, args: &ServeArgs) -> anyhow::Result<ExitCode> {
    let config = ServerConfig { bind_addr: args.bind };
    println!("prov server on {}", args.bind.to_string().bold());
    ProvServer::new(config, service)
        .serve(cancel_on_ctrl_c())
        .await?;
    Ok(ExitCode::SUCCESS)
}

fn print_report(report: &AnchorReport) {
    match &report.batch {
        Some(batch) => {
            println!("batch {}", batch.batch_id.as_str().bold());
            println!("  root   {}", batch.root.to_string().yellow());
            println!("  leaves {}", batch.leaf_count);
        }
        None => println!("hash log is empty, nothing to anchor"),
    }
    print_result(&report.result);
}

fn print_result(result: &LedgerWriteResult) {
    match &result.outcome {
        Outcome::Success { raw } => {
            println!("{} ledger accepted after {} attempt(s)", "✓".green().bold(), result.attempts);
            if !raw.is_null() {
                println!("  {}", raw);
            }
        }
        Outcome::DryRun => println!("{} dry run: ledger not configured", "•".cyan()),
        Outcome::Failed { kind, error } => println!(
            "{} ledger {:?} after {} attempt(s): {}",
            "✗".red().bold(),
            kind,
            result.attempts,
            error
        ),
    }
}

fn exit_for(result: &LedgerWriteResult) -> ExitCode {
    if result.is_failed() {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}
