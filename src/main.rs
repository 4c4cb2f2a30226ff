use std::path::Path;
use std::sync::Arc;

use chatguard::audit::{AuditLog, export as audit_export};
use chatguard::cli::{Cli, Commands, ExportFormat};
use chatguard::config::AppConfig;
use chatguard::pipeline::InspectionPipeline;
use chatguard::web::{self, AppState};
use chatguard::{responder, stats};
use clap::Parser;
use tokio::sync::broadcast;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Serve => {
            cmd_serve(&cli.config).await?;
        }
        Commands::Status => {
            cmd_status(&cli.config)?;
        }
        Commands::Logs {
            tail,
            export,
            format,
        } => {
            cmd_logs(&cli.config, tail, export, format)?;
        }
        Commands::Init => {
            cmd_init(&cli.config)?;
        }
    }

    Ok(())
}

async fn cmd_serve(config_path: &Path) -> anyhow::Result<()> {
    let config = AppConfig::load_or_default(config_path)?;
    println!("=== ChatGuard starting ===");
    println!("Audit log: {}", config.audit.path.display());
    println!("Forbidden terms: {}", config.policy.forbidden_terms.len());
    println!("Responder: {:?}", config.responder.kind);
    println!("Chat UI:   http://{}/", config.server.listen);
    println!("Dashboard: http://{}/admin", config.server.listen);

    let audit = Arc::new(AuditLog::new(config.audit.path.clone()));
    let responder = responder::from_config(&config.responder)?;
    let pipeline =
        InspectionPipeline::with_default_detectors(&config.policy.forbidden_terms, audit, responder);
    let (event_tx, _) = broadcast::channel(256);
    let state = Arc::new(AppState::new(pipeline, event_tx));

    web::start(&config.server.listen, state).await?;
    Ok(())
}

fn cmd_status(config_path: &Path) -> anyhow::Result<()> {
    let config = AppConfig::load_or_default(config_path)?;
    let audit = AuditLog::new(config.audit.path.clone());
    let summary = stats::summarize(&audit.read_all()?);

    println!("ChatGuard Status ({})", audit.path().display());
    println!("──────────────────");
    println!("Total messages: {}", summary.total);
    println!("  Blocked: {}", summary.block_count);
    println!("  Allowed: {}", summary.allow_count);
    if !summary.reason_ranking.is_empty() {
        println!("Block reasons:");
        for (reason, count) in summary.ranked() {
            println!("  {:>5}  {}", count, reason);
        }
    }
    Ok(())
}

fn cmd_logs(
    config_path: &Path,
    tail: usize,
    export: bool,
    format: ExportFormat,
) -> anyhow::Result<()> {
    let config = AppConfig::load_or_default(config_path)?;
    let audit = AuditLog::new(config.audit.path.clone());

    if export {
        let records = audit.read_all()?;
        match format {
            ExportFormat::Csv => print!("{}", audit_export::export_csv(&records)),
            ExportFormat::Json => println!("{}", audit_export::export_json(&records)?),
        }
        return Ok(());
    }

    let records = audit.read_recent(tail)?;
    if records.is_empty() {
        println!("No audit records found in {}.", audit.path().display());
        return Ok(());
    }

    println!(
        "{:<20} {:<6} {:<40} {}",
        "TIMESTAMP", "RESULT", "CONTENT", "REASON"
    );
    println!("{}", "─".repeat(100));
    for record in &records {
        println!(
            "{:<20} {:<6} {:<40} {}",
            record.timestamp,
            record.decision,
            truncate(&record.content, 40),
            record.reason_key.as_deref().unwrap_or("")
        );
    }
    Ok(())
}

/// Shorten `s` to at most `max` characters, marking the cut with `…`.
fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let mut out: String = s.chars().take(max.saturating_sub(1)).collect();
        out.push('…');
        out
    }
}

fn cmd_init(config_path: &Path) -> anyhow::Result<()> {
    println!("Initializing ChatGuard...");

    if !config_path.exists() {
        let default_config = include_str!("../templates/default.toml");
        std::fs::write(config_path, default_config)?;
        println!("  Created config: {}", config_path.display());
    } else {
        println!("  Config already exists: {}", config_path.display());
    }

    println!("\nDone! Next steps:");
    println!("  1. Edit forbidden terms in {}", config_path.display());
    println!("  2. Start the gateway: chatguard serve");
    Ok(())
}
