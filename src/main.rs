use adstage::{
    config::{DbConfig, Profile},
    db::MySqlSession,
    process::normalize::normalize_file,
    run_batch,
    scripts::DirScriptStore,
    workspace::{find_base, Workspace},
};
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::{env, path::PathBuf};
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

/// Load one advertising report into the staging database and run its
/// transformation steps.
#[derive(Parser)]
#[command(name = "adstage", version)]
struct Cli {
    /// Workspace holding `Pasos/` and `Archivos/`. Default: the nearest
    /// ancestor of the current directory that has both.
    #[arg(long, global = true)]
    base: Option<PathBuf>,

    /// YAML batch profile. Default: Allegro RJ, PLN.
    #[arg(long, global = true)]
    profile: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Normalize, load, run steps 1–4 and clean the workspace (default).
    Run {
        /// Leave the input and staging files in place after success.
        #[arg(long)]
        keep_files: bool,
    },
    /// Only write the staging file; no database access.
    Normalize {
        /// Where to write it. Default: the profile's staging file.
        #[arg(long)]
        output: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    // ─── 1) init logging ─────────────────────────────────────────────
    dotenvy::dotenv().ok();
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt::Subscriber::builder().with_env_filter(env_filter).init();

    let cli = Cli::parse();

    // ─── 2) workspace + profile ──────────────────────────────────────
    let base = match cli.base {
        Some(base) => base,
        None => find_base(&env::current_dir().context("reading current directory")?),
    };
    let workspace = Workspace::new(base);
    let profile = match &cli.profile {
        Some(path) => Profile::load(path)
            .with_context(|| format!("loading profile {}", path.display()))?,
        None => Profile::default(),
    };
    info!(base = %workspace.base().display(), profile = %profile.name, "workspace");

    match cli.command.unwrap_or(Command::Run { keep_files: false }) {
        Command::Normalize { output } => {
            // ─── 3a) spreadsheet → staging file only ─────────────────
            let input = workspace.input_path(&profile);
            let output = output.unwrap_or_else(|| workspace.staging_path(&profile));
            let report = normalize_file(&input, &output)
                .with_context(|| format!("normalizing {}", input.display()))?;
            println!(
                "✅ {} rows × {} columns → {}",
                report.rows,
                report.columns,
                output.display()
            );
        }
        Command::Run { keep_files } => {
            // ─── 3b) full batch ──────────────────────────────────────
            let db = DbConfig::from_env().context("database configuration")?;
            let scripts = DirScriptStore::new(workspace.steps_dir(), &profile);

            let summary = run_batch(
                &workspace,
                &profile,
                scripts,
                || MySqlSession::connect(&db),
                keep_files,
            )
            .with_context(|| format!("batch {} failed", profile.name))?;

            if let Some(cleanup) = &summary.cleanup {
                info!(
                    removed = cleanup.removed,
                    kept = cleanup.kept,
                    failed = cleanup.failed.len(),
                    "cleanup"
                );
            }
            println!(
                "✅ [OK] {} finished: {} rows, reached {}",
                profile.name, summary.rows, summary.stage
            );
        }
    }

    Ok(())
}
