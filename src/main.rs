use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use colored::Colorize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing_subscriber::EnvFilter;

use lcov_reporter::config::Config;
use lcov_reporter::coverage::{diff_coverage, FileStatus};
use lcov_reporter::github::{publish_report, CommentIdentity, GithubClient, PublishOutcome, RunContext};
use lcov_reporter::inputs::load_reports;
use lcov_reporter::report::{self, format_delta, format_percentage, ReportOptions};

const CONFIG_FILE: &str = "lcov-reporter.toml";

#[derive(Parser)]
#[command(name = "lcov-reporter")]
#[command(about = "Publish LCOV coverage summaries as pull request comments")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to config file (default: lcov-reporter.toml if present)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,
}

#[derive(Args, Debug, Default)]
struct ReportArgs {
    /// LCOV report for the current run
    #[arg(long, env = "LCOV_FILE")]
    lcov_file: Option<PathBuf>,

    /// Baseline LCOV report to compare against
    #[arg(long, env = "LCOV_BASE")]
    lcov_base: Option<PathBuf>,

    /// Prefix stripped from displayed file paths
    #[arg(long)]
    prefix: Option<String>,

    /// Literal every report starts with
    #[arg(long)]
    marker: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Render the report and publish it on the pull request or commit
    Comment {
        #[command(flatten)]
        report: ReportArgs,

        /// GitHub token (default: GITHUB_TOKEN)
        #[arg(long, env = "GITHUB_TOKEN", hide_env_values = true)]
        github_token: Option<String>,
    },

    /// Render the report without publishing it
    Render {
        #[command(flatten)]
        report: ReportArgs,

        /// Repository shown in links (owner/name)
        #[arg(long)]
        repository: Option<String>,

        /// Commit the report belongs to
        #[arg(long)]
        commit: Option<String>,

        /// Head branch name
        #[arg(long)]
        head: Option<String>,

        /// Base branch name
        #[arg(long)]
        base: Option<String>,

        /// Write to a file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Print a terminal summary of the report
    Summary {
        #[command(flatten)]
        report: ReportArgs,
    },
}

fn main() {
    init_logging();

    if let Err(e) = run() {
        eprintln!("{} {:#}", "Error:".red().bold(), e);
        std::process::exit(1);
    }
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn run() -> Result<()> {
    let cli = Cli::parse();

    let mut config = Config::load_or_default(cli.config.as_deref(), Path::new(CONFIG_FILE))?;

    match cli.command {
        Commands::Comment { report, github_token } => {
            apply_report_args(&mut config, report);
            if github_token.is_some() {
                config.github.token = github_token;
            }
            config.validate()?;
            cmd_comment(&config)
        }
        Commands::Render {
            report,
            repository,
            commit,
            head,
            base,
            output,
        } => {
            apply_report_args(&mut config, report);
            config.validate()?;
            let options = ReportOptions {
                repository,
                commit,
                head,
                base,
                prefix: config.report.resolved_prefix(None)?,
                marker: config.report.marker.clone(),
                server_url: config.github.server_url(),
            };
            cmd_render(&config, &options, output.as_deref())
        }
        Commands::Summary { report } => {
            apply_report_args(&mut config, report);
            config.validate()?;
            cmd_summary(&config)
        }
    }
}

/// Command line values win over the config file
fn apply_report_args(config: &mut Config, args: ReportArgs) {
    if let Some(lcov_file) = args.lcov_file {
        config.report.lcov_file = lcov_file;
    }
    if args.lcov_base.is_some() {
        config.report.lcov_base = args.lcov_base;
    }
    if args.prefix.is_some() {
        config.report.prefix = args.prefix;
    }
    if let Some(marker) = args.marker {
        config.report.marker = marker;
    }
}

#[tokio::main]
async fn cmd_comment(config: &Config) -> Result<()> {
    let reports = load_reports(&config.report.lcov_file, config.report.lcov_base.as_deref()).await?;
    let Some(current) = reports.current else {
        return Ok(());
    };

    let context = RunContext::from_env().context("Not running inside a GitHub Actions workflow")?;
    tracing::info!(
        event = %context.event_name,
        repository = %context.repository,
        "building coverage report"
    );

    let options = ReportOptions {
        repository: Some(context.repository.clone()),
        commit: context.commit.clone(),
        head: context.head.clone(),
        base: context.base.clone(),
        prefix: config.report.resolved_prefix(context.workspace.as_deref())?,
        marker: config.report.marker.clone(),
        server_url: config.github.server_url(),
    };
    let body = report::diff(&current, reports.base.as_ref(), &options);

    let (owner, repo) = context.owner_and_repo()?;
    let token = config.github.token()?;
    let client = GithubClient::new(
        &config.github.api_url(),
        &token,
        owner,
        repo,
        Duration::from_secs(config.github.timeout_secs),
    )?;
    let identity = CommentIdentity::new(config.github.bot_user_id, config.report.marker.clone());

    match publish_report(&client, &context, &identity, &body).await? {
        Some(PublishOutcome::Created { id }) => {
            println!("{} Coverage comment created (id {})", "✓".green(), id);
        }
        Some(PublishOutcome::Updated { id }) => {
            println!("{} Coverage comment updated (id {})", "✓".green(), id);
        }
        Some(PublishOutcome::Unchanged { id }) => {
            println!("{} Coverage comment already up to date (id {})", "→".dimmed(), id);
        }
        None => {}
    }

    Ok(())
}

#[tokio::main]
async fn cmd_render(config: &Config, options: &ReportOptions, output: Option<&Path>) -> Result<()> {
    let reports = load_reports(&config.report.lcov_file, config.report.lcov_base.as_deref()).await?;
    let Some(current) = reports.current else {
        return Ok(());
    };

    let body = report::diff(&current, reports.base.as_ref(), options);

    match output {
        Some(path) => {
            tokio::fs::write(path, &body)
                .await
                .with_context(|| format!("Failed to write report: {}", path.display()))?;
            println!(
                "{} Report written: {}",
                "📊".cyan(),
                path.display().to_string().green()
            );
        }
        None => print!("{}", body),
    }

    Ok(())
}

#[tokio::main]
async fn cmd_summary(config: &Config) -> Result<()> {
    let reports = load_reports(&config.report.lcov_file, config.report.lcov_base.as_deref()).await?;
    let Some(current) = reports.current else {
        return Ok(());
    };

    let options = ReportOptions {
        prefix: config.report.resolved_prefix(None)?,
        ..Default::default()
    };
    let diff = diff_coverage(&current, reports.base.as_ref());

    println!("{}", "Coverage summary:".bold());

    let overall = format_percentage(diff.percentage());
    match diff.overall_delta() {
        Some(delta) => println!("  Lines: {} ({})", overall.bold(), colorize_delta(delta)),
        None => println!("  Lines: {}", overall.bold()),
    }
    println!(
        "  {} of {} lines in {} files",
        diff.current.covered_lines, diff.current.total_lines, diff.current.files
    );
    println!();

    for row in &diff.files {
        let path = options.display_path(row.path());
        let pct = format_percentage(row.percentage());
        match (row.status, row.delta) {
            (FileStatus::Added, _) => println!("  {} {} {}", pct, path, "(new)".cyan()),
            (_, Some(delta)) => println!("  {} {} {}", pct, path, colorize_delta(delta)),
            (_, None) => println!("  {} {}", pct, path),
        }
    }

    for removed in &diff.removed {
        println!(
            "  {} {}",
            "removed".dimmed(),
            options.display_path(removed.file.path()).dimmed()
        );
    }

    Ok(())
}

fn colorize_delta(delta: f64) -> String {
    let text = format_delta(delta);
    if text.starts_with('▴') {
        text.green().to_string()
    } else if text.starts_with('▾') {
        text.red().to_string()
    } else {
        text.dimmed().to_string()
    }
}
