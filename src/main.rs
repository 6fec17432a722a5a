use std::io::IsTerminal;
use std::io::Read;
use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use miette::{IntoDiagnostic, Result};

use corvus_agent::analysis::LlmFileAnalyzer;
use corvus_agent::controller::{Agent, ChangedFile, ReviewRequest};
use corvus_agent::engine::OpenAiEngine;
use corvus_agent::forge::{parse_pr_reference, GitHubClient};
use corvus_agent::report::{position_findings, ReviewResult};
use corvus_core::{detect_language, CorvusConfig, OutputFormat};
use corvus_diffmap::parser::{split_unified_diff, LineMap};
use corvus_diffmap::resolve::KeywordInference;
use corvus_tools::{builtin_registry, Collaborators};

#[derive(Parser)]
#[command(
    name = "corvus",
    version,
    about = "Agentic pull-request review bot",
    long_about = "Corvus reviews pull requests the way a reviewer would: it plans, \
                  investigates changed files with analysis tools, iterates on what it finds,\n\
                  and posts positional comments only where the diff can carry them.\n\n\
                  Examples:\n  \
                    git diff main | corvus review      Review a diff from stdin\n  \
                    corvus review --file changes.diff  Review a saved diff\n  \
                    corvus review --pr owner/repo#12   Review a GitHub pull request\n  \
                    corvus review --pr owner/repo#12 --post  Review and post the result\n  \
                    corvus doctor                      Check setup and environment"
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,

    /// Path to configuration file (default: .corvus.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Output format
    #[arg(
        long,
        global = true,
        default_value = "text",
        long_help = "Output format for command results.\n\n\
                       Formats:\n  \
                         text      Human-readable summary (default)\n  \
                         json      Machine-readable JSON with camelCase keys\n  \
                         markdown  The review body as posted to the forge"
    )]
    format: OutputFormat,

    /// Enable verbose output
    #[arg(long, short, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Command {
    /// Run an agentic review over a diff or a GitHub pull request
    #[command(long_about = "Run an agentic review.\n\n\
        Reads a unified diff from stdin or --file, or fetches a GitHub pull request\n\
        with --pr. The reasoning loop is bounded by [agent] max_iterations in\n\
        .corvus.toml.\n\n\
        Examples:\n  git diff main | corvus review\n  corvus review --pr octocat/hello-world#42 --post")]
    Review {
        /// Diff file to review (default: stdin)
        #[arg(long)]
        file: Option<PathBuf>,

        /// GitHub pull request reference (owner/repo#number)
        #[arg(long)]
        pr: Option<String>,

        /// Post the finished review back to the pull request
        #[arg(long)]
        post: bool,

        /// GitHub token (default: GITHUB_TOKEN env var)
        #[arg(long)]
        github_token: Option<String>,
    },
    /// Create a default configuration file
    Init,
    /// Check your setup and environment
    Doctor,
}

const DEFAULT_CONFIG: &str = r#"# Corvus Configuration

[engine]
# OpenAI-compatible endpoint
# provider = "openai"
# model = "gpt-4-turbo-preview"
# base_url = "https://api.openai.com"
# temperature = 0.3

[agent]
# max_iterations = 10
# max_failures = 3
# min_tools_used = 5
# min_findings = 3
# min_steps = 7
# auto_finalize_findings = 5
"#;

#[tokio::main]
async fn main() -> Result<()> {
    miette::set_hook(Box::new(|_| {
        Box::new(
            miette::MietteHandlerOpts::new()
                .terminal_links(true)
                .build(),
        )
    }))
    .expect("miette handler");
    human_panic::setup_panic!();

    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => CorvusConfig::from_file(path).into_diagnostic()?,
        None => {
            let default_path = std::path::Path::new(".corvus.toml");
            if default_path.exists() {
                CorvusConfig::from_file(default_path).into_diagnostic()?
            } else {
                CorvusConfig::default()
            }
        }
    };

    // Env layering: explicit config wins, env fills the gaps.
    if config.engine.api_key.is_none() {
        config.engine.api_key = std::env::var("OPENAI_API_KEY").ok();
    }
    if let Ok(model) = std::env::var("OPENAI_MODEL") {
        config.engine.model = model;
    }

    if cli.verbose {
        eprintln!("format: {}", cli.format);
        eprintln!(
            "engine: {} ({}), max_iterations: {}",
            config.engine.provider, config.engine.model, config.agent.max_iterations
        );
    }

    match cli.command {
        None => {
            print_welcome();
            Ok(())
        }
        Some(Command::Review {
            ref file,
            ref pr,
            post,
            ref github_token,
        }) => run_review(&config, cli.format, file.as_deref(), pr.as_deref(), post, github_token.as_deref()).await,
        Some(Command::Init) => {
            let path = std::path::Path::new(".corvus.toml");
            if path.exists() {
                miette::bail!(".corvus.toml already exists");
            }
            std::fs::write(path, DEFAULT_CONFIG).into_diagnostic()?;
            println!("Created .corvus.toml with default configuration");
            Ok(())
        }
        Some(Command::Doctor) => {
            run_doctor(&config);
            Ok(())
        }
    }
}

fn print_welcome() {
    let version = env!("CARGO_PKG_VERSION");
    println!("corvus v{version} — agentic pull-request review\n");
    println!("Quick start:");
    println!("  corvus init                     Create a .corvus.toml config file");
    println!("  git diff main | corvus review   Review your latest changes");
    println!("  corvus review --pr o/r#42       Review a GitHub pull request\n");
    println!("Run 'corvus <command> --help' for details.");
}

async fn run_review(
    config: &CorvusConfig,
    format: OutputFormat,
    file: Option<&std::path::Path>,
    pr: Option<&str>,
    post: bool,
    github_token: Option<&str>,
) -> Result<()> {
    if config.engine.api_key.is_none() && config.engine.base_url.is_none() {
        miette::bail!(miette::miette!(
            help = "Set OPENAI_API_KEY or add api_key under [engine] in .corvus.toml",
            "No API key configured for engine provider '{}'",
            config.engine.provider
        ));
    }

    // Assemble the review request from the forge or a local diff.
    let mut forge: Option<(Arc<GitHubClient>, String, String, u64)> = None;
    let request: ReviewRequest = match pr {
        Some(reference) => {
            let (owner, repo, number) = parse_pr_reference(reference).into_diagnostic()?;
            let client = Arc::new(GitHubClient::new(github_token).into_diagnostic()?);
            let request = client.fetch_pull_request(&owner, &repo, number).await.into_diagnostic()?;
            forge = Some((client, owner, repo, number));
            request
        }
        None => {
            let diff = read_diff_input(file)?;
            local_request(&diff)
        }
    };

    if request.files.is_empty() {
        miette::bail!("No reviewable files found in the diff");
    }

    let engine = OpenAiEngine::new(&config.engine).into_diagnostic()?;
    let collaborators = Collaborators {
        analyzer: Some(Arc::new(LlmFileAnalyzer::new(engine.clone()))),
        fetcher: forge
            .as_ref()
            .map(|(client, ..)| client.clone() as Arc<dyn corvus_tools::FileFetcher>),
        ..Collaborators::default()
    };
    let registry = builtin_registry(collaborators);
    let mut agent = Agent::new(engine, registry, config.agent.clone());

    let is_tty = std::io::stderr().is_terminal();
    let spinner = if is_tty {
        let pb = indicatif::ProgressBar::new_spinner();
        pb.set_style(
            indicatif::ProgressStyle::with_template("{spinner:.cyan} {msg} ({elapsed})").unwrap(),
        );
        pb.set_message(format!(
            "Reviewing {} files in {}...",
            request.files.len(),
            request.repository
        ));
        pb.enable_steady_tick(std::time::Duration::from_millis(120));
        Some(pb)
    } else {
        None
    };

    let result = agent.review_pr(&request).await.inspect_err(|_e| {
        if let Some(pb) = &spinner {
            pb.finish_with_message("Failed");
        }
    }).into_diagnostic()?;

    let positioned = position_findings(&result, &request.files, &KeywordInference);

    if let Some(pb) = spinner {
        pb.finish_with_message(format!(
            "Done: {} findings, {} inline comments",
            result.findings_count(),
            positioned.comments.valid.len()
        ));
    }

    print_result(&result, &positioned, format)?;

    if post {
        let Some((client, owner, repo, number)) = forge else {
            miette::bail!("--post requires --pr");
        };
        client
            .post_review(
                &owner,
                &repo,
                number,
                &result.to_markdown(),
                &positioned.comments.valid,
            )
            .await.into_diagnostic()?;
        println!(
            "Posted review with {} inline comments ({} folded into the body)",
            positioned.comments.valid.len(),
            positioned.comments.skipped.len()
        );
    }

    Ok(())
}

fn print_result(
    result: &ReviewResult,
    positioned: &corvus_agent::report::PositionedReview,
    format: OutputFormat,
) -> Result<()> {
    match format {
        OutputFormat::Json => {
            let json = serde_json::json!({
                "review": result,
                "inlineComments": positioned.comments.valid,
                "skippedComments": positioned.comments.skipped,
            });
            println!("{}", serde_json::to_string_pretty(&json).into_diagnostic()?);
        }
        OutputFormat::Markdown => {
            print!("{}", result.to_markdown());
        }
        OutputFormat::Text => {
            print!("{result}");
            if !positioned.comments.valid.is_empty() {
                println!("\nInline comments:");
                for comment in &positioned.comments.valid {
                    println!("  {}:{} {}", comment.path, comment.line, comment.body);
                }
            }
        }
    }
    Ok(())
}

fn read_diff_input(file: Option<&std::path::Path>) -> Result<String> {
    match file {
        Some(path) => std::fs::read_to_string(path).into_diagnostic(),
        None => {
            if std::io::stdin().is_terminal() {
                miette::bail!(
                    "No diff on stdin. Pipe a diff (git diff | corvus review) or pass --file/--pr."
                );
            }
            let mut buffer = String::new();
            std::io::stdin()
                .read_to_string(&mut buffer)
                .into_diagnostic()?;
            Ok(buffer)
        }
    }
}

/// Build a review request from a raw unified diff with no forge context.
fn local_request(diff: &str) -> ReviewRequest {
    let files = split_unified_diff(diff)
        .into_iter()
        .map(|f| {
            let map = LineMap::parse(&f.patch);
            let deletions = f
                .patch
                .lines()
                .filter(|l| l.starts_with('-') && !l.starts_with("---"))
                .count() as u32;
            let language = detect_language(&f.path).to_string();
            ChangedFile {
                additions: map.added_lines.len() as u32,
                deletions,
                status: "modified".into(),
                language,
                filename: f.path,
                patch: Some(f.patch),
            }
        })
        .collect();

    ReviewRequest {
        pr_number: 0,
        repository: "local".into(),
        title: "Local diff review".into(),
        description: String::new(),
        files,
    }
}

fn run_doctor(config: &CorvusConfig) {
    let version = env!("CARGO_PKG_VERSION");
    println!("Corvus v{version} — Environment Check\n");

    let checks = [
        (
            "engine API key",
            config.engine.api_key.is_some(),
            "set OPENAI_API_KEY or [engine] api_key",
        ),
        (
            "forge token",
            std::env::var("GITHUB_TOKEN").is_ok(),
            "set GITHUB_TOKEN to review and post on GitHub PRs",
        ),
        (
            "config file",
            std::path::Path::new(".corvus.toml").exists(),
            "run 'corvus init' to create .corvus.toml",
        ),
    ];

    let mut failed = 0;
    for (name, ok, hint) in checks {
        let symbol = if ok { "ok " } else { "!! " };
        println!("  {symbol}{name}");
        if !ok {
            failed += 1;
            println!("     hint: {hint}");
        }
    }

    println!(
        "\n{} checks passed, {} need attention",
        3 - failed,
        failed
    );
}
