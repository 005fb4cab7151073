//! CLI binary for pyforge: generate, check, and repair Python scripts with an LLM.

mod progress;
mod report;
mod runlog;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use pyforge_checkers::build_aggregator;
use pyforge_core::config::ForgeConfig;
use pyforge_core::{Attempt, RunState, RunStatus};
use pyforge_engine::prompt::{SYSTEM_PROMPT, build_initial};
use pyforge_engine::{Attachment, RetryController, RunObserver, extract_code, render_attachments};
use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

#[derive(Parser)]
#[command(name = "pyforge", about = "Generate Python scripts with an LLM and repair them until they pass analysis")]
struct Cli {
    /// Project root directory (defaults to current directory)
    #[arg(short, long, global = true)]
    project: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate a script, analyze it, and feed issues back until it is clean
    Generate {
        /// What the script should do
        query: String,

        /// Context file to attach: .csv, .xlsx, .txt, .py (repeatable)
        #[arg(short, long = "file")]
        files: Vec<PathBuf>,

        /// Model name (e.g. gpt-4o-mini, gemini-2.0-flash)
        #[arg(short, long)]
        model: Option<String>,

        /// Provider: openai, gemini, anthropic (inferred from the model if omitted)
        #[arg(long)]
        provider: Option<String>,

        /// Maximum number of model calls
        #[arg(long)]
        max_attempts: Option<usize>,

        /// Checkers to run, comma separated: style, security, type, dynamic
        #[arg(long, value_delimiter = ',')]
        checkers: Vec<String>,

        /// Print the full run report as JSON
        #[arg(long)]
        json: bool,

        /// Directory for a per-run transcript log
        #[arg(long)]
        log_dir: Option<PathBuf>,

        /// Write the final code to this file
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Run the configured checkers over an existing script
    Check {
        /// Python file to analyze
        file: PathBuf,

        /// Checkers to run, comma separated: style, security, type, dynamic
        #[arg(long, value_delimiter = ',')]
        checkers: Vec<String>,
    },

    /// Extract the Python code from a model reply (file or stdin)
    Extract {
        /// File holding the reply (reads stdin when omitted)
        file: Option<PathBuf>,

        /// Print the result as JSON including the extraction method
        #[arg(long)]
        json: bool,
    },

    /// Print the effective configuration as TOML
    Config,
}

fn get_project_root(cli: &Cli) -> Result<PathBuf> {
    match &cli.project {
        Some(p) => Ok(p.clone()),
        None => std::env::current_dir().context("failed to get current directory"),
    }
}

fn main() -> Result<ExitCode> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let project_root = get_project_root(&cli)?;

    match cli.command {
        Commands::Generate {
            query,
            files,
            model,
            provider,
            max_attempts,
            checkers,
            json,
            log_dir,
            output,
        } => {
            let opts = GenerateOptions {
                query,
                files,
                model,
                provider,
                max_attempts,
                checkers,
                json,
                log_dir,
                output,
            };
            match cmd_generate(&project_root, opts) {
                Ok(code) => Ok(code),
                Err(e) => {
                    eprintln!("Error: {:#}", e);
                    Ok(ExitCode::from(2))
                }
            }
        }
        Commands::Check { file, checkers } => cmd_check(&project_root, &file, checkers),
        Commands::Extract { file, json } => cmd_extract(file.as_deref(), json),
        Commands::Config => {
            let config = ForgeConfig::load(&project_root)?;
            print!("{}", config.to_toml_string()?);
            Ok(ExitCode::SUCCESS)
        }
    }
}

struct GenerateOptions {
    query: String,
    files: Vec<PathBuf>,
    model: Option<String>,
    provider: Option<String>,
    max_attempts: Option<usize>,
    checkers: Vec<String>,
    json: bool,
    log_dir: Option<PathBuf>,
    output: Option<PathBuf>,
}

/// Load config and apply command-line overrides on top of file and env settings.
fn load_config(
    project_root: &Path,
    checkers: Vec<String>,
    apply: impl FnOnce(&mut ForgeConfig),
) -> Result<ForgeConfig> {
    let mut config = ForgeConfig::load(project_root)?;
    if !checkers.is_empty() {
        config.checkers.enabled = checkers;
    }
    apply(&mut config);
    config.validate()?;
    Ok(config)
}

/// Fans progress callbacks out to several observers.
struct Observers<'a>(Vec<&'a dyn RunObserver>);

impl RunObserver for Observers<'_> {
    fn attempt_started(&self, index: usize, max_attempts: usize) {
        for o in &self.0 {
            o.attempt_started(index, max_attempts);
        }
    }

    fn attempt_finished(&self, attempt: &Attempt) {
        for o in &self.0 {
            o.attempt_finished(attempt);
        }
    }
}

fn cmd_generate(project_root: &Path, opts: GenerateOptions) -> Result<ExitCode> {
    let config = load_config(project_root, opts.checkers, |config| {
        if let Some(model) = opts.model {
            config.llm.model = model;
        }
        if let Some(provider) = opts.provider {
            config.llm.provider = Some(provider.trim().to_lowercase());
        }
        if let Some(n) = opts.max_attempts {
            config.generation.max_attempts = n;
        }
    })?;

    let query = opts.query.trim();
    if query.is_empty() {
        anyhow::bail!("the request is empty; describe the script you want");
    }
    if opts.files.len() > config.generation.max_files {
        anyhow::bail!(
            "at most {} files may be attached ({} given)",
            config.generation.max_files,
            opts.files.len()
        );
    }
    let kinds = config.checkers.enabled_kinds()?;

    let attachments: Vec<Attachment> = opts.files.iter().map(Attachment::from_path).collect();
    let file_context = render_attachments(&attachments);
    let mut state = RunState::new(query, file_context);

    let provider = match pyforge_llm::create_provider(&config.llm) {
        Ok(provider) => provider,
        Err(e) => {
            // Configuration-level failure: no model call was made.
            state.finish(RunStatus::Aborted {
                reason: e.to_string(),
            });
            return finish_generate(&state, opts.json, opts.output.as_deref());
        }
    };

    let estimate = pyforge_llm::estimate_cost(
        provider.as_ref(),
        SYSTEM_PROMPT,
        &build_initial(state.query(), state.file_context()),
        config.generation.max_attempts,
        config.llm.max_tokens,
    );
    eprintln!("{}", estimate);
    eprintln!(
        "Checkers: {}",
        kinds
            .iter()
            .map(|k| k.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    );

    let aggregator = build_aggregator(&config.checkers, &kinds, &opts.files);
    let run_log = match &opts.log_dir {
        Some(dir) => Some(runlog::RunLog::create(dir, query, provider.model_name())?),
        None => None,
    };
    let progress = progress::GenerateProgress::new(provider.as_ref());

    let mut observers: Vec<&dyn RunObserver> = vec![&progress];
    if let Some(log) = &run_log {
        observers.push(log);
    }
    let observers = Observers(observers);

    RetryController::new(provider.as_ref(), &aggregator, config.generation.max_attempts)?
        .with_observer(&observers)
        .run(&mut state)?;

    progress.finish();
    if let Some(log) = &run_log {
        log.finish(&state);
        eprintln!("Run log: {}", log.path().display());
    }
    let usage = state.token_usage();
    eprintln!(
        "Tokens: {} in / {} out, cost ${:.4}",
        usage.input_tokens,
        usage.output_tokens,
        progress.spent_usd()
    );

    finish_generate(&state, opts.json, opts.output.as_deref())
}

fn finish_generate(state: &RunState, json: bool, output: Option<&Path>) -> Result<ExitCode> {
    if json {
        println!("{}", state.to_json_pretty()?);
    } else {
        print!("{}", report::render(state));
    }

    if let Some(path) = output
        && let Some(code) = state.final_code()
    {
        std::fs::write(path, format!("{}\n", code))
            .with_context(|| format!("failed to write {}", path.display()))?;
        eprintln!("Code written to {}", path.display());
    }

    Ok(ExitCode::from(report::exit_code(state.status())))
}

fn cmd_check(project_root: &Path, file: &Path, checkers: Vec<String>) -> Result<ExitCode> {
    let config = load_config(project_root, checkers, |_| {})?;
    let kinds = config.checkers.enabled_kinds()?;
    let code = std::fs::read_to_string(file)
        .with_context(|| format!("failed to read {}", file.display()))?;

    let aggregator = build_aggregator(&config.checkers, &kinds, &[]);
    eprintln!("Running: {}", aggregator.names().join(", "));
    let issues = aggregator.evaluate(&code);

    if issues.is_empty() {
        eprintln!("No issues found.");
        return Ok(ExitCode::SUCCESS);
    }
    for issue in &issues {
        println!("{}", issue);
    }
    eprintln!("\nFound {} issue(s).", issues.len());
    Ok(ExitCode::from(1))
}

fn cmd_extract(file: Option<&Path>, json: bool) -> Result<ExitCode> {
    let text = match file {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?,
        None => {
            let mut buf = String::new();
            std::io::stdin()
                .read_to_string(&mut buf)
                .context("failed to read stdin")?;
            buf
        }
    };

    match extract_code(&text) {
        Some(extracted) => {
            if json {
                println!("{}", serde_json::to_string_pretty(&extracted)?);
            } else {
                println!("{}", extracted.code);
            }
            Ok(ExitCode::SUCCESS)
        }
        None => {
            eprintln!("No recognizable code block.");
            Ok(ExitCode::from(1))
        }
    }
}
