// crates/test-gate-cli/src/main.rs
// ============================================================================
// Module: Test Gate CLI Entry Point
// Description: Command dispatcher for evaluation, review, and report workflows.
// Purpose: Provide a localized CLI over the gating pipeline and its stores.
// Dependencies: clap, test-gate-cli, test-gate-config, test-gate-core, tokio
// ============================================================================

//! ## Overview
//! `test-gate evaluate` runs a batch of candidate tests through the pipeline
//! and prints one verdict line per artifact. `review` subcommands drive the
//! human-in-the-loop state machine against the configured store, and
//! `report` subcommands read persisted run reports back.
//!
//! Exit codes: `0` when every artifact is eligible or awaiting review (or a
//! command succeeded), `1` when any artifact failed or an operator request was
//! refused, and `2` on configuration, storage, or other internal errors.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::io::Write;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::ArgAction;
use clap::Args;
use clap::CommandFactory;
use clap::Parser;
use clap::Subcommand;
use clap::ValueEnum;
use serde::Serialize;
use test_gate_cli::i18n::Locale;
use test_gate_cli::i18n::set_locale;
use test_gate_cli::inputs::load_artifacts;
use test_gate_cli::runtime::GateRuntime;
use test_gate_cli::t;
use test_gate_config::GateConfig;
use test_gate_core::CancelHandle;
use test_gate_core::Eligibility;
use test_gate_core::Language;
use test_gate_core::Mode;
use test_gate_core::ReviewError;
use test_gate_core::ReviewFilter;
use test_gate_core::ReviewId;
use test_gate_core::ReviewRecord;
use test_gate_core::ReviewState;
use test_gate_core::RunId;
use test_gate_core::RunReport;
use thiserror::Error;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Environment variable for CLI locale selection.
const LANG_ENV: &str = "TEST_GATE_LANG";
/// Exit code when an artifact failed or a request was refused.
const EXIT_FAILED: u8 = 1;
/// Exit code for internal errors.
const EXIT_INTERNAL: u8 = 2;
/// Default number of runs shown by `report list`.
const DEFAULT_REPORT_LIST_LIMIT: usize = 20;

// ============================================================================
// SECTION: CLI Types
// ============================================================================

/// Top-level CLI definition.
#[derive(Parser, Debug)]
#[command(name = "test-gate", disable_help_subcommand = true, disable_version_flag = true)]
struct Cli {
    /// Print version information and exit.
    #[arg(long = "version", action = ArgAction::SetTrue, global = true)]
    show_version: bool,
    /// Preferred output language (overrides `TEST_GATE_LANG`).
    #[arg(long, value_enum, value_name = "LANG", global = true)]
    lang: Option<LangArg>,
    /// Selected subcommand to execute.
    #[command(subcommand)]
    command: Option<Commands>,
}

/// Supported CLI subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Evaluate candidate test artifacts.
    Evaluate(EvaluateCommand),
    /// Human review utilities.
    Review {
        /// Selected review subcommand.
        #[command(subcommand)]
        command: ReviewCommand,
    },
    /// Stored run report utilities.
    Report {
        /// Selected report subcommand.
        #[command(subcommand)]
        command: ReportCommand,
    },
    /// Configuration utilities.
    Config {
        /// Selected config subcommand.
        #[command(subcommand)]
        command: ConfigCommand,
    },
}

/// Config file selection shared by every command.
#[derive(Args, Debug, Clone)]
struct ConfigArgs {
    /// Optional config file path (defaults to test-gate.toml or env override).
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,
}

/// Arguments for `evaluate`.
#[derive(Args, Debug)]
struct EvaluateCommand {
    /// Test source files or JSON artifact bundles.
    #[arg(required = true, value_name = "ARTIFACT")]
    inputs: Vec<PathBuf>,
    /// Evaluation mode (overrides the configured mode).
    #[arg(long, value_enum)]
    mode: Option<ModeArg>,
    /// Language for source files (overrides extension inference).
    #[arg(long, value_name = "LANGUAGE")]
    language: Option<String>,
    /// Output format.
    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    format: OutputFormat,
    /// Config selection.
    #[command(flatten)]
    config: ConfigArgs,
}

/// Review subcommands.
#[derive(Subcommand, Debug)]
enum ReviewCommand {
    /// List reviews.
    List(ReviewListCommand),
    /// Approve a pending review.
    Approve(ReviewApproveCommand),
    /// Reject a pending review.
    Reject(ReviewRejectCommand),
    /// Show one review and the eligibility it implies.
    Status(ReviewIdCommand),
    /// Show every recorded version of one review.
    History(ReviewIdCommand),
    /// Expire every pending review whose deadline has passed.
    Expire(ReviewExpireCommand),
}

/// Arguments for `review list`.
#[derive(Args, Debug)]
struct ReviewListCommand {
    /// Restrict to one state.
    #[arg(long, value_enum)]
    state: Option<ReviewStateArg>,
    /// Restrict to one artifact.
    #[arg(long, value_name = "ARTIFACT_ID")]
    artifact: Option<String>,
    /// Output format.
    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    format: OutputFormat,
    /// Config selection.
    #[command(flatten)]
    config: ConfigArgs,
}

/// Arguments for `review approve`.
#[derive(Args, Debug)]
struct ReviewApproveCommand {
    /// Review identifier.
    review_id: String,
    /// Deciding reviewer.
    #[arg(long)]
    reviewer: String,
    /// Optional approval note.
    #[arg(long)]
    note: Option<String>,
    /// Expected review version (defaults to the stored version).
    #[arg(long)]
    version: Option<u64>,
    /// Config selection.
    #[command(flatten)]
    config: ConfigArgs,
}

/// Arguments for `review reject`.
#[derive(Args, Debug)]
struct ReviewRejectCommand {
    /// Review identifier.
    review_id: String,
    /// Deciding reviewer.
    #[arg(long)]
    reviewer: String,
    /// Rejection reason.
    #[arg(long)]
    reason: String,
    /// Expected review version (defaults to the stored version).
    #[arg(long)]
    version: Option<u64>,
    /// Config selection.
    #[command(flatten)]
    config: ConfigArgs,
}

/// Arguments for review commands addressing one review.
#[derive(Args, Debug)]
struct ReviewIdCommand {
    /// Review identifier.
    review_id: String,
    /// Output format.
    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    format: OutputFormat,
    /// Config selection.
    #[command(flatten)]
    config: ConfigArgs,
}

/// Arguments for `review expire`.
#[derive(Args, Debug)]
struct ReviewExpireCommand {
    /// Config selection.
    #[command(flatten)]
    config: ConfigArgs,
}

/// Report subcommands.
#[derive(Subcommand, Debug)]
enum ReportCommand {
    /// Print a stored run report as canonical JSON.
    Show(ReportShowCommand),
    /// List recent stored runs.
    List(ReportListCommand),
}

/// Arguments for `report show`.
#[derive(Args, Debug)]
struct ReportShowCommand {
    /// Run identifier.
    run_id: String,
    /// Config selection.
    #[command(flatten)]
    config: ConfigArgs,
}

/// Arguments for `report list`.
#[derive(Args, Debug)]
struct ReportListCommand {
    /// Maximum number of runs to show.
    #[arg(long, default_value_t = DEFAULT_REPORT_LIST_LIMIT)]
    limit: usize,
    /// Output format.
    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    format: OutputFormat,
    /// Config selection.
    #[command(flatten)]
    config: ConfigArgs,
}

/// Config subcommands.
#[derive(Subcommand, Debug)]
enum ConfigCommand {
    /// Validate a Test Gate configuration file.
    Validate(ConfigValidateCommand),
}

/// Arguments for config validation.
#[derive(Args, Debug)]
struct ConfigValidateCommand {
    /// Config selection.
    #[command(flatten)]
    config: ConfigArgs,
}

/// Output formats for structured CLI commands.
#[derive(ValueEnum, Copy, Clone, Debug)]
enum OutputFormat {
    /// Canonical JSON output.
    Json,
    /// Human-readable text output.
    Text,
}

/// Evaluation modes accepted on the command line.
#[derive(ValueEnum, Copy, Clone, Debug)]
enum ModeArg {
    /// Sandbox trouble routes to review.
    Lenient,
    /// Sandbox trouble fails the artifact.
    Strict,
}

/// Review states accepted as list filters.
#[derive(ValueEnum, Copy, Clone, Debug)]
enum ReviewStateArg {
    /// Awaiting a decision.
    Pending,
    /// Approved by a reviewer.
    Approved,
    /// Rejected by a reviewer.
    Rejected,
    /// Expired without a decision.
    Expired,
}

/// Supported CLI language selections.
#[derive(ValueEnum, Copy, Clone, Debug)]
enum LangArg {
    /// English.
    En,
    /// Catalan.
    Ca,
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// CLI error carrying a localized message and its exit code.
#[derive(Debug, Error)]
#[error("{message}")]
struct CliError {
    /// Human-readable error message.
    message: String,
    /// Process exit code.
    code: u8,
}

impl CliError {
    /// Constructs an internal error.
    const fn new(message: String) -> Self {
        Self {
            message,
            code: EXIT_INTERNAL,
        }
    }

    /// Constructs a refusal of an operator request.
    const fn refused(message: String) -> Self {
        Self {
            message,
            code: EXIT_FAILED,
        }
    }
}

/// CLI result alias for fallible operations.
type CliResult<T> = Result<T, CliError>;

// ============================================================================
// SECTION: Entry Point
// ============================================================================

/// CLI entry point returning an exit code.
#[tokio::main(flavor = "multi_thread")]
async fn main() -> ExitCode {
    match run().await {
        Ok(code) => code,
        Err(err) => emit_error(&err),
    }
}

/// Executes the CLI command dispatcher.
async fn run() -> CliResult<ExitCode> {
    let cli = Cli::parse();
    let env_lang = std::env::var(LANG_ENV).ok();
    let locale = resolve_locale(cli.lang, env_lang.as_deref())?;
    set_locale(locale);
    if locale != Locale::En {
        write_stderr_line(&t!("i18n.disclaimer.machine_translated"))?;
    }

    if cli.show_version {
        write_stdout_line(&t!("main.version", version = env!("CARGO_PKG_VERSION")))?;
        return Ok(ExitCode::SUCCESS);
    }

    let Some(command) = cli.command else {
        show_help()?;
        return Ok(ExitCode::SUCCESS);
    };

    match command {
        Commands::Evaluate(command) => command_evaluate(command).await,
        Commands::Review {
            command,
        } => command_review(command),
        Commands::Report {
            command,
        } => command_report(command),
        Commands::Config {
            command,
        } => command_config(&command),
    }
}

/// Emits the top-level help message for the CLI.
fn show_help() -> CliResult<()> {
    let mut command = Cli::command();
    command.print_help().map_err(|err| CliError::new(output_error("stdout", &err)))?;
    write_stdout_line("")
}

// ============================================================================
// SECTION: Evaluate Command
// ============================================================================

/// Executes `evaluate`.
async fn command_evaluate(command: EvaluateCommand) -> CliResult<ExitCode> {
    let config = load_config(&command.config)?;
    let runtime = build_runtime(&config, command.mode.map(Mode::from))?;
    let language = command.language.as_deref().map(Language::parse);
    let artifacts = load_artifacts(&command.inputs, language.as_ref(), runtime.now())
        .map_err(|err| CliError::new(t!("evaluate.input_failed", error = err)))?;

    let cancel = CancelHandle::new();
    let signal = cancel.signal();
    let interrupt = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            cancel.cancel();
        }
    });
    let outcome = runtime.orchestrator().run(artifacts, signal).await;
    interrupt.abort();
    let run = outcome.map_err(|err| CliError::new(t!("evaluate.failed", error = err)))?;

    match command.format {
        OutputFormat::Json => write_canonical_json(&run)?,
        OutputFormat::Text => write_stdout_text(&render_run_text(&run))?,
    }
    if run.cancelled {
        write_stderr_line(&t!("evaluate.cancelled"))?;
    }
    if run.counts.has_failures() {
        return Ok(ExitCode::from(EXIT_FAILED));
    }
    Ok(ExitCode::SUCCESS)
}

/// Renders verdict lines, pending reviews, and the summary line.
fn render_run_text(run: &RunReport) -> String {
    let mut buffer = String::new();
    for report in &run.reports {
        push_line(
            &mut buffer,
            &t!(
                "evaluate.line",
                artifact_id = report.artifact_id(),
                verdict = report.verdict().as_str(),
                reason = report.reason()
            ),
        );
    }
    for decision in &run.decisions {
        if let Eligibility::PendingReview {
            review_id,
        } = &decision.eligibility
        {
            push_line(
                &mut buffer,
                &t!("evaluate.review_pending", review_id = review_id, artifact_id = decision.artifact_id),
            );
        }
    }
    let counts = &run.counts;
    push_line(
        &mut buffer,
        &t!(
            "evaluate.summary",
            run_id = run.run_id,
            total = counts.total(),
            pass = counts.pass,
            needs_review = counts.needs_review,
            policy_blocked = counts.policy_blocked,
            sandbox_failed = counts.sandbox_failed,
            cancelled = counts.cancelled
        ),
    );
    buffer
}

// ============================================================================
// SECTION: Review Commands
// ============================================================================

/// Dispatches review subcommands.
fn command_review(command: ReviewCommand) -> CliResult<ExitCode> {
    match command {
        ReviewCommand::List(command) => command_review_list(&command),
        ReviewCommand::Approve(command) => command_review_approve(&command),
        ReviewCommand::Reject(command) => command_review_reject(&command),
        ReviewCommand::Status(command) => command_review_status(&command),
        ReviewCommand::History(command) => command_review_history(&command),
        ReviewCommand::Expire(command) => command_review_expire(&command),
    }
}

/// Executes `review list`.
fn command_review_list(command: &ReviewListCommand) -> CliResult<ExitCode> {
    let runtime = open_runtime(&command.config)?;
    runtime.reviews().expire_due(runtime.now()).map_err(review_error)?;
    let filter = ReviewFilter {
        state: command.state.map(ReviewState::from),
        artifact_id: command.artifact.as_deref().map(Into::into),
    };
    let records = runtime.reviews().list(&filter).map_err(review_error)?;
    if let OutputFormat::Json = command.format {
        write_canonical_json(&records)?;
        return Ok(ExitCode::SUCCESS);
    }
    let mut buffer = String::new();
    push_line(&mut buffer, &t!("review.list.header"));
    if records.is_empty() {
        push_line(&mut buffer, &t!("review.list.none"));
    }
    for record in &records {
        push_line(
            &mut buffer,
            &t!(
                "review.list.entry",
                review_id = record.review_id,
                state = record.state.as_str(),
                artifact_id = record.artifact_id,
                version = record.version
            ),
        );
    }
    write_stdout_text(&buffer)?;
    Ok(ExitCode::SUCCESS)
}

/// Executes `review approve`.
fn command_review_approve(command: &ReviewApproveCommand) -> CliResult<ExitCode> {
    let runtime = open_runtime(&command.config)?;
    let review_id = ReviewId::new(command.review_id.as_str());
    let version = resolve_version(&runtime, &review_id, command.version)?;
    let record = runtime
        .reviews()
        .approve(&review_id, &command.reviewer, command.note.as_deref(), version, runtime.now())
        .map_err(review_error)?;
    write_stdout_line(&t!(
        "review.approve.ok",
        review_id = record.review_id,
        reviewer = command.reviewer.trim(),
        version = record.version
    ))?;
    Ok(ExitCode::SUCCESS)
}

/// Executes `review reject`.
fn command_review_reject(command: &ReviewRejectCommand) -> CliResult<ExitCode> {
    let runtime = open_runtime(&command.config)?;
    let review_id = ReviewId::new(command.review_id.as_str());
    let version = resolve_version(&runtime, &review_id, command.version)?;
    let record = runtime
        .reviews()
        .reject(&review_id, &command.reviewer, &command.reason, version, runtime.now())
        .map_err(review_error)?;
    write_stdout_line(&t!(
        "review.reject.ok",
        review_id = record.review_id,
        reviewer = command.reviewer.trim(),
        version = record.version
    ))?;
    Ok(ExitCode::SUCCESS)
}

/// Executes `review status`.
fn command_review_status(command: &ReviewIdCommand) -> CliResult<ExitCode> {
    let runtime = open_runtime(&command.config)?;
    let review_id = ReviewId::new(command.review_id.as_str());
    runtime.reviews().expire_due(runtime.now()).map_err(review_error)?;
    let record = runtime.reviews().get(&review_id).map_err(review_error)?;
    let eligibility = runtime.reviews().eligibility(&review_id).map_err(review_error)?;
    if let OutputFormat::Json = command.format {
        write_canonical_json(&ReviewStatusOutput {
            review: record,
            eligibility,
        })?;
        return Ok(ExitCode::SUCCESS);
    }
    let eligibility = match eligibility {
        Eligibility::Eligible => "eligible",
        Eligibility::PendingReview {
            ..
        } => "pending_review",
        Eligibility::Ineligible => "ineligible",
    };
    write_stdout_line(&t!(
        "review.status.entry",
        review_id = record.review_id,
        state = record.state.as_str(),
        artifact_id = record.artifact_id,
        version = record.version,
        eligibility = eligibility
    ))?;
    Ok(ExitCode::SUCCESS)
}

/// Executes `review history`.
fn command_review_history(command: &ReviewIdCommand) -> CliResult<ExitCode> {
    let runtime = open_runtime(&command.config)?;
    let review_id = ReviewId::new(command.review_id.as_str());
    let history = runtime.reviews().history(&review_id).map_err(review_error)?;
    if let OutputFormat::Json = command.format {
        write_canonical_json(&history)?;
        return Ok(ExitCode::SUCCESS);
    }
    let mut buffer = String::new();
    for record in &history {
        push_line(
            &mut buffer,
            &t!("review.history.entry", version = record.version, state = record.state.as_str()),
        );
    }
    write_stdout_text(&buffer)?;
    Ok(ExitCode::SUCCESS)
}

/// Executes `review expire`.
fn command_review_expire(command: &ReviewExpireCommand) -> CliResult<ExitCode> {
    let runtime = open_runtime(&command.config)?;
    let expired = runtime.reviews().expire_due(runtime.now()).map_err(review_error)?;
    write_stdout_line(&t!("review.expire.ok", count = expired.len()))?;
    Ok(ExitCode::SUCCESS)
}

/// Output for `review status --format json`.
#[derive(Serialize)]
struct ReviewStatusOutput {
    /// Current review record.
    review: ReviewRecord,
    /// Eligibility implied by the review.
    eligibility: Eligibility,
}

/// Uses the explicit version or reads the current stored one.
fn resolve_version(runtime: &GateRuntime, review_id: &ReviewId, explicit: Option<u64>) -> CliResult<u64> {
    match explicit {
        Some(version) => Ok(version),
        None => Ok(runtime.reviews().get(review_id).map_err(review_error)?.version),
    }
}

/// Maps review errors: storage failures are internal, the rest are refusals.
fn review_error(err: ReviewError) -> CliError {
    let message = t!("review.failed", error = err);
    match err {
        ReviewError::Store(_) => CliError::new(message),
        _ => CliError::refused(message),
    }
}

// ============================================================================
// SECTION: Report Commands
// ============================================================================

/// Dispatches report subcommands.
fn command_report(command: ReportCommand) -> CliResult<ExitCode> {
    match command {
        ReportCommand::Show(command) => command_report_show(&command),
        ReportCommand::List(command) => command_report_list(&command),
    }
}

/// Executes `report show`.
fn command_report_show(command: &ReportShowCommand) -> CliResult<ExitCode> {
    let runtime = open_runtime(&command.config)?;
    let run_id = RunId::new(command.run_id.as_str());
    let run = runtime
        .reports()
        .load_run(&run_id)
        .map_err(|err| CliError::new(t!("report.failed", error = err)))?
        .ok_or_else(|| CliError::refused(t!("report.show.not_found", run_id = run_id)))?;
    write_canonical_json(&run)?;
    Ok(ExitCode::SUCCESS)
}

/// Executes `report list`.
fn command_report_list(command: &ReportListCommand) -> CliResult<ExitCode> {
    let runtime = open_runtime(&command.config)?;
    let runs = runtime
        .list_runs(command.limit)
        .map_err(|err| CliError::new(t!("report.failed", error = err)))?
        .ok_or_else(|| CliError::refused(t!("report.list.requires_sqlite")))?;
    if let OutputFormat::Json = command.format {
        write_canonical_json(&runs)?;
        return Ok(ExitCode::SUCCESS);
    }
    let mut buffer = String::new();
    push_line(&mut buffer, &t!("report.list.header"));
    if runs.is_empty() {
        push_line(&mut buffer, &t!("report.list.none"));
    }
    for run in &runs {
        push_line(
            &mut buffer,
            &t!(
                "report.list.entry",
                run_id = run.run_id,
                artifacts = run.artifacts,
                cancelled = run.cancelled,
                saved_at = run.saved_at
            ),
        );
    }
    write_stdout_text(&buffer)?;
    Ok(ExitCode::SUCCESS)
}

// ============================================================================
// SECTION: Config Commands
// ============================================================================

/// Dispatches config subcommands.
fn command_config(command: &ConfigCommand) -> CliResult<ExitCode> {
    match command {
        ConfigCommand::Validate(command) => command_config_validate(command),
    }
}

/// Executes the config validation command.
fn command_config_validate(command: &ConfigValidateCommand) -> CliResult<ExitCode> {
    let _config = load_config(&command.config)?;
    write_stdout_line(&t!("config.validate.ok"))?;
    Ok(ExitCode::SUCCESS)
}

// ============================================================================
// SECTION: Runtime Helpers
// ============================================================================

/// Loads and validates configuration.
fn load_config(args: &ConfigArgs) -> CliResult<GateConfig> {
    GateConfig::load(args.config.as_deref()).map_err(|err| CliError::new(t!("config.load_failed", error = err)))
}

/// Builds the runtime for a loaded configuration.
fn build_runtime(config: &GateConfig, mode: Option<Mode>) -> CliResult<GateRuntime> {
    GateRuntime::build(config, mode).map_err(|err| CliError::new(t!("runtime.build_failed", error = err)))
}

/// Loads configuration and builds the runtime with the configured mode.
fn open_runtime(args: &ConfigArgs) -> CliResult<GateRuntime> {
    let config = load_config(args)?;
    build_runtime(&config, None)
}

/// Resolves the CLI locale from flags or environment.
fn resolve_locale(lang: Option<LangArg>, env_lang: Option<&str>) -> CliResult<Locale> {
    if let Some(lang) = lang {
        return Ok(lang.into());
    }
    if let Some(value) = env_lang {
        return Locale::parse(value)
            .ok_or_else(|| CliError::new(t!("i18n.lang.invalid_env", env = LANG_ENV, value = value)));
    }
    Ok(Locale::En)
}

/// Converts CLI language selections into locales.
impl From<LangArg> for Locale {
    fn from(value: LangArg) -> Self {
        match value {
            LangArg::En => Self::En,
            LangArg::Ca => Self::Ca,
        }
    }
}

/// Converts CLI mode selections into evaluation modes.
impl From<ModeArg> for Mode {
    fn from(value: ModeArg) -> Self {
        match value {
            ModeArg::Lenient => Self::Lenient,
            ModeArg::Strict => Self::Strict,
        }
    }
}

/// Converts CLI state filters into review states.
impl From<ReviewStateArg> for ReviewState {
    fn from(value: ReviewStateArg) -> Self {
        match value {
            ReviewStateArg::Pending => Self::Pending,
            ReviewStateArg::Approved => Self::Approved,
            ReviewStateArg::Rejected => Self::Rejected,
            ReviewStateArg::Expired => Self::Expired,
        }
    }
}

// ============================================================================
// SECTION: Output Helpers
// ============================================================================

/// Appends one line to a text buffer.
fn push_line(buffer: &mut String, line: &str) {
    buffer.push_str(line);
    buffer.push('\n');
}

/// Writes a single line to stdout.
fn write_stdout_line(message: &str) -> CliResult<()> {
    let mut stdout = std::io::stdout();
    writeln!(&mut stdout, "{message}").map_err(|err| CliError::new(output_error("stdout", &err)))
}

/// Writes preformatted text to stdout.
fn write_stdout_text(text: &str) -> CliResult<()> {
    let mut stdout = std::io::stdout();
    stdout.write_all(text.as_bytes()).map_err(|err| CliError::new(output_error("stdout", &err)))
}

/// Writes canonical JSON to stdout.
fn write_canonical_json<T: Serialize>(value: &T) -> CliResult<()> {
    let mut bytes =
        serde_jcs::to_vec(value).map_err(|err| CliError::new(t!("output.json_failed", error = err)))?;
    bytes.push(b'\n');
    let mut stdout = std::io::stdout();
    stdout.write_all(&bytes).map_err(|err| CliError::new(output_error("stdout", &err)))
}

/// Writes a single line to stderr.
fn write_stderr_line(message: &str) -> CliResult<()> {
    let mut stderr = std::io::stderr();
    writeln!(&mut stderr, "{message}").map_err(|err| CliError::new(output_error("stderr", &err)))
}

/// Formats a localized output error message.
fn output_error(stream: &str, error: &std::io::Error) -> String {
    let stream_label = match stream {
        "stdout" => t!("output.stream.stdout"),
        "stderr" => t!("output.stream.stderr"),
        _ => t!("output.stream.unknown"),
    };
    t!("output.write_failed", stream = stream_label, error = error)
}

/// Emits an error message to stderr and returns its exit code.
fn emit_error(err: &CliError) -> ExitCode {
    let mut stderr = std::io::stderr();
    let _ = writeln!(&mut stderr, "{}", err.message);
    ExitCode::from(err.code)
}
