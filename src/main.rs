//! Safety Copilot - H&S inspection assistant for your terminal.
//!
//! Each invocation runs one workflow action against the saved session and
//! writes the session back before exiting.

#![allow(clippy::single_match_else)]

use std::io::{self, Read};
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::{Args, CommandFactory, Parser, Subcommand};
use clap_complete::{generate, Shell};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use safety_copilot::audit::AuditStore;
use safety_copilot::workflow::TextField;
use safety_copilot::{
    AuditTrail, CompletionGateway, Config, SessionFile, StateStore, Step, WorkflowContext,
    WorkflowState, APP_NAME,
};

/// H&S safety inspection copilot
#[derive(Parser)]
#[command(name = "safety-copilot")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Subcommand to run
    #[command(subcommand)]
    command: Option<Commands>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the six steps and their progress (default)
    Dashboard,

    /// List the workflow steps
    Steps,

    /// Step 1: analyze new safety rules
    Rules {
        #[command(subcommand)]
        operation: RulesOperation,
    },

    /// Step 2: prepare the safety checklist
    Checklist {
        #[command(subcommand)]
        operation: ChecklistOperation,
    },

    /// Step 3: detect risks in a worksite image
    Risk {
        #[command(subcommand)]
        operation: RiskOperation,
    },

    /// Step 4: review a contractor's H&S plan
    Plan {
        #[command(subcommand)]
        operation: PlanOperation,
    },

    /// Step 5: create the violations report
    Report {
        #[command(subcommand)]
        operation: ReportOperation,
    },

    /// Step 6: draft the urgent email
    Email {
        #[command(subcommand)]
        operation: EmailOperation,
    },

    /// Inspect the audit log
    Audit {
        #[command(subcommand)]
        operation: AuditOperation,
    },

    /// Manage the saved session
    Session {
        #[command(subcommand)]
        operation: SessionOperation,
    },

    /// Show configuration
    Config {
        /// Show config file path
        #[arg(long)]
        path: bool,

        /// Write the default configuration to the global config file
        #[arg(long)]
        init: bool,
    },

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        shell: Shell,
    },
}

/// Text given inline, from a file, or on stdin.
#[derive(Args)]
struct TextInput {
    /// Text content (read from stdin when omitted)
    text: Option<String>,

    /// Read the content from a file instead
    #[arg(short, long, conflicts_with = "text")]
    file: Option<PathBuf>,
}

impl TextInput {
    fn read(self) -> Result<String> {
        if let Some(path) = self.file {
            return std::fs::read_to_string(&path)
                .map_err(|e| anyhow::anyhow!("Failed to read file '{}': {e}", path.display()));
        }
        match self.text {
            Some(text) if text != "-" => Ok(text),
            _ => {
                let mut buffer = String::new();
                io::stdin().read_to_string(&mut buffer)?;
                Ok(buffer)
            }
        }
    }
}

#[derive(Subcommand)]
enum RulesOperation {
    /// Load a regulation document (plain text or markdown)
    Load { file: PathBuf },

    /// Paste regulation text
    Paste(TextInput),

    /// Summarize the regulation document
    Summarize,

    /// Ask a question about the regulation document
    Ask { question: String },

    /// Clear the questions and answers
    ClearQa,

    /// Show the document, summary and Q&A
    Show,
}

#[derive(Subcommand)]
enum ChecklistOperation {
    /// Set the existing checklist
    Set {
        #[command(flatten)]
        input: TextInput,

        /// Overwrite the updated checklist instead
        #[arg(long)]
        updated: bool,
    },

    /// Update the checklist against the regulation summary
    Update,

    /// Show both checklists
    Show,
}

#[derive(Subcommand)]
enum RiskOperation {
    /// Analyze a worksite image (PNG, JPEG or WEBP)
    Analyze {
        image: PathBuf,

        /// Custom analysis prompt
        #[arg(short, long)]
        prompt: Option<String>,
    },

    /// Add the current analysis to the inspection notes
    Promote,

    /// Remove the current image
    Clear,

    /// Show the current image analysis
    Show,
}

#[derive(Subcommand)]
enum PlanOperation {
    /// List the contractors
    Contractors,

    /// Select a contractor by id or name
    Select { contractor: String },

    /// Load the contractor's H&S plan (plain text or markdown)
    Load { file: PathBuf },

    /// Paste the contractor's H&S plan
    Paste(TextInput),

    /// Summarize the plan and identify compliance gaps
    Analyze,

    /// Show the plan review
    Show,
}

#[derive(Subcommand)]
enum ReportOperation {
    /// Replace the inspection notes
    Notes(TextInput),

    /// Append a paragraph to the inspection notes
    AppendNotes(TextInput),

    /// Generate the violations report
    Generate,

    /// Show the notes and report
    Show,
}

#[derive(Subcommand)]
enum EmailOperation {
    /// Set the violations summary manually
    Summary(TextInput),

    /// Draft the urgent email
    Draft {
        /// Recipient
        #[arg(short, long)]
        to: Option<String>,
    },

    /// Show the email draft
    Show,
}

#[derive(Subcommand)]
enum AuditOperation {
    /// List audit entries
    List {
        /// Only entries of this action type
        #[arg(short, long)]
        action: Option<String>,

        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Delete every audit entry
    Clear {
        /// Don't ask for confirmation
        #[arg(short = 'y', long)]
        yes: bool,
    },
}

#[derive(Subcommand)]
enum SessionOperation {
    /// Show the saved workflow state
    Show {
        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Start a new inspection
    Reset,
}

fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    // Setup logging; stdout is reserved for command output
    let filter = if cli.verbose { EnvFilter::new("debug") } else { EnvFilter::new("warn") };

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).with_writer(io::stderr))
        .with(filter)
        .init();

    match cli.command {
        None | Some(Commands::Dashboard) => cmd_dashboard()?,
        Some(Commands::Steps) => cmd_steps(),
        Some(Commands::Rules { operation }) => cmd_rules(operation)?,
        Some(Commands::Checklist { operation }) => cmd_checklist(operation)?,
        Some(Commands::Risk { operation }) => cmd_risk(operation)?,
        Some(Commands::Plan { operation }) => cmd_plan(operation)?,
        Some(Commands::Report { operation }) => cmd_report(operation)?,
        Some(Commands::Email { operation }) => cmd_email(operation)?,
        Some(Commands::Audit { operation }) => cmd_audit(operation)?,
        Some(Commands::Session { operation }) => cmd_session(operation)?,
        Some(Commands::Config { path, init }) => cmd_config(path, init)?,
        Some(Commands::Completions { shell }) => cmd_completions(shell),
    }

    Ok(())
}

/// Everything a step command needs: config, saved session and context.
struct Workspace {
    config: Config,
    session: SessionFile,
    /// The session as loaded, so saving only writes what this run changed
    base: WorkflowState,
    ctx: WorkflowContext,
}

impl Workspace {
    fn open() -> Result<Self> {
        let config = Config::load()?;
        if config.gateway.provider != "gemini" {
            anyhow::bail!(
                "Unsupported completion provider: {}. Supported: gemini",
                config.gateway.provider
            );
        }

        let session = SessionFile::new(config.session_path()?);
        let base = session.load()?;
        let state = StateStore::from_state(base.clone());
        let gateway = CompletionGateway::from_config(&config.gateway);
        let audit = AuditTrail::new(Arc::new(AuditStore::new(config.audit_log_path()?)));

        Ok(Self { config, session, base, ctx: WorkflowContext::new(state, gateway, audit) })
    }

    /// Run an action on a fresh runtime, then wait for audit writes and save.
    ///
    /// The session is saved on failure too, so partial results survive.
    fn run<F, Fut>(self, action: F) -> Result<()>
    where
        F: FnOnce(Self) -> Fut,
        Fut: std::future::Future<Output = Result<()>>,
    {
        let session = self.session.clone();
        let base = self.base.clone();
        let state = self.ctx.state.clone();
        let audit = self.ctx.audit.clone();

        let rt = tokio::runtime::Runtime::new()?;
        let result = rt.block_on(async {
            let result = action(self).await;
            audit.flush().await;
            result
        });

        session.update(&base, &state.snapshot())?;
        result
    }

    fn save(&self) -> Result<()> {
        self.session.update(&self.base, &self.ctx.state.snapshot())?;
        Ok(())
    }
}

/// Print a titled block, or a placeholder when empty.
fn print_section(title: &str, body: &str) {
    println!("== {title} ==");
    if body.trim().is_empty() {
        println!("(empty)");
    } else {
        println!("{body}");
    }
    println!();
}

/// Show the steps and which ones have produced output.
fn cmd_dashboard() -> Result<()> {
    let config = Config::load()?;
    let state = SessionFile::new(config.session_path()?).load()?;

    println!("Welcome to the H&S Safety Copilot\n");
    for step in Step::ALL {
        let mark = if state.step_complete(step) { "x" } else { " " };
        println!("[{mark}] {step}");
        println!("    {}", step.description());
    }
    println!("\nRun `{APP_NAME} <step> --help` to get started.");
    Ok(())
}

fn cmd_steps() {
    for step in Step::ALL {
        println!("{:<18} {}", step.slug(), step.title());
    }
}

fn cmd_rules(operation: RulesOperation) -> Result<()> {
    let ws = Workspace::open()?;
    let rules = ws.ctx.rules();

    match operation {
        RulesOperation::Paste(input) => {
            rules.paste(&input.read()?);
            ws.save()?;
            println!("Regulation text saved.");
        }
        RulesOperation::ClearQa => {
            rules.clear_qas();
            ws.save()?;
            println!("Questions cleared.");
        }
        RulesOperation::Show => {
            let state = ws.ctx.state.snapshot();
            print_section("Regulation document", &state.regulation_document_text);
            print_section("Summary", &state.regulation_summary);
            println!("== Questions ({}) ==", state.regulation_qas.len());
            for qa in &state.regulation_qas {
                println!("Q: {}\nA: {}\n", qa.question, qa.answer);
            }
        }
        RulesOperation::Load { file } => ws.run(|ws| async move {
            let bytes = ws.ctx.rules().load_file(&file).await?;
            println!("Loaded {} ({bytes} bytes).", file.display());
            anyhow::Ok(())
        })?,
        RulesOperation::Summarize => ws.run(|ws| async move {
            println!("Summarizing document...\n");
            let summary = ws.ctx.rules().summarize().await?;
            println!("{summary}");
            anyhow::Ok(())
        })?,
        RulesOperation::Ask { question } => ws.run(|ws| async move {
            let qa = ws.ctx.rules().ask(&question).await?;
            println!("{}", qa.answer);
            anyhow::Ok(())
        })?,
    }

    Ok(())
}

fn cmd_checklist(operation: ChecklistOperation) -> Result<()> {
    let ws = Workspace::open()?;
    let checklist = ws.ctx.checklist();

    match operation {
        ChecklistOperation::Set { input, updated } => {
            let text = input.read()?;
            if updated {
                checklist.set_updated(&text);
            } else {
                checklist.set_existing(&text);
            }
            ws.save()?;
            println!("Checklist saved.");
        }
        ChecklistOperation::Update => ws.run(|ws| async move {
            println!("Updating checklist...\n");
            let updated = ws.ctx.checklist().update().await?;
            println!("{updated}");
            anyhow::Ok(())
        })?,
        ChecklistOperation::Show => {
            print_section("Existing checklist", &ws.ctx.state.get(TextField::ExistingChecklist));
            print_section("Updated checklist", &ws.ctx.state.get(TextField::UpdatedChecklist));
        }
    }

    Ok(())
}

fn cmd_risk(operation: RiskOperation) -> Result<()> {
    let ws = Workspace::open()?;

    match operation {
        RiskOperation::Analyze { image, prompt } => ws.run(|ws| async move {
            let prompt = prompt.unwrap_or_else(|| ws.config.defaults.image_prompt.clone());
            println!("Analyzing image...\n");
            let result = ws.ctx.risk().analyze(&image, Some(prompt.as_str())).await?;
            println!("{}", result.analysis);
            anyhow::Ok(())
        })?,
        RiskOperation::Promote => ws.run(|ws| async move {
            let image = ws.ctx.risk().promote().await?;
            println!("Analysis of {} added to inspection notes.", image.file_name);
            anyhow::Ok(())
        })?,
        RiskOperation::Clear => {
            ws.ctx.risk().clear();
            ws.save()?;
            println!("Image cleared.");
        }
        RiskOperation::Show => match ws.ctx.state.site_image() {
            Some(image) => {
                println!("Image: {} ({})\n", image.file_name, image.mime_type);
                print_section("Analysis", &image.analysis);
            }
            None => println!("No image analyzed yet."),
        },
    }

    Ok(())
}

fn cmd_plan(operation: PlanOperation) -> Result<()> {
    let ws = Workspace::open()?;
    let plan = ws.ctx.plan();

    match operation {
        PlanOperation::Contractors => {
            let selected = ws.ctx.state.selected_contractor();
            for contractor in plan.contractors() {
                let mark = if selected.as_ref() == Some(contractor) { "*" } else { " " };
                println!("{mark} {:<14} {contractor}", contractor.id);
            }
        }
        PlanOperation::Select { contractor } => {
            let contractor = plan.select(&contractor)?;
            ws.save()?;
            println!("Selected {contractor}.");
        }
        PlanOperation::Paste(input) => {
            plan.paste(&input.read()?)?;
            ws.save()?;
            println!("H&S plan saved.");
        }
        PlanOperation::Load { file } => ws.run(|ws| async move {
            let bytes = ws.ctx.plan().load_file(&file).await?;
            println!("Loaded {} ({bytes} bytes).", file.display());
            anyhow::Ok(())
        })?,
        PlanOperation::Analyze => ws.run(|ws| async move {
            println!("Analyzing H&S plan...\n");
            let review = ws.ctx.plan().analyze().await?;
            print_section("H&S plan summary", &review.plan_summary);
            print_section("Scope of work", &review.scope_summary);
            print_section("Potential violations", &review.violations);
            anyhow::Ok(())
        })?,
        PlanOperation::Show => {
            let state = ws.ctx.state.snapshot();
            match &state.selected_contractor {
                Some(contractor) => println!("Contractor: {contractor}\n"),
                None => println!("No contractor selected.\n"),
            }
            print_section("H&S plan", &state.contractor_safety_plan_text);
            print_section("H&S plan summary", &state.contractor_safety_plan_summary);
            print_section("Scope of work", &state.contractor_scope_of_work_summary);
            print_section("Potential violations", &state.contractor_plan_violations);
        }
    }

    Ok(())
}

fn cmd_report(operation: ReportOperation) -> Result<()> {
    let ws = Workspace::open()?;
    let report = ws.ctx.report();

    match operation {
        ReportOperation::Notes(input) => {
            report.set_notes(&input.read()?);
            ws.save()?;
            println!("Inspection notes saved.");
        }
        ReportOperation::AppendNotes(input) => {
            report.append_notes(&input.read()?);
            ws.save()?;
            println!("Inspection notes updated.");
        }
        ReportOperation::Generate => ws.run(|ws| async move {
            println!("Generating report...\n");
            let result = ws.ctx.report().generate().await?;
            print_section("Safety report", &result.report);
            print_section("Critical violations", &result.violations_summary);
            anyhow::Ok(())
        })?,
        ReportOperation::Show => {
            print_section("Inspection notes", &ws.ctx.state.get(TextField::InspectionNotes));
            print_section("Safety report", &ws.ctx.state.get(TextField::SafetyReport));
        }
    }

    Ok(())
}

fn cmd_email(operation: EmailOperation) -> Result<()> {
    let ws = Workspace::open()?;
    let email = ws.ctx.email();

    match operation {
        EmailOperation::Summary(input) => {
            email.set_violations_summary(&input.read()?);
            ws.save()?;
            println!("Violations summary saved.");
        }
        EmailOperation::Draft { to } => ws.run(|ws| async move {
            let email = ws.ctx.email();
            let to = to.or_else(|| {
                ws.ctx
                    .state
                    .get(TextField::EmailRecipient)
                    .trim()
                    .is_empty()
                    .then(|| ws.config.defaults.email_recipient.clone())
            });
            println!("Drafting email...\n");
            let draft = email.draft(to.as_deref()).await?;
            println!("{draft}");
            anyhow::Ok(())
        })?,
        EmailOperation::Show => {
            println!("To: {}\n", email.recipient());
            print_section("Violations summary", &ws.ctx.state.get(TextField::ViolationsSummaryForEmail));
            print_section("Draft", &ws.ctx.state.get(TextField::UrgentEmailDraft));
        }
    }

    Ok(())
}

fn cmd_audit(operation: AuditOperation) -> Result<()> {
    let config = Config::load()?;
    let store = AuditStore::new(config.audit_log_path()?);

    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(async {
        match operation {
            AuditOperation::List { action, format } => {
                let entries = match action {
                    Some(action) => store.by_action_type(&action).await?,
                    None => store.get_all().await?,
                };

                match format.as_str() {
                    "json" => println!("{}", serde_json::to_string_pretty(&entries)?),
                    _ => {
                        for entry in &entries {
                            println!(
                                "#{:<4} {} {:<34} {}",
                                entry.id,
                                entry.timestamp.format("%Y-%m-%d %H:%M:%S%.3f"),
                                entry.action_type,
                                serde_json::Value::Object(entry.details.clone())
                            );
                        }
                        println!("\nTotal: {} entries", entries.len());
                    }
                }
            }
            AuditOperation::Clear { yes } => {
                if !yes {
                    anyhow::bail!("Refusing to clear the audit log without --yes");
                }
                store.clear().await?;
                println!("Audit log cleared.");
            }
        }
        anyhow::Ok(())
    })
}

fn cmd_session(operation: SessionOperation) -> Result<()> {
    let config = Config::load()?;
    let session = SessionFile::new(config.session_path()?);

    match operation {
        SessionOperation::Show { format } => {
            let state = session.load()?;
            match format.as_str() {
                "json" => println!("{}", serde_json::to_string_pretty(&state)?),
                _ => print_session(&state),
            }
        }
        SessionOperation::Reset => {
            session.reset()?;
            println!("Session reset.");
        }
    }

    Ok(())
}

fn print_session(state: &WorkflowState) {
    println!("Session\n");
    for field in TextField::ALL {
        let len = state.field(field).chars().count();
        println!("  {:<20} {}", field.name(), if len == 0 { "-".to_string() } else { format!("{len} chars") });
    }
    println!("  {:<20} {}", "questions", state.regulation_qas.len());
    println!(
        "  {:<20} {}",
        "site-image",
        state.site_image.as_ref().map_or("-", |img| img.file_name.as_str())
    );
    println!(
        "  {:<20} {}",
        "contractor",
        state.selected_contractor.as_ref().map_or("-", |c| c.name.as_str())
    );
}

fn cmd_config(show_path: bool, init: bool) -> Result<()> {
    if show_path {
        if let Some(path) = Config::global_config_path() {
            println!("{}", path.display());
        }
        return Ok(());
    }

    if init {
        if Config::global_config_path().is_some_and(|p| p.exists()) {
            anyhow::bail!("Config file already exists");
        }
        Config::default().save()?;
        println!("Wrote default configuration.");
        return Ok(());
    }

    let config = Config::load()?;
    let toml = toml::to_string_pretty(&config)?;
    println!("{toml}");
    println!("# data dir: {}", config.data_dir()?.display());

    let gateway = CompletionGateway::from_config(&config.gateway);
    let credential = if gateway.ensure_configured().is_ok() { "set" } else { "missing" };
    println!("# backend: {} ({} {credential})", gateway.backend_name(), config.gateway.api_key_env);

    Ok(())
}

fn cmd_completions(shell: Shell) {
    let mut cmd = Cli::command();
    generate(shell, &mut cmd, APP_NAME, &mut io::stdout());
}
