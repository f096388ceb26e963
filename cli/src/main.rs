use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use clap::{Args, Parser, Subcommand};
use client::config::{ClientConfig, normalize_api_url};
use client::error::ClientError;
use client::net::api::ApiClient;
use client::net::types::Task;
use client::pages::dashboard::render_dashboard;
use client::pages::login::{validate_login_input, validate_register_input, welcome_line};
use client::pages::tasks::{
    FilterForm, TaskForm, build_new_task, build_update, parse_filters, render_task_detail, render_task_list, task_line,
};
use client::state::auth::{Session, SessionManager};
use client::state::tasks::{RECENT_TASK_LIMIT, TasksState};
use client::util::auth::{GuardOutcome, RouteGuard};
use client::util::storage::{FileStore, TokenStore};
use serde::Serialize;
use serde_json::json;
use tracing::{debug, warn};


#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error(transparent)]
    Client(#[from] ClientError),
    #[error("not logged in; run `taskdeck login` first")]
    NotLoggedIn,
    #[error("{0}")]
    Input(String),
    #[error("failed to read input: {0}")]
    Io(#[from] io::Error),
    #[error("invalid JSON output: {0}")]
    Json(#[from] serde_json::Error),
}

impl CliError {
    fn code(&self) -> &'static str {
        match self {
            Self::Client(error) => error.error_code(),
            Self::NotLoggedIn => "E_AUTH_REQUIRED",
            Self::Input(_) => "E_INPUT",
            Self::Io(_) => "E_IO",
            Self::Json(_) => "E_JSON",
        }
    }

    fn user_message(&self) -> String {
        match self {
            Self::Client(error) => error.user_message(),
            other => other.to_string(),
        }
    }
}

#[derive(Parser, Debug)]
#[command(name = "taskdeck", version, about = "Command-line client for the taskdeck task service")]
struct Cli {
    #[arg(long, env = "TASKDECK_API_URL")]
    api_url: Option<String>,

    #[arg(long, env = "TASKDECK_REQUEST_TIMEOUT_SECS")]
    timeout_secs: Option<u64>,

    #[arg(long, env = "TASKDECK_TOKEN_FILE")]
    token_file: Option<PathBuf>,

    /// Print JSON instead of text.
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Sign in and remember the session.
    Login {
        #[arg(long)]
        email: String,
        /// Read from stdin when omitted.
        #[arg(long, env = "TASKDECK_PASSWORD", hide_env_values = true)]
        password: Option<String>,
    },
    /// Create an account and sign in.
    Register {
        #[arg(long)]
        name: String,
        #[arg(long)]
        email: String,
        #[arg(long, env = "TASKDECK_PASSWORD", hide_env_values = true)]
        password: Option<String>,
    },
    Logout,
    Whoami,
    Dashboard,
    Tasks(TasksCommand),
}

#[derive(Args, Debug)]
struct TasksCommand {
    #[command(subcommand)]
    command: TasksSubcommand,
}

#[derive(Subcommand, Debug)]
enum TasksSubcommand {
    List(ListArgs),
    Show {
        task_id: String,
    },
    Add {
        title: String,
        #[arg(long)]
        description: Option<String>,
        #[arg(long)]
        priority: Option<String>,
        #[arg(long)]
        due: Option<String>,
    },
    Edit {
        task_id: String,
        #[arg(long)]
        title: Option<String>,
        #[arg(long)]
        description: Option<String>,
        #[arg(long)]
        priority: Option<String>,
        #[arg(long)]
        due: Option<String>,
    },
    Complete {
        task_id: String,
    },
    Reopen {
        task_id: String,
    },
    Delete {
        task_id: String,
        /// Skip the confirmation prompt.
        #[arg(long, short = 'y')]
        yes: bool,
    },
}

#[derive(Args, Debug, Default)]
struct ListArgs {
    /// completed, pending or all.
    #[arg(long)]
    completed: Option<String>,
    /// low, medium, high or all.
    #[arg(long)]
    priority: Option<String>,
    /// created_at, due_date, priority or title.
    #[arg(long)]
    sort: Option<String>,
    /// asc or desc.
    #[arg(long)]
    order: Option<String>,
}

struct CliContext<S: TokenStore = FileStore> {
    sessions: SessionManager<S>,
    restore_grace: Duration,
    json: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    let _ = dotenvy::dotenv();
    init_tracing();

    let cli = Cli::parse();
    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            debug!(code = error.code(), %error, "command failed");
            eprintln!("error: {}", error.user_message());
            ExitCode::FAILURE
        }
    }
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_writer(io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .init();
}

/// Environment config with command-line overrides applied.
fn resolve_config(cli: &Cli) -> Result<ClientConfig, CliError> {
    let mut config = ClientConfig::from_env()?;
    if let Some(api_url) = &cli.api_url {
        config.api_url = normalize_api_url(api_url)?;
    }
    if let Some(secs) = cli.timeout_secs {
        config.request_timeout = Duration::from_secs(secs);
    }
    if let Some(token_file) = &cli.token_file {
        config.token_file.clone_from(token_file);
    }
    Ok(config)
}

async fn run(cli: Cli) -> Result<(), CliError> {
    let config = resolve_config(&cli)?;
    let api = ApiClient::new(&config)?;
    let sessions = SessionManager::new(api, FileStore::new(config.token_file.clone()));
    sessions.restore()?;
    let ctx = CliContext { sessions, restore_grace: config.restore_grace, json: cli.json };

    match cli.command {
        Command::Login { email, password } => run_login(&ctx, &email, password).await,
        Command::Register { name, email, password } => run_register(&ctx, &name, &email, password).await,
        Command::Logout => run_logout(&ctx).await,
        Command::Whoami => {
            let session = guard(&ctx).await?;
            run_whoami(&ctx, &session)
        }
        Command::Dashboard => {
            let session = guard(&ctx).await?;
            run_dashboard(&ctx, &session).await
        }
        Command::Tasks(tasks) => {
            let session = guard(&ctx).await?;
            run_tasks(&ctx, &session, tasks).await
        }
    }
}

/// Gate a protected command on a live session.
async fn guard<S: TokenStore>(ctx: &CliContext<S>) -> Result<Session, CliError> {
    let mut guard = RouteGuard::new(ctx.restore_grace);
    match guard.check(&ctx.sessions).await {
        GuardOutcome::Render(session) => Ok(session),
        GuardOutcome::Redirect(route) => {
            debug!(route, "protected command redirected");
            Err(CliError::NotLoggedIn)
        }
    }
}

// =============================================================================
// AUTH COMMANDS
// =============================================================================

async fn run_login(ctx: &CliContext, email: &str, password: Option<String>) -> Result<(), CliError> {
    let password = match password {
        Some(password) => password,
        None => prompt_secret()?,
    };
    let (email, password) = validate_login_input(email, &password).map_err(|m| CliError::Input(m.to_owned()))?;
    let session = ctx.sessions.login(&email, &password).await?;
    emit(ctx.json, &session_json(&session), || welcome_line(&session))
}

async fn run_register(ctx: &CliContext, name: &str, email: &str, password: Option<String>) -> Result<(), CliError> {
    let password = match password {
        Some(password) => password,
        None => prompt_secret()?,
    };
    let input = validate_register_input(name, email, &password).map_err(|m| CliError::Input(m.to_owned()))?;
    let session = ctx.sessions.register(&input.name, &input.email, &input.password).await?;
    emit(ctx.json, &session_json(&session), || welcome_line(&session))
}

async fn run_logout(ctx: &CliContext) -> Result<(), CliError> {
    let was_logged_in = ctx.sessions.session().is_some();
    ctx.sessions.logout().await?;
    let message = if was_logged_in { "Logged out." } else { "Not logged in." };
    emit(ctx.json, &json!({ "logged_out": was_logged_in }), || message.to_owned())
}

fn run_whoami(ctx: &CliContext, session: &Session) -> Result<(), CliError> {
    emit(ctx.json, &session_json(session), || {
        let mut out = format!("{} <{}>\nuser id: {}", session.display_name, session.email, session.user_id);
        if let Some(expires) = session.expiry.and_then(|exp| chrono::DateTime::from_timestamp(exp, 0)) {
            out.push_str(&format!("\nexpires: {}", expires.format("%Y-%m-%d %H:%M UTC")));
        }
        out
    })
}

fn session_json(session: &Session) -> serde_json::Value {
    json!({
        "user_id": session.user_id,
        "email": session.email,
        "display_name": session.display_name,
        "expiry": session.expiry,
    })
}

// =============================================================================
// TASK COMMANDS
// =============================================================================

async fn run_dashboard(ctx: &CliContext, session: &Session) -> Result<(), CliError> {
    let mut tasks = TasksState { loading: true, ..TasksState::default() };
    match settle(ctx, ctx.sessions.api().list_tasks(session, &Default::default()).await) {
        Ok(items) => tasks.replace(items),
        Err(CliError::Client(error)) => tasks.fail(error.user_message()),
        Err(error) => return Err(error),
    }
    let now = chrono::Utc::now().naive_utc();
    emit(ctx.json, &dashboard_json(&tasks, now), || render_dashboard(session, &tasks, now))
}

/// Same content as the text dashboard: recent tasks plus counts.
fn dashboard_json(tasks: &TasksState, now: chrono::NaiveDateTime) -> serde_json::Value {
    json!({
        "recent": tasks.recent(RECENT_TASK_LIMIT),
        "summary": tasks.summary(now),
        "error": tasks.error,
    })
}

async fn run_tasks(ctx: &CliContext, session: &Session, tasks: TasksCommand) -> Result<(), CliError> {
    let api = ctx.sessions.api();
    match tasks.command {
        TasksSubcommand::List(args) => {
            let filters = parse_filters(&FilterForm {
                completed: args.completed.as_deref(),
                priority: args.priority.as_deref(),
                sort: args.sort.as_deref(),
                order: args.order.as_deref(),
            })
            .map_err(CliError::Input)?;
            let items = settle(ctx, api.list_tasks(session, &filters).await)?;
            emit(ctx.json, &items, || render_task_list(&items))
        }
        TasksSubcommand::Show { task_id } => {
            let task = settle(ctx, api.get_task(session, &task_id).await)?;
            emit(ctx.json, &task, || render_task_detail(&task))
        }
        TasksSubcommand::Add { title, description, priority, due } => {
            let new_task = build_new_task(&TaskForm {
                title: Some(&title),
                description: description.as_deref(),
                priority: priority.as_deref(),
                due_date: due.as_deref(),
            })
            .map_err(CliError::Input)?;
            let task = settle(ctx, api.create_task(session, &new_task).await)?;
            emit_task(ctx, "Created", &task)
        }
        TasksSubcommand::Edit { task_id, title, description, priority, due } => {
            let update = build_update(&TaskForm {
                title: title.as_deref(),
                description: description.as_deref(),
                priority: priority.as_deref(),
                due_date: due.as_deref(),
            })
            .map_err(CliError::Input)?;
            let task = settle(ctx, api.update_task(session, &task_id, &update).await)?;
            emit_task(ctx, "Updated", &task)
        }
        TasksSubcommand::Complete { task_id } => {
            let task = settle(ctx, api.set_completion(session, &task_id, true).await)?;
            emit_task(ctx, "Completed", &task)
        }
        TasksSubcommand::Reopen { task_id } => {
            let task = settle(ctx, api.set_completion(session, &task_id, false).await)?;
            emit_task(ctx, "Reopened", &task)
        }
        TasksSubcommand::Delete { task_id, yes } => {
            if !yes && !prompt_confirm("Are you sure you want to delete this task?")? {
                return emit(ctx.json, &json!({ "deleted": null }), || "Cancelled.".to_owned());
            }
            settle(ctx, api.delete_task(session, &task_id).await)?;
            emit(ctx.json, &json!({ "deleted": task_id }), || format!("Deleted {task_id}"))
        }
    }
}

fn emit_task(ctx: &CliContext, verb: &str, task: &Task) -> Result<(), CliError> {
    emit(ctx.json, task, || format!("{verb} {}", task_line(task)))
}

// =============================================================================
// PLUMBING
// =============================================================================

/// The service rejected the session itself rather than the request.
fn is_auth_rejection(error: &ClientError) -> bool {
    matches!(error, ClientError::AuthenticationRequired | ClientError::Api { status: 401, .. })
}

/// Drop the local session when the service no longer accepts it.
fn settle<S: TokenStore, T>(ctx: &CliContext<S>, result: Result<T, ClientError>) -> Result<T, CliError> {
    result.map_err(|error| {
        if is_auth_rejection(&error) {
            warn!(code = error.error_code(), "session rejected; clearing local session");
            ctx.sessions.expire();
            return CliError::NotLoggedIn;
        }
        CliError::Client(error)
    })
}

fn emit<T: Serialize + ?Sized>(json: bool, value: &T, text: impl FnOnce() -> String) -> Result<(), CliError> {
    let rendered = if json { serde_json::to_string_pretty(value)? } else { text() };
    let mut stdout = io::stdout().lock();
    writeln!(stdout, "{rendered}")?;
    Ok(())
}

fn prompt_secret() -> Result<String, CliError> {
    eprint!("Password: ");
    io::stderr().flush()?;
    read_secret(io::stdin().lock())
}

fn prompt_confirm(question: &str) -> Result<bool, CliError> {
    eprint!("{question} [y/N] ");
    io::stderr().flush()?;
    read_confirmation(io::stdin().lock())
}

/// `y` or `yes` (any case) confirms; anything else, including EOF, declines.
fn read_confirmation(mut reader: impl BufRead) -> Result<bool, CliError> {
    let mut line = String::new();
    reader.read_line(&mut line)?;
    let answer = line.trim();
    Ok(answer.eq_ignore_ascii_case("y") || answer.eq_ignore_ascii_case("yes"))
}

/// One line from `reader`, without its line terminator.
fn read_secret(mut reader: impl BufRead) -> Result<String, CliError> {
    let mut line = String::new();
    reader.read_line(&mut line)?;
    let secret = line.trim_end_matches(['\r', '\n']);
    if secret.is_empty() {
        return Err(CliError::Input("Enter both email and password.".to_owned()));
    }
    Ok(secret.to_owned())
}
