use std::path::PathBuf;
use std::time::Duration;

use anyhow::anyhow;
use clap::{Parser, Subcommand};
use url::Url;

use crate::config::{mask_secret, Config};
use crate::context::Context;
use crate::util::prompt;

mod editor;
mod projects;
mod review;
mod tasks;
mod watch;

use projects::ProjectCommand;
use tasks::TaskCommand;

#[derive(Subcommand)]
enum Command {
    /// Store the API token for the orchestration server
    Login {
        /// Also change the server URL
        #[clap(long)]
        api_url: Option<Url>,
    },
    /// Show the settings in effect
    Config,
    /// Manage projects
    #[clap(subcommand)]
    Projects(ProjectCommand),
    /// Create and inspect tasks
    #[clap(subcommand)]
    Task(TaskCommand),
    /// Print the current status of a task
    Status { task_id: String },
    /// Follow a task until it completes, fails or is rejected
    ///
    /// Exits with an error status unless the task completes.
    Watch {
        task_id: String,
        /// Poll interval in milliseconds
        #[clap(long)]
        interval_ms: Option<u64>,
    },
    /// Print or save the implementation plan of a task
    Plan {
        task_id: String,
        /// Write the plan to this file or directory
        #[clap(short, long)]
        output: Option<PathBuf>,
    },
    /// Print or save the completion report of a task
    Report {
        task_id: String,
        /// Write the report to this file or directory
        #[clap(short, long)]
        output: Option<PathBuf>,
    },
    /// Approve a plan that is awaiting review
    Approve { task_id: String },
    /// Send a plan back for revision
    Revise {
        task_id: String,
        /// Feedback for the planner. Opens $EDITOR when omitted.
        #[clap(short = 'm')]
        message: Option<String>,
    },
    /// Reject a plan and cancel the task
    Reject {
        task_id: String,
        /// Do not ask for confirmation
        #[clap(long)]
        yes: bool,
    },
}

#[derive(Parser)]
#[clap(version, author, about, long_about = None)]
struct Cli {
    /// Enable trace logging
    #[clap(long, global = true)]
    trace: bool,
    /// Enable debug logging
    #[clap(long, global = true)]
    debug: bool,
    /// Print JSON instead of text
    #[clap(long, global = true)]
    json: bool,
    #[clap(subcommand)]
    command: Command,
}

pub fn exec() {
    let cli = Cli::parse();
    let mut builder = env_logger::Builder::from_default_env();
    builder
        .format_timestamp(None)
        .format_level(false)
        .format_target(false);

    if cli.trace {
        builder.filter_level(log::LevelFilter::Trace);
    } else if cli.debug {
        builder.filter_level(log::LevelFilter::Debug);
    } else {
        builder.filter_level(log::LevelFilter::Warn);
    }

    builder.init();

    let result = tokio::runtime::Runtime::new()
        .map_err(|err| anyhow!("Failed to create runtime: {err}"))
        .and_then(|runtime| runtime.block_on(run(cli.command, cli.json)));
    if let Err(err) = result {
        eprintln!("Error: {err:#}");
        std::process::exit(1);
    }
}

async fn run(command: Command, json: bool) -> anyhow::Result<()> {
    let config = Config::load_or_create()?;
    let ctx = || Context::from_config(&config, json);
    match command {
        Command::Login { api_url } => login(config.clone(), api_url),
        Command::Config => show_config(&config, json),
        Command::Projects(command) => projects::run(&ctx()?, command).await,
        Command::Task(command) => tasks::run(&ctx()?, command).await,
        Command::Status { task_id } => tasks::status(&ctx()?, &task_id).await,
        Command::Watch {
            task_id,
            interval_ms,
        } => {
            let interval = interval_ms.map(Duration::from_millis);
            watch::watch(&ctx()?, &task_id, interval).await
        }
        Command::Plan { task_id, output } => tasks::plan(&ctx()?, &task_id, output).await,
        Command::Report { task_id, output } => tasks::report(&ctx()?, &task_id, output).await,
        Command::Approve { task_id } => review::approve(&ctx()?, &task_id).await,
        Command::Revise { task_id, message } => review::revise(&ctx()?, &task_id, message).await,
        Command::Reject { task_id, yes } => review::reject(&ctx()?, &task_id, yes).await,
    }
}

fn login(mut config: Config, api_url: Option<Url>) -> anyhow::Result<()> {
    if let Some(api_url) = api_url {
        config.api_url = Some(api_url);
    }
    println!("Logging in to {}", config.api_url()?);

    let token = prompt("Please enter your API token: ")?;
    if token.is_empty() {
        return Err(anyhow!("No API token provided."));
    }
    config.api_token = Some(token);
    config.save()?;

    println!("Your API token has been saved to the config file at:");
    println!("{}", Config::filepath()?.to_string_lossy());
    Ok(())
}

fn show_config(config: &Config, json: bool) -> anyhow::Result<()> {
    let api_url = config.api_url()?;
    let token = config.api_token().map(|token| mask_secret(&token));
    let interval_ms = config.poll_interval().as_millis() as u64;
    let path = Config::filepath()?;
    if json {
        let value = serde_json::json!({
            "config_file": path,
            "api_url": api_url,
            "api_token": token,
            "poll_interval_ms": interval_ms,
        });
        println!("{}", serde_json::to_string_pretty(&value)?);
        return Ok(());
    }
    println!("Config file:   {}", path.display());
    println!("API URL:       {api_url}");
    println!(
        "API token:     {}",
        token.as_deref().unwrap_or("(none, run `conductor login`)")
    );
    println!("Poll interval: {interval_ms} ms");
    Ok(())
}
