//! sqlguard - a read-only SQL gatekeeper for LLM agents.

mod cli;

use cli::{Cli, Command};
use serde::Serialize;
use sqlguard::config::Config;
use sqlguard::db;
use sqlguard::error::{Result, SqlGuardError};
use sqlguard::llm::{build_system_prompt, dispatch_tool_call, get_tool_definitions, ToolCall};
use sqlguard::logging;
use sqlguard::query::GuardedExecutor;
use tracing::{error, info};

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    let cli = Cli::parse_args();
    init_logging(&cli);

    if let Err(e) = run(cli).await {
        error!("{}: {}", e.category(), e);
        std::process::exit(1);
    }
}

fn init_logging(cli: &Cli) {
    match &cli.log_file {
        Some(path) => {
            if let Err(e) = logging::init_file_logging(path, cli.verbose) {
                eprintln!("Warning: {e}; logging to stderr");
                logging::init_stderr_logging(cli.verbose);
            }
        }
        None => logging::init_stderr_logging(cli.verbose),
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config = load_config(&cli)?;

    match &cli.command {
        Command::Tool => return print_json(&get_tool_definitions()),
        Command::Check { sql } => {
            let verdict = config.guard().check(sql);
            println!("{verdict}");
            verdict.into_result()?;
            return Ok(());
        }
        _ => {}
    }

    info!("Database: {}", config.database.location()?.display_string());
    let client = db::connect(&config.database).await?;
    let executor = GuardedExecutor::new(client, config.guard()).with_timeout(config.query_timeout());

    let result = run_with_store(&cli.command, &config, &executor).await;
    executor.close().await?;
    result
}

fn load_config(cli: &Cli) -> Result<Config> {
    let config_path = cli.config_path();
    info!("Loading config from: {}", config_path.display());
    let mut config = Config::load_from_file(&config_path)?;
    config.apply_env_defaults();
    cli.apply_overrides(&mut config);
    config.validate()?;
    info!(
        "Guard: {} mode, row cap {}, timeout {}s",
        config.guard.mode.as_str(),
        config.guard.row_cap,
        config.guard.query_timeout_secs
    );
    Ok(config)
}

async fn run_with_store(command: &Command, config: &Config, executor: &GuardedExecutor) -> Result<()> {
    match command {
        Command::Query { sql } => {
            let result = executor.execute(sql).await?;
            print_json(&result)
        }
        Command::Schema => {
            let schema = executor.schema().await?;
            print_json(&schema)
        }
        Command::Prompt => {
            let schema = executor.schema().await?;
            let prompt = build_system_prompt(
                &schema,
                config.prompt.notes.as_deref(),
                config.guard.row_cap,
            );
            println!("{prompt}");
            Ok(())
        }
        Command::Call { arguments } => {
            let call = ToolCall::new("cli", sqlguard::llm::EXECUTE_SQL_TOOL, arguments.clone());
            let result = dispatch_tool_call(executor, &call).await;
            println!("{}", result.content);
            Ok(())
        }
        Command::Tool | Command::Check { .. } => Err(SqlGuardError::internal(
            "command does not need a database connection",
        )),
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let text = serde_json::to_string_pretty(value)
        .map_err(|e| SqlGuardError::internal(format!("Failed to serialize output: {e}")))?;
    println!("{text}");
    Ok(())
}
