//! wizard-agent command line.

use std::io::Write;
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tokio::io::{AsyncBufReadExt, BufReader};
use wizard_agent::scenarios::{run_scenarios, SCENARIOS};
use wizard_agent::{
    init_tracing, model_from_config, openai_tools, standard_toolkit, Agent, AgentConfig,
    AgentError, AgentRun, Orchestrator, Result, ToolsConfig,
};

/// Tool-calling agent for weather, books, jokes, dog pictures and trivia.
///
/// Settings come from the TOML file in WIZARD_CONFIG, WIZARD_* variables and
/// a `.env` file; WIZARD_API_KEY (or DEEPINFRA_API_KEY) is required.
#[derive(Debug, Parser)]
#[command(name = "wizard-agent", version)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, Subcommand, PartialEq)]
enum Command {
    /// Interactive session with the tool-calling agent (default)
    Chat,
    /// Answer one request and exit
    Ask {
        #[arg(required = true, num_args = 1.., allow_negative_numbers = true)]
        text: Vec<String>,
    },
    /// Interactive session with keyword-based tool selection
    Keyword,
    /// Run the canned scenarios; exits non-zero if any fails
    Scenarios,
    /// Print the tool schemas as JSON
    Tools,
    /// Start the web UI
    #[cfg(feature = "server")]
    Serve,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing();
    match run(cli.command.unwrap_or(Command::Chat)).await {
        Ok(code) => code,
        Err(err) => {
            eprintln!("error: {err}");
            ExitCode::FAILURE
        }
    }
}

async fn run(command: Command) -> Result<ExitCode> {
    match command {
        Command::Chat => {
            let agent = Agent::from_config(&AgentConfig::from_env()?)?;
            println!("Tools: {}", tool_names(&agent));
            let agent = &agent;
            repl(|line| async move { agent.run(line).await }).await?;
        }
        Command::Ask { text } => {
            let agent = Agent::from_config(&AgentConfig::from_env()?)?;
            let run = agent.run(text.join(" ")).await?;
            println!("{}", run.answer);
        }
        Command::Keyword => {
            let cfg = AgentConfig::from_env()?;
            let tools = Arc::new(standard_toolkit(&cfg.tools)?);
            let orchestrator = Orchestrator::keyword(model_from_config(&cfg)?, tools);
            let orchestrator = &orchestrator;
            repl(|line| async move { orchestrator.run(&line).await }).await?;
        }
        Command::Scenarios => {
            let agent = Agent::from_config(&AgentConfig::from_env()?)?;
            let report = run_scenarios(&agent, &SCENARIOS).await;
            for outcome in &report.outcomes {
                let mark = if outcome.passed { "PASS" } else { "FAIL" };
                println!(
                    "[{mark}] {} (tools: {})",
                    outcome.name,
                    outcome.called_tools.join(", ")
                );
                if let Some(error) = &outcome.error {
                    println!("       error: {error}");
                } else if !outcome.missing_tools.is_empty() {
                    println!("       missing: {}", outcome.missing_tools.join(", "));
                }
            }
            println!(
                "{} passed, {} failed, {} total",
                report.passed(),
                report.failed(),
                report.outcomes.len()
            );
            if !report.all_passed() {
                return Ok(ExitCode::FAILURE);
            }
        }
        Command::Tools => {
            let tools = standard_toolkit(&ToolsConfig::default())?;
            let schemas = serde_json::to_string_pretty(&openai_tools(&tools.schemas()))?;
            println!("{schemas}");
        }
        #[cfg(feature = "server")]
        Command::Serve => {
            let cfg = AgentConfig::from_env()?;
            let addr = format!("{}:{}", cfg.server.host, cfg.server.port);
            let agent = Agent::from_config(&cfg)?;
            tracing::info!(%addr, model = %cfg.model, "starting web ui");
            wizard_agent::serve(wizard_agent::AppState::new(agent), addr).await?;
        }
    }
    Ok(ExitCode::SUCCESS)
}

fn tool_names(agent: &Agent) -> String {
    agent
        .tools()
        .names()
        .iter()
        .map(|name| name.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Reads requests from stdin until EOF or `exit`/`quit`/`q`. Errors of a
/// single request are printed and the session continues.
async fn repl<F, Fut>(handle: F) -> Result<()>
where
    F: Fn(String) -> Fut,
    Fut: std::future::Future<Output = Result<AgentRun>>,
{
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("\nYou: ");
        std::io::stdout().flush()?;
        let Some(line) = lines.next_line().await? else {
            break;
        };
        let line = line.trim().to_string();
        if line.is_empty() {
            continue;
        }
        if matches!(line.to_lowercase().as_str(), "exit" | "quit" | "q") {
            break;
        }
        match handle(line).await {
            Ok(run) => println!(
                "\nAgent: {}\n({} model calls, {} tool calls)",
                run.answer,
                run.iterations,
                run.tool_calls().len()
            ),
            Err(AgentError::IterationExhausted {
                max_iterations,
                partial,
            }) => {
                println!("\nAgent gave up after {max_iterations} model calls.");
                if let Some(partial) = partial {
                    println!("Last words: {partial}");
                }
            }
            Err(err) => println!("\nError [{}]: {err}", err.kind()),
        }
    }
    println!("Goodbye!");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::error::ErrorKind;
    use clap::CommandFactory;

    fn parse(args: &[&str]) -> std::result::Result<Cli, clap::Error> {
        Cli::try_parse_from(std::iter::once("wizard-agent").chain(args.iter().copied()))
    }

    #[test]
    fn command_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn no_subcommand_means_chat() {
        assert_eq!(parse(&[]).unwrap().command, None);
        assert_eq!(parse(&["chat"]).unwrap().command, Some(Command::Chat));
    }

    #[test]
    fn ask_joins_the_remaining_words() {
        let cli = parse(&["ask", "Recommend", "2", "mystery", "books"]).unwrap();
        let Some(Command::Ask { text }) = cli.command else {
            panic!("expected ask");
        };
        assert_eq!(text.join(" "), "Recommend 2 mystery books");

        let cli = parse(&["ask", "weather", "at", "40.7128", "-74.0060"]).unwrap();
        let Some(Command::Ask { text }) = cli.command else {
            panic!("expected ask");
        };
        assert_eq!(text.last().map(String::as_str), Some("-74.0060"));
    }

    #[test]
    fn help_and_unknown_flags_never_reach_the_model() {
        assert_eq!(parse(&["ask", "--help"]).unwrap_err().kind(), ErrorKind::DisplayHelp);
        assert_eq!(
            parse(&["ask"]).unwrap_err().kind(),
            ErrorKind::MissingRequiredArgument
        );
        assert_eq!(
            parse(&["--verbose", "chat"]).unwrap_err().kind(),
            ErrorKind::UnknownArgument
        );
        assert_eq!(
            parse(&["launch"]).unwrap_err().kind(),
            ErrorKind::InvalidSubcommand
        );
    }
}
