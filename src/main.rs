//! Returns concierge
//!
//! Line-oriented chat front end for the orchestrator: each stdin line is one
//! user turn, and the transcript is carried from turn to turn.

use std::io::Write;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use dotenvy::dotenv;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};
use uuid::Uuid;

use returns_concierge::config::{AppConfig, Cli};
use returns_concierge::conversation::Transcript;
use returns_concierge::llm::{ChatCompletionsClient, Orchestrator, TurnOutcome};
use returns_concierge::mcp::{HttpToolProvider, ToolProvider};

fn init_tracing() {
    let json = std::env::var("LOG_FORMAT").is_ok_and(|v| v.eq_ignore_ascii_case("json"));
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    // Logs go to stderr so replies on stdout stay clean.
    tracing_subscriber::registry()
        .with(filter)
        .with((!json).then(|| fmt::layer().with_target(true).with_writer(std::io::stderr)))
        .with(json.then(|| fmt::layer().json().with_writer(std::io::stderr)))
        .init();
}

async fn run_turn(
    orchestrator: &Orchestrator,
    transcript: Transcript,
    message: &str,
    no_tools: bool,
) -> TurnOutcome {
    if no_tools {
        orchestrator.respond_without_tools(transcript, message).await
    } else {
        orchestrator.respond(transcript, message).await
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env (if present) before clap reads env-backed flags
    let _ = dotenv();
    init_tracing();

    let cli = Cli::parse();
    let config = AppConfig::load_from_cli(&cli).context("failed to load configuration")?;

    let completion_settings = config.completion_settings();
    info!(
        name: "completion.config.loaded",
        base_url = %completion_settings.base_url,
        model = %completion_settings.model,
        provider = ?completion_settings.provider,
        "Completion configuration loaded"
    );
    if completion_settings.api_key.is_none() {
        warn!("No completion API key configured; requests will be unauthenticated");
    }

    let tools = Arc::new(HttpToolProvider::new(config.tool_provider_settings()));
    match tools.list_tools().await {
        Ok(found) => {
            for tool in &found {
                info!(name: "mcp.tool.discovered", tool = %tool.name, "MCP tool discovered");
            }
        }
        Err(e) => warn!(
            url = %tools.settings().url,
            error = %e,
            "Tool provider not reachable at startup; turns will retry discovery"
        ),
    }

    let completion = Arc::new(ChatCompletionsClient::new(completion_settings));
    let orchestrator = Orchestrator::new(completion, tools, config.turn_settings());

    if let Some(message) = cli.once.as_deref() {
        let outcome = run_turn(&orchestrator, Transcript::new(), message, cli.no_tools).await;
        println!("{}", outcome.response_text);
        return Ok(());
    }

    let mut transcript = Transcript::new().with_correlation_id(Uuid::new_v4().to_string());
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        print!("> ");
        std::io::stdout().flush().context("failed to flush stdout")?;

        let Some(line) = lines.next_line().await.context("failed to read stdin")? else {
            break;
        };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if matches!(line, "exit" | "quit") {
            break;
        }

        let outcome = run_turn(&orchestrator, transcript, line, cli.no_tools).await;
        println!("{}", outcome.response_text);
        transcript = outcome.transcript;
    }

    info!(message_count = transcript.len(), "Session ended");
    Ok(())
}
