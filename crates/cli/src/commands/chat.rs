//! `switchyard chat`: Talk to the agents from the terminal.
//!
//! Runs the same pipeline as `POST /chat`, without the HTTP layer.

use std::io::Write;

use switchyard_agent::{AgentRuntime, TurnOutcome};
use switchyard_config::AppConfig;
use switchyard_core::chat::ChatRequest;
use switchyard_providers::ProviderMode;
use tokio::io::{AsyncBufReadExt, BufReader};

pub struct ChatOptions {
    pub user: String,
    pub conversation: Option<String>,
    pub skip_ingest: bool,
    pub trace: bool,
}

pub async fn run(
    config: AppConfig,
    message: Option<String>,
    options: ChatOptions,
) -> Result<(), Box<dyn std::error::Error>> {
    let runtime = AgentRuntime::from_config(config).await;
    let conversation = options
        .conversation
        .clone()
        .unwrap_or_else(|| format!("cli-{}", uuid::Uuid::new_v4().simple()));

    if let Some(msg) = message {
        // Single message mode: index first so knowledge answers are grounded.
        if !options.skip_ingest && !runtime.knowledge_status().state().is_ready() {
            eprint!("  Indexing help center...");
            let result = runtime.ingest_now().await;
            eprint!("\r                          \r");
            if let Err(e) = result {
                eprintln!("  ⚠️  Ingestion failed: {e}");
            }
        }

        eprint!("  Thinking...");
        let outcome = turn(&runtime, &msg, &options.user, &conversation).await;
        eprint!("\r              \r");
        print_outcome(&outcome?, options.trace);
        return Ok(());
    }

    // Interactive mode
    if !options.skip_ingest && !runtime.knowledge_status().state().is_ready() {
        runtime.start_background_ingestion();
    }

    println!();
    println!("  ╔══════════════════════════════════════════════╗");
    println!("  ║        Switchyard — Interactive Chat         ║");
    println!("  ╚══════════════════════════════════════════════╝");
    println!();
    println!("  Provider:      {}", runtime.provider_name());
    if runtime.provider_mode() == ProviderMode::Mock {
        println!("                 (offline mock, no API key configured)");
    }
    println!("  Help center:   {}", runtime.config().knowledge.root_url);
    println!("  Knowledge:     {}", runtime.knowledge_status().state().as_str());
    println!("  User:          {}", options.user);
    println!("  Conversation:  {conversation}");
    println!();
    println!("  Type your message and press Enter.");
    println!("  Type 'exit' or Ctrl+C to quit.");
    println!();

    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    print!("  You > ");
    std::io::stdout().flush()?;

    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line == "exit" || line == "quit" {
            break;
        }
        if line.is_empty() {
            print!("  You > ");
            std::io::stdout().flush()?;
            continue;
        }

        eprint!("  ...");
        match turn(&runtime, line, &options.user, &conversation).await {
            Ok(outcome) => {
                eprint!("\r     \r");
                println!();
                print_outcome(&outcome, options.trace);
                println!();
            }
            Err(e) => {
                eprint!("\r     \r");
                eprintln!("  [{}] {}", e.code(), e.public_message());
                println!();
            }
        }

        print!("  You > ");
        std::io::stdout().flush()?;
    }

    println!();
    println!("  Goodbye!");
    Ok(())
}

async fn turn(
    runtime: &AgentRuntime,
    message: &str,
    user: &str,
    conversation: &str,
) -> switchyard_core::Result<TurnOutcome> {
    let request = ChatRequest::new(message, user, conversation);
    let request_id = uuid::Uuid::new_v4().to_string();
    runtime.orchestrator().run_turn(&request, &request_id).await
}

fn print_outcome(outcome: &TurnOutcome, trace: bool) {
    for line in outcome.response.response.lines() {
        println!("  Assistant > {line}");
    }

    if let Some(sources) = &outcome.agent_response.sources {
        println!();
        for source in sources {
            println!("  📎 {source}");
        }
    }

    if trace {
        println!();
        println!("  ↳ {}", outcome.response.source_agent_response);
        for step in &outcome.response.agent_workflow {
            println!("    • {}: {}", step.agent, step.decision);
        }
    }
}
