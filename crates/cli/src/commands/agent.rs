//! `slo agent`: interactive or single-message chat mode.

use super::open_backend;
use slo_agent::{AgentLoop, ChatService, TurnResponse};
use slo_config::AppConfig;
use slo_core::{ToolCallOutcome, UserId};
use slo_providers::AnthropicProvider;
use std::io::Write;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};

pub struct AgentOptions {
    pub user_id: UserId,
    pub confirm_writes: bool,
    pub show_trace: bool,
}

pub async fn run(message: Option<String>, options: AgentOptions) -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;

    if !config.has_api_key() {
        eprintln!();
        eprintln!("  ERROR: No Anthropic API key configured!");
        eprintln!();
        eprintln!("  Set the environment variable:");
        eprintln!("    export ANTHROPIC_API_KEY='sk-ant-...'");
        eprintln!();
        eprintln!("  Or add it to the [provider] section of:");
        eprintln!("    {}", AppConfig::config_dir().join("config.toml").display());
        eprintln!();
        return Err("No API key found. See above for setup instructions.".into());
    }

    let backend = open_backend(&config).await?;
    let provider = Arc::new(AnthropicProvider::from_config(&config.provider));
    let tools = Arc::new(slo_tools::default_registry(&backend.stores));
    let tool_count = tools.names().len();

    let agent = AgentLoop::new(provider, tools, backend.stores)
        .with_config(&config)
        .with_history(backend.history.clone(), config.history.limit);
    let chat = ChatService::new(Arc::new(agent), backend.history)
        .with_history_enabled(config.history.enabled);

    if let Some(msg) = message {
        eprint!("  Thinking...");
        let response = chat.send(options.user_id, &msg, options.confirm_writes).await;
        eprint!("\r              \r");
        println!("{}", response.text);
        if options.show_trace {
            print_trace(&response);
        }
        return Ok(());
    }

    println!();
    println!("  Slo Agent: Interactive Mode");
    println!();
    println!("  Model:     {}", config.provider.model);
    println!("  Tools:     {tool_count}");
    println!("  User:      {}", options.user_id);
    println!("  Confirm:   {}", if options.confirm_writes { "on" } else { "off" });
    println!();
    println!("  Type your message and press Enter.");
    println!("  Type 'exit' or Ctrl+C to quit.");
    println!();

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("  You > ");
        std::io::stdout().flush()?;

        let Some(line) = lines.next_line().await? else {
            break;
        };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if matches!(line, "exit" | "quit") {
            break;
        }

        eprint!("  ...");
        let response = chat.send(options.user_id, line, options.confirm_writes).await;
        eprint!("\r     \r");
        println!();
        for text_line in response.text.lines() {
            println!("  Slo > {text_line}");
        }
        if options.show_trace {
            print_trace(&response);
        }
        println!();
    }

    println!();
    println!("  Goodbye!");
    println!();
    Ok(())
}

fn print_trace(response: &TurnResponse) {
    for call in &response.tool_calls {
        match &call.outcome {
            ToolCallOutcome::Result(value) => {
                println!("  [tool] {} {} -> {}", call.name, call.input, value)
            }
            ToolCallOutcome::Error(message) => {
                println!("  [tool] {} {} -> error: {message}", call.name, call.input)
            }
        }
    }
}
