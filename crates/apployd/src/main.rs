//! Command-line front end for the Apployd assistant.

use anyhow::{Context, bail};
use apployd::render::{conversation_line, memory_line, prompt_report, reply_text};
use apployd::slash::{SLASH_HELP, SlashCommand, parse_slash_command};
use apployd_config::{ApploydConfig, LayeredConfigOptions};
use apployd_core::{
    ApploydCoreError, ChatEngine, ChatReply, GeminiProvider, PromptAssembler, open_store,
};
use apployd_memory::{ConversationId, MemoryError, MemoryId, MemoryStore, MemoryType};
use clap::{Parser, Subcommand};
use log::{debug, info, warn};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};

/// Command-line options for the Apployd assistant.
#[derive(Parser)]
#[command(name = "apployd", version)]
struct Cli {
    /// Optional apployd.json5 file applied over the layered config
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Memory store file, overriding `memory.path`
    #[arg(long, global = true)]
    store: Option<PathBuf>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Chat interactively in the current conversation
    Chat {
        /// Print the reply as it streams in
        #[arg(long)]
        stream: bool,
    },
    /// Send a single message and print the reply
    Ask {
        #[arg(required = true)]
        message: Vec<String>,
        #[arg(long)]
        stream: bool,
    },
    /// Print the prompt that would be sent for a message
    Prompt {
        #[arg(required = true)]
        message: Vec<String>,
    },
    /// List stored memories
    Memories {
        /// Only show memories of this type
        #[arg(long = "type", value_parser = parse_memory_type)]
        memory_type: Option<MemoryType>,
        /// Case-insensitive search over text and keywords
        #[arg(long)]
        search: Option<String>,
    },
    /// Delete a memory
    Forget { id: MemoryId },
    /// List conversations, most recently updated first
    Conversations,
    /// Start a new conversation and make it current
    New,
    /// Make an existing conversation current
    Switch { id: ConversationId },
    /// Delete every memory and conversation
    Reset {
        /// Confirm the reset
        #[arg(long)]
        yes: bool,
    },
}

fn parse_memory_type(value: &str) -> Result<MemoryType, String> {
    MemoryType::parse(value).ok_or_else(|| {
        let known: Vec<_> = MemoryType::ALL.iter().map(|kind| kind.as_str()).collect();
        format!(
            "unknown memory type '{value}' (expected one of: {})",
            known.join(", ")
        )
    })
}

/// Entry point for the Apployd CLI.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    apployd::init_logging();

    let cli = Cli::parse();
    let cwd = std::env::current_dir().context("failed to resolve current working directory")?;
    let config = load_config(cli.config.as_deref(), &cwd)?;
    let mut memory_config = config.memory.clone();
    if let Some(path) = cli.store {
        memory_config.path = path;
    }
    let mut store = open_store(&memory_config, &cwd).context("failed to open memory store")?;

    match cli.command {
        Command::Chat { stream } => {
            let engine = build_engine(&config, &cwd)?;
            chat_loop(&engine, &mut store, stream).await
        }
        Command::Ask { message, stream } => {
            let engine = build_engine(&config, &cwd)?;
            let message = message.join(" ");
            let conversation = store.current_conversation_id();
            match send_message(&engine, &mut store, conversation, &message, stream).await {
                Ok(reply) => {
                    print_reply(&reply, stream);
                    Ok(())
                }
                Err(err) => bail!(err.user_message()),
            }
        }
        Command::Prompt { message } => {
            let today = chrono::Local::now().date_naive();
            let assembler = PromptAssembler::from_config(&config, &cwd, today)
                .context("failed to load system instructions")?;
            let message = message.join(" ");
            let prompt = assembler
                .preview(&store, store.current_conversation_id(), &message)
                .context("failed to assemble prompt")?;
            println!("{}", prompt_report(&prompt, &message));
            Ok(())
        }
        Command::Memories {
            memory_type,
            search,
        } => {
            list_memories(&store, memory_type, search.as_deref());
            Ok(())
        }
        Command::Forget { id } => {
            if !store.delete_memory(id).context("failed to delete memory")? {
                bail!("memory not found: {id}");
            }
            println!("forgot {id}");
            Ok(())
        }
        Command::Conversations => {
            list_conversations(&store);
            Ok(())
        }
        Command::New => {
            let id = store
                .create_conversation()
                .context("failed to create conversation")?;
            println!("{id}");
            Ok(())
        }
        Command::Switch { id } => {
            if !store
                .switch_conversation(id)
                .context("failed to switch conversation")?
            {
                bail!("conversation not found: {id}");
            }
            println!("switched to {id}");
            Ok(())
        }
        Command::Reset { yes } => {
            if !yes {
                bail!("reset deletes every memory and conversation; pass --yes to confirm");
            }
            let id = store.reset().context("failed to reset memory store")?;
            println!("store reset; current conversation {id}");
            Ok(())
        }
    }
}

/// Layered config from `cwd`, with `runtime` applied last when given.
fn load_config(runtime: Option<&Path>, cwd: &Path) -> anyhow::Result<ApploydConfig> {
    let mut options = LayeredConfigOptions::new(cwd);
    if let Some(path) = runtime {
        info!("loading config override from path: {}", path.display());
        options = options.with_runtime_path(path);
    }
    let layered = ApploydConfig::load_layered_with_options(options)
        .context("failed to load layered config")?;
    debug!("layered config loaded (layers={})", layered.layers.len());
    Ok(layered.config)
}

fn build_engine(config: &ApploydConfig, cwd: &Path) -> anyhow::Result<ChatEngine> {
    let provider = GeminiProvider::from_config(&config.completion)
        .context("failed to build completion provider")?;
    info!(
        "completion provider ready (provider={}, model={})",
        config.completion.provider, config.completion.model
    );
    ChatEngine::from_config(config, cwd, Arc::new(provider)).context("failed to build chat engine")
}

async fn send_message(
    engine: &ChatEngine,
    store: &mut MemoryStore,
    conversation: ConversationId,
    message: &str,
    stream: bool,
) -> Result<ChatReply, ApploydCoreError> {
    let history = engine.stored_history(store, conversation)?;
    if !stream {
        return engine.send(store, conversation, message, &history).await;
    }
    let mut printed = 0;
    let reply = engine
        .send_streaming(store, conversation, message, &history, |text| {
            print!("{}", &text[printed..]);
            let _ = std::io::stdout().flush();
            printed = text.len();
        })
        .await;
    println!();
    reply
}

fn print_reply(reply: &ChatReply, streamed: bool) {
    if !streamed {
        println!("{}", reply_text(&reply.segments));
    }
}

async fn chat_loop(
    engine: &ChatEngine,
    store: &mut MemoryStore,
    stream: bool,
) -> anyhow::Result<()> {
    println!(
        "Chatting in conversation {}. Type /help for commands.",
        store.current_conversation_id()
    );
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("> ");
        let _ = std::io::stdout().flush();
        let Some(line) = lines.next_line().await.context("failed to read input")? else {
            break;
        };
        let input = line.trim();
        if input.is_empty() {
            continue;
        }
        match parse_slash_command(input) {
            Ok(Some(SlashCommand::Quit)) => break,
            Ok(Some(command)) => {
                if let Err(err) = run_slash_command(store, command) {
                    eprintln!("error: {err:#}");
                }
                continue;
            }
            Ok(None) => {}
            Err(message) => {
                eprintln!("{message}");
                continue;
            }
        }

        let conversation = store.current_conversation_id();
        match send_message(engine, store, conversation, input, stream).await {
            Ok(reply) => print_reply(&reply, stream),
            Err(ApploydCoreError::Memory(MemoryError::Conflict { expected, found })) => {
                warn!("store changed on disk; reloading (expected={expected}, found={found})");
                store.reload().context("failed to reload memory store")?;
                eprintln!(
                    "The memory store was changed elsewhere and has been reloaded. Please resend."
                );
            }
            Err(err) => eprintln!("error: {}", err.user_message()),
        }
    }
    Ok(())
}

fn run_slash_command(store: &mut MemoryStore, command: SlashCommand) -> anyhow::Result<()> {
    match command {
        SlashCommand::New => {
            let id = store.create_conversation()?;
            println!("started conversation {id}");
        }
        SlashCommand::Switch(id) => {
            if store.switch_conversation(id)? {
                println!("switched to {id}");
            } else {
                println!("conversation not found: {id}");
            }
        }
        SlashCommand::Conversations => list_conversations(store),
        SlashCommand::Memories(query) => list_memories(store, None, query.as_deref()),
        SlashCommand::Forget(id) => {
            if store.delete_memory(id)? {
                println!("forgot {id}");
            } else {
                println!("memory not found: {id}");
            }
        }
        SlashCommand::Reset => {
            let id = store.reset()?;
            println!("store reset; current conversation {id}");
        }
        SlashCommand::Help => println!("{SLASH_HELP}"),
        SlashCommand::Quit => {}
    }
    Ok(())
}

fn list_memories(store: &MemoryStore, memory_type: Option<MemoryType>, search: Option<&str>) {
    let memories = match search {
        Some(query) => store.search_memories(query),
        None => store.memories(),
    };
    let mut shown = 0;
    for memory in memories
        .into_iter()
        .filter(|memory| memory_type.is_none_or(|kind| memory.memory_type == kind))
    {
        println!("{}", memory_line(memory));
        shown += 1;
    }
    if shown == 0 {
        println!("no memories");
    }
}

fn list_conversations(store: &MemoryStore) {
    let current = store.current_conversation_id();
    for conversation in store.conversations() {
        println!("{}", conversation_line(conversation, conversation.id == current));
    }
}
