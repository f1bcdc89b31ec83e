//! message-bridge - read and send iMessages from the command line or over MCP
//!
//! Usage: message-bridge [OPTIONS] <COMMAND>

use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::{generate, Shell};
use message_bridge_lib::bridge::{MessageBridge, DEFAULT_HOURS};
use message_bridge_lib::settings::Settings;
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "message-bridge")]
#[command(version, about = "Messages and AddressBook bridge", long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Messages database path (default: ~/Library/Messages/chat.db)
    #[arg(long, global = true)]
    messages_db: Option<PathBuf>,

    /// AddressBook directory (default: ~/Library/Application Support/AddressBook)
    #[arg(long, global = true)]
    addressbook_dir: Option<PathBuf>,

    /// Detailed logging
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show recent messages
    Messages {
        /// Hours to look back
        #[arg(long, default_value_t = DEFAULT_HOURS)]
        hours: u32,
        /// Only messages with this name, number, email or contact:N
        #[arg(long)]
        contact: Option<String>,
    },
    /// Send a message to a name, number, email or contact:N
    Send {
        recipient: String,
        message: String,
    },
    /// Fuzzy search the address book
    FindContact {
        name: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show the loaded contact directory
    Contacts,
    /// Check access to the Messages database
    CheckDb,
    /// Check access to the AddressBook databases
    CheckAddressbook,
    /// Run as an MCP server
    McpServer {
        /// Use stdio transport (required)
        #[arg(long)]
        stdio: bool,
    },
    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

fn init_logging(verbose: bool) {
    // stdout carries the MCP protocol; logs go to stderr only
    let default = if verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default))
        .target(env_logger::Target::Stderr)
        .init();
}

#[tokio::main]
async fn main() {
    // Ignore SIGPIPE so piping through head doesn't kill the process.
    #[cfg(unix)]
    unsafe {
        libc::signal(libc::SIGPIPE, libc::SIG_IGN);
    }

    let cli = Cli::parse();
    init_logging(cli.verbose);

    if let Err(e) = run_cli(cli).await {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

async fn run_cli(cli: Cli) -> Result<(), String> {
    let mut settings = Settings::resolve();
    if let Some(path) = cli.messages_db {
        settings.messages_db_path = Some(path);
    }
    if let Some(dir) = cli.addressbook_dir {
        settings.addressbook_dir = Some(dir);
    }
    log::debug!("messages db: {}", settings.messages_db().display());
    let bridge = Arc::new(MessageBridge::from_settings(settings));

    match cli.command {
        Commands::Messages { hours, contact } => {
            println!("{}", bridge.get_recent_messages(hours, contact.as_deref()));
        }
        Commands::Send { recipient, message } => {
            let reply = bridge.send_message(&recipient, &message);
            println!("{}", reply);
            if reply.starts_with("Error") {
                return Err("send failed".to_string());
            }
        }
        Commands::FindContact { name, json } => {
            let matches = bridge.find_contact(&name);
            if json {
                let out = serde_json::to_string_pretty(&matches).map_err(|e| e.to_string())?;
                println!("{}", out);
            } else if matches.is_empty() {
                println!("No contacts found matching '{}'.", name);
            } else {
                for (i, m) in matches.iter().enumerate() {
                    println!("{}. {} ({}) {:.2}", i + 1, m.name, m.phone, m.score);
                }
            }
        }
        Commands::Contacts => println!("{}", bridge.check_contacts()),
        Commands::CheckDb => println!("{}", bridge.check_db_access()),
        Commands::CheckAddressbook => println!("{}", bridge.check_addressbook_access()),
        Commands::McpServer { stdio } => {
            if !stdio {
                return Err("Only --stdio transport is currently supported".to_string());
            }
            #[cfg(feature = "mcp")]
            return message_bridge_lib::mcp::run_mcp_server(bridge).await;
            #[cfg(not(feature = "mcp"))]
            return Err("built without the `mcp` feature".to_string());
        }
        Commands::Completions { shell } => {
            generate(shell, &mut Cli::command(), "message-bridge", &mut std::io::stdout());
        }
    }
    Ok(())
}
