use clap::{Parser, Subcommand};

/// copilot-bridge: talk to GitHub Copilot from the command line.
#[derive(Parser, Debug)]
#[command(name = "copilot-bridge", version, about)]
pub struct Args {
    /// Config file path override.
    #[arg(long, global = true)]
    pub config: Option<String>,

    /// Log level (trace, debug, info, warn, error) or a full filter directive.
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Send one message and print the reply.
    Ask {
        /// Conversation id to continue. A new one is generated if omitted.
        #[arg(short, long)]
        conversation: Option<String>,

        /// Message text.
        #[arg(required = true)]
        text: Vec<String>,
    },

    /// Interactive chat on stdin. `/reset`, `/usage` and `/quit` are understood.
    Chat {
        #[arg(short, long)]
        conversation: Option<String>,
    },

    /// Exchange credentials and send one test message.
    Test,

    /// Print the effective configuration with secrets masked.
    Config,
}

pub fn parse() -> Args {
    Args::parse()
}

/// Turn `--log-level` into an `EnvFilter` directive. Bare levels are scoped
/// to this workspace's crates.
pub fn log_directive(level: &str) -> String {
    if level.contains('=') {
        level.to_string()
    } else {
        format!("copilot={level}")
    }
}
