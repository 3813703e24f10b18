//! Command-line interface definition using clap.

use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, Subcommand};
use kanban_board::BoardConfig;
use kanban_gateway::ChatwootConfig;
use kanban_models::UNASSIGNED_LABEL;

/// Kanban - contact pipeline board for Chatwoot
#[derive(Parser, Debug)]
#[command(name = "kanban")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Chatwoot base URL
    #[arg(long, env = "CHATWOOT_URL", global = true)]
    pub url: Option<String>,

    /// Chatwoot account ID
    #[arg(long, env = "CHATWOOT_ACCOUNT_ID", global = true)]
    pub account_id: Option<String>,

    /// Chatwoot API access token
    #[arg(long, env = "CHATWOOT_API_TOKEN", hide_env_values = true, global = true)]
    pub token: Option<String>,

    /// Only offer attributes whose key starts with this prefix
    #[arg(long, env = "KANBAN_ATTRIBUTE_PREFIX", global = true)]
    pub attribute_prefix: Option<String>,

    /// Custom attributes with this prefix are shown on cards
    #[arg(long, env = "KANBAN_CARD_PREFIX", default_value = "kbw_", global = true)]
    pub card_prefix: String,

    /// Contacts requested per page
    #[arg(long, env = "KANBAN_PAGE_SIZE", default_value_t = 15, global = true)]
    pub page_size: u32,

    /// Label of the stage holding contacts without a value
    #[arg(long, env = "KANBAN_UNASSIGNED_LABEL", default_value = UNASSIGNED_LABEL, global = true)]
    pub unassigned_label: String,

    /// Request timeout in seconds
    #[arg(long, default_value_t = 30, global = true)]
    pub timeout: u64,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// List the attributes a board can be built from
    Attributes {
        /// Output format (table, json)
        #[arg(short, long, default_value = "table")]
        format: OutputFormat,
    },

    /// Show the board for an attribute
    Board {
        /// Attribute key (default: first available)
        #[arg(short, long, env = "KANBAN_ATTRIBUTE")]
        attribute: Option<String>,

        /// Load every page of every stage
        #[arg(long)]
        all: bool,

        /// Output format (table, json)
        #[arg(short, long, default_value = "table")]
        format: OutputFormat,
    },

    /// Load the next page of one stage
    More {
        /// Stage value, or "-" for unassigned
        #[arg(required = true)]
        stage: String,

        /// Attribute key (default: first available)
        #[arg(short, long, env = "KANBAN_ATTRIBUTE")]
        attribute: Option<String>,

        /// Output format (table, json)
        #[arg(short, long, default_value = "table")]
        format: OutputFormat,
    },

    /// Move a contact to another stage
    Move {
        /// Contact ID
        #[arg(required = true)]
        contact: String,

        /// Stage the contact is in
        #[arg(long)]
        from: String,

        /// Stage to move it to ("-" for unassigned)
        #[arg(long)]
        to: String,

        /// Attribute key (default: first available)
        #[arg(short, long, env = "KANBAN_ATTRIBUTE")]
        attribute: Option<String>,
    },

    /// Show the resolved connection settings
    Config,
}

/// Output format for listing commands
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    #[default]
    Table,
    Json,
}

/// User-level env file, loaded after `.env.local`.
pub fn env_file() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("kanban").join(".env"))
}

impl Cli {
    /// Returns the log level based on verbosity.
    pub fn log_level(&self) -> tracing::Level {
        match self.verbose {
            0 => tracing::Level::WARN,
            1 => tracing::Level::INFO,
            2 => tracing::Level::DEBUG,
            _ => tracing::Level::TRACE,
        }
    }

    /// Builds the Chatwoot connection from flags and environment.
    pub fn chatwoot_config(&self) -> kanban_gateway::Result<ChatwootConfig> {
        let config = ChatwootConfig::new(
            self.url.as_deref().unwrap_or_default(),
            self.account_id.clone().unwrap_or_default(),
            self.token.clone().unwrap_or_default(),
        )?
        .with_timeout(Duration::from_secs(self.timeout));

        Ok(match self.attribute_prefix.as_deref() {
            Some(prefix) if !prefix.is_empty() => config.with_attribute_prefix(prefix),
            _ => config,
        })
    }

    /// Builds the board configuration.
    pub fn board_config(&self) -> BoardConfig {
        BoardConfig::default()
            .with_page_size(self.page_size)
            .with_unassigned_label(self.unassigned_label.clone())
            .with_preferred_attribute(self.command.attribute().map(String::from))
    }
}

impl Commands {
    /// Returns the attribute the command asks for, if any.
    pub fn attribute(&self) -> Option<&str> {
        match self {
            Commands::Board { attribute, .. }
            | Commands::More { attribute, .. }
            | Commands::Move { attribute, .. } => attribute.as_deref(),
            Commands::Attributes { .. } | Commands::Config => None,
        }
    }
}
