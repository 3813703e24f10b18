//! Command handlers for CLI subcommands.

use std::sync::Arc;

use kanban_board::{Board, BoardConfig, BoardEvent, BoardSnapshot, FetchOutcome, StageSnapshot};
use kanban_gateway::{ChatwootConfig, ChatwootGateway, ContactGateway};
use kanban_models::{ContactId, ListAttribute, Stage};
use tokio::sync::broadcast;
use tracing::{info, warn};

use crate::cli::{Cli, Commands, OutputFormat};

/// Result type for command operations.
pub type Result<T> = std::result::Result<T, Box<dyn std::error::Error>>;

/// Execute a CLI command against the configured Chatwoot account.
pub async fn execute(cli: Cli) -> Result<()> {
    let chatwoot = cli.chatwoot_config()?;
    if let Commands::Config = cli.command {
        return cmd_config(&chatwoot, &cli);
    }

    let board_config = cli.board_config();
    let card_prefix = cli.card_prefix.clone();
    let gateway = Arc::new(ChatwootGateway::new(chatwoot)?);
    run(cli.command, gateway, board_config, &card_prefix).await
}

/// Execute a command against any gateway.
pub async fn run(
    command: Commands,
    gateway: Arc<dyn ContactGateway>,
    config: BoardConfig,
    card_prefix: &str,
) -> Result<()> {
    let board = Board::new(gateway, config);
    let mut events = board.subscribe();

    let result = match command {
        Commands::Attributes { format } => cmd_attributes(&board, format).await,
        Commands::Board {
            attribute,
            all,
            format,
        } => cmd_board(&board, attribute.as_deref(), all, format, card_prefix).await,
        Commands::More {
            stage,
            attribute,
            format,
        } => cmd_more(&board, &stage, attribute.as_deref(), format, card_prefix).await,
        Commands::Move {
            contact,
            from,
            to,
            attribute,
        } => cmd_move(&board, &contact, &from, &to, attribute.as_deref()).await,
        Commands::Config => Ok(()),
    };

    report_notifications(&mut events);
    result
}

async fn cmd_attributes(board: &Board, format: OutputFormat) -> Result<()> {
    let attributes = board.load_attributes().await?;
    match format {
        OutputFormat::Table => print!("{}", render_attributes(&attributes)),
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&attributes)?),
    }
    Ok(())
}

async fn cmd_board(
    board: &Board,
    attribute: Option<&str>,
    all: bool,
    format: OutputFormat,
    card_prefix: &str,
) -> Result<()> {
    let stages = board.select_attribute(attribute).await?;
    if all {
        for stage in &stages {
            let received = board.load_all(stage).await?;
            info!(stage = %stage, received = received, "stage fully loaded");
        }
    }
    print_snapshot(board, format, card_prefix)
}

async fn cmd_more(
    board: &Board,
    stage: &str,
    attribute: Option<&str>,
    format: OutputFormat,
    card_prefix: &str,
) -> Result<()> {
    board.select_attribute(attribute).await?;
    let stage = Stage::parse(stage, &board.config().unassigned_label);

    match board.request_more(&stage).await? {
        FetchOutcome::Loaded { count, has_more } => {
            info!(stage = %stage, count = count, has_more = has_more, "page loaded");
        }
        FetchOutcome::Skipped(reason) => {
            println!("Nothing to load for '{}' ({:?})", board.display_name(&stage), reason);
        }
        FetchOutcome::Discarded => {}
    }

    let snapshot = board.snapshot().ok_or("no active board")?;
    let column = stage_column(&snapshot, &stage)
        .ok_or_else(|| format!("Unknown stage: {}", board.display_name(&stage)))?;

    match format {
        OutputFormat::Table => print!("{}", render_stage(column, card_prefix)),
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(column)?),
    }
    Ok(())
}

async fn cmd_move(
    board: &Board,
    contact: &str,
    from: &str,
    to: &str,
    attribute: Option<&str>,
) -> Result<()> {
    board.select_attribute(attribute).await?;
    let label = &board.config().unassigned_label;
    let from = Stage::parse(from, label);
    let to = Stage::parse(to, label);
    let id = ContactId::new(contact);

    // The contact may be beyond the first page of its stage.
    if !board.contacts_for(&from).iter().any(|c| c.id == id) {
        board.load_all(&from).await?;
    }

    let outcome = board.move_contact(&id, &from, &to).await?;
    info!(contact_id = %id, outcome = ?outcome, "move finished");
    println!(
        "Moved {} from '{}' to '{}'",
        id,
        board.display_name(&from),
        board.display_name(&to)
    );
    Ok(())
}

fn cmd_config(chatwoot: &ChatwootConfig, cli: &Cli) -> Result<()> {
    println!("Chatwoot Connection:");
    println!("  URL: {}", chatwoot.base_url);
    println!("  Account: {}", chatwoot.account_id);
    println!("  Token: {}", chatwoot.masked_token());
    println!("  Timeout: {}s", chatwoot.timeout.as_secs());
    println!(
        "  Attribute prefix: {}",
        chatwoot.attribute_prefix.as_deref().unwrap_or("(any)")
    );
    println!();
    println!("Board:");
    println!("  Page size: {}", cli.page_size);
    println!("  Unassigned label: {}", cli.unassigned_label);
    println!("  Card prefix: {}", cli.card_prefix);
    Ok(())
}

fn print_snapshot(board: &Board, format: OutputFormat, card_prefix: &str) -> Result<()> {
    let snapshot = board.snapshot().ok_or("no active board")?;
    match format {
        OutputFormat::Table => print!("{}", render_board(&snapshot, card_prefix)),
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&snapshot)?),
    }
    Ok(())
}

/// Finds the column for `stage` by attribute value; labels may collide.
fn stage_column<'a>(snapshot: &'a BoardSnapshot, stage: &Stage) -> Option<&'a StageSnapshot> {
    snapshot
        .stages
        .iter()
        .find(|s| s.value.as_deref() == stage.attribute_value())
}

/// Prints error notifications the board emitted while the command ran.
fn report_notifications(events: &mut broadcast::Receiver<BoardEvent>) {
    loop {
        match events.try_recv() {
            Ok(event) => {
                if let Some(message) = event.notification() {
                    eprintln!("! {}", message);
                }
            }
            Err(broadcast::error::TryRecvError::Lagged(skipped)) => {
                warn!(skipped = skipped, "board notifications dropped");
            }
            Err(_) => break,
        }
    }
}

/// Renders the attribute list as a table.
pub fn render_attributes(attributes: &[ListAttribute]) -> String {
    if attributes.is_empty() {
        return "No list attributes found.\n".to_string();
    }

    let mut out = format!("{:<24}  {:<24}  VALUES\n", "KEY", "NAME");
    out.push_str(&"-".repeat(80));
    out.push('\n');
    for attribute in attributes {
        out.push_str(&format!(
            "{:<24}  {:<24}  {}\n",
            truncate(&attribute.key, 24),
            truncate(attribute.label(), 24),
            attribute.values.join(", ")
        ));
    }
    out.push_str(&format!("\n{} attribute(s)\n", attributes.len()));
    out
}

/// Renders every stage of a board.
pub fn render_board(snapshot: &BoardSnapshot, card_prefix: &str) -> String {
    let mut out = format!("Board: {} ({})", snapshot.attribute_name, snapshot.attribute_key);
    if snapshot.degraded {
        out.push_str(" [unfiltered]");
    }
    out.push_str("\n\n");
    for stage in &snapshot.stages {
        out.push_str(&render_stage(stage, card_prefix));
        out.push('\n');
    }
    out
}

/// Renders one stage with its cards.
pub fn render_stage(stage: &StageSnapshot, card_prefix: &str) -> String {
    let count = match stage.remote_total {
        Some(total) => format!("{}/{}", stage.contacts.len(), total),
        None => stage.contacts.len().to_string(),
    };
    let more = if stage.has_more { " +more" } else { "" };
    let mut out = format!("== {} ({}){} ==\n", stage.label, count, more);

    if let Some(error) = &stage.error {
        out.push_str(&format!("  ! {}\n", error));
    }
    if stage.contacts.is_empty() {
        out.push_str("  (empty)\n");
    }
    for contact in &stage.contacts {
        let reach = contact
            .email
            .as_deref()
            .or(contact.phone_number.as_deref())
            .unwrap_or("");
        out.push_str(&format!(
            "  {:<8}  {:<24}  {}\n",
            format!("#{}", contact.id),
            truncate(&contact.display_name(), 24),
            reach
        ));
        for (key, value) in contact.card_attributes(card_prefix) {
            out.push_str(&format!("            {}: {}\n", key, value));
        }
    }
    out
}

/// Truncates a string to the given length, adding "..." if truncated.
fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}
