//! Live-room commands.

use clap::Subcommand;
use comfy_table::{modifiers::UTF8_ROUND_CORNERS, presets::UTF8_FULL, ContentArrangement, Table};
use console::style;
use dialoguer::Confirm;

use sd_api::{LiveRoomInfo, RoomAck, RoomStatus};
use sd_core::config::ConfigHandle;
use sd_core::error::{SdError, SdResult};

use crate::OutputFormat;

#[derive(Subcommand)]
pub enum RoomsAction {
    /// List rooms that are open now.
    List {
        /// Maximum number of rooms.
        #[arg(short = 'n', long)]
        limit: Option<u32>,
    },
    /// List all rooms, including ended ones.
    All {
        /// Maximum number of rooms.
        #[arg(short = 'n', long)]
        limit: Option<u32>,
    },
    /// Show one room.
    Show { room_id: String },
    /// Create a room.
    Create {
        title: String,
        #[arg(short, long)]
        description: Option<String>,
    },
    /// Join a room as a viewer.
    Join { room_id: String },
    /// Leave a room.
    Leave { room_id: String },
    /// Start broadcasting in your room.
    Start { room_id: String },
    /// Stop broadcasting in your room.
    End { room_id: String },
    /// Close your room for everyone.
    Close {
        room_id: String,
        /// Skip the confirmation prompt.
        #[arg(short, long)]
        yes: bool,
    },
    /// Show your role in a room.
    Role { room_id: String },
}

pub async fn run(config: ConfigHandle, action: RoomsAction, format: OutputFormat) -> SdResult<()> {
    let api = super::create_api_client(&config).await?;

    match action {
        RoomsAction::List { limit } => {
            let rooms = api.active_rooms(limit).await?;
            print_rooms(&rooms, format)?;
        }
        RoomsAction::All { limit } => {
            let rooms = api.all_rooms(limit).await?;
            print_rooms(&rooms, format)?;
        }
        RoomsAction::Show { room_id } => {
            let room = api.room(&room_id).await?;
            print_room(&room, format)?;
        }
        RoomsAction::Create { title, description } => {
            let room = api.create_room(&title, description.as_deref()).await?;
            print_room(&room, format)?;
        }
        RoomsAction::Join { room_id } => {
            let ack = api.join_room(&room_id).await?;
            print_ack("Joined", &room_id, &ack, format)?;
        }
        RoomsAction::Leave { room_id } => {
            let ack = api.leave_room(&room_id).await?;
            print_ack("Left", &room_id, &ack, format)?;
        }
        RoomsAction::Start { room_id } => {
            let ack = api.start_live(&room_id).await?;
            print_ack("Live started in", &room_id, &ack, format)?;
        }
        RoomsAction::End { room_id } => {
            let ack = api.end_live(&room_id).await?;
            print_ack("Live ended in", &room_id, &ack, format)?;
        }
        RoomsAction::Close { room_id, yes } => {
            if !yes {
                let confirmed = Confirm::new()
                    .with_prompt(format!("Close room {room_id} for everyone?"))
                    .default(false)
                    .interact()
                    .map_err(|e| SdError::Internal(e.to_string()))?;
                if !confirmed {
                    println!("Aborted.");
                    return Ok(());
                }
            }
            let ack = api.close_room(&room_id).await?;
            print_ack("Closed", &room_id, &ack, format)?;
        }
        RoomsAction::Role { room_id } => {
            let role = api.room_role(&room_id).await?;
            match format {
                OutputFormat::Json => super::print_json(&role)?,
                OutputFormat::Text => println!("  Role in {room_id}: {}", style(&role.role).cyan()),
            }
        }
    }

    Ok(())
}

fn status_cell(status: &RoomStatus) -> String {
    match status {
        RoomStatus::Live => style("LIVE").red().bold().to_string(),
        other => other.to_string(),
    }
}

fn print_rooms(rooms: &[LiveRoomInfo], format: OutputFormat) -> SdResult<()> {
    if format == OutputFormat::Json {
        return super::print_json(&rooms);
    }
    if rooms.is_empty() {
        println!("No rooms found.");
        return Ok(());
    }

    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec!["Room", "Title", "Status", "Viewers", "Created"]);

    for room in rooms {
        let created = room
            .created_at
            .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
            .unwrap_or_else(|| "-".into());
        table.add_row(vec![
            room.id.clone(),
            super::truncate(&room.title, 40),
            status_cell(&room.status),
            format!("{}/{}", room.viewer_count, room.max_viewers),
            created,
        ]);
    }

    println!("{table}");
    println!("\n{} room(s)", rooms.len());
    Ok(())
}

fn print_room(room: &LiveRoomInfo, format: OutputFormat) -> SdResult<()> {
    if format == OutputFormat::Json {
        return super::print_json(room);
    }

    println!("  Room:        {}", style(&room.id).bold());
    println!("  Title:       {}", room.title);
    if !room.description.is_empty() {
        println!("  Description: {}", room.description);
    }
    println!("  Status:      {}", status_cell(&room.status));
    println!("  Viewers:     {} (max {})", room.viewer_count, room.max_viewers);
    if let Some(since) = room.live_since() {
        println!("  Live since:  {}", since.format("%Y-%m-%d %H:%M:%S UTC"));
    }
    if let Some(key) = &room.stream_key {
        println!("  Stream key:  {}", super::mask_token(key));
    }
    Ok(())
}

fn print_ack(verb: &str, room_id: &str, ack: &RoomAck, format: OutputFormat) -> SdResult<()> {
    match format {
        OutputFormat::Json => super::print_json(ack),
        OutputFormat::Text => {
            let id = ack.room_id.as_deref().unwrap_or(room_id);
            println!("  {} {verb} room {id}.", style("OK").green().bold());
            Ok(())
        }
    }
}
