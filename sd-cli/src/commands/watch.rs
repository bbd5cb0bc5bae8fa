//! Watch command - join a room's live channel from the terminal.

use std::sync::Arc;

use console::style;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tracing::{debug, warn};

use sd_core::config::{AppConfig, ConfigHandle};
use sd_core::error::{SdError, SdResult};
use sd_socket::{ConnectionState, Envelope, Navigator, NoticeLevel, Notifier, RoomClient};

use crate::OutputFormat;

/// Prints notices to the terminal.
struct TerminalNotifier {
    format: OutputFormat,
}

impl Notifier for TerminalNotifier {
    fn notify(&self, level: NoticeLevel, message: &str) {
        if self.format == OutputFormat::Json {
            let level = format!("{level:?}").to_lowercase();
            println!("{}", serde_json::json!({ "notice": level, "message": message }));
            return;
        }
        let tag = match level {
            NoticeLevel::Success => style("OK").green().bold(),
            NoticeLevel::Info => style("--").cyan(),
            NoticeLevel::Warning => style("WARN").yellow().bold(),
            NoticeLevel::Error => style("FAIL").red().bold(),
        };
        println!("  {tag} {message}");
    }
}

/// Ends the watch loop when the session navigates away.
struct ExitNavigator {
    tx: mpsc::UnboundedSender<String>,
}

impl Navigator for ExitNavigator {
    fn navigate(&self, path: &str) {
        let _ = self.tx.send(path.to_string());
    }
}

/// One line of chat for the terminal.
fn format_chat(envelope: &Envelope) -> String {
    let who = envelope.username.as_deref().unwrap_or("anonymous");
    let time = chrono::DateTime::from_timestamp_millis(envelope.timestamp)
        .map(|t| t.with_timezone(&chrono::Local).format("%H:%M:%S").to_string())
        .unwrap_or_default();
    format!(
        "{} {}: {}",
        style(time).dim(),
        style(who).bold(),
        envelope.content.as_deref().unwrap_or_default()
    )
}

fn print_envelope(envelope: &Envelope, format: OutputFormat, text: impl FnOnce() -> String) {
    match format {
        OutputFormat::Json => match envelope.encode() {
            Ok(line) => println!("{line}"),
            Err(e) => warn!("failed to encode envelope: {e}"),
        },
        OutputFormat::Text => println!("{}", text()),
    }
}

/// Run the watch command.
pub async fn run(
    config: ConfigHandle,
    room_id: String,
    token: Option<String>,
    address: Option<String>,
    save: bool,
    format: OutputFormat,
) -> SdResult<()> {
    if let Some(addr) = address {
        config.write().await.server.address = AppConfig::sanitize_server_address(&addr);
        if save {
            config.save().await?;
        }
    }

    let app = config.read().await.clone();
    if !app.is_server_configured() {
        return Err(SdError::MissingConfig(
            "server address (use --address or set it in config)".into(),
        ));
    }
    let token = super::resolve_token(token)?;

    let (nav_tx, mut nav_rx) = mpsc::unbounded_channel();
    let client = RoomClient::builder(room_id.clone(), token)
        .app_config(&app)
        .notifier(Arc::new(TerminalNotifier { format }))
        .navigator(Arc::new(ExitNavigator { tx: nav_tx }))
        .spawn()?;

    client.on("chat", move |envelope: &Envelope| {
        print_envelope(envelope, format, || format_chat(envelope));
    });
    client.on("viewer_count_update", move |envelope: &Envelope| {
        print_envelope(envelope, format, || match envelope.viewer_count() {
            Some(count) => format!("  {} {count} watching", style("--").cyan()),
            None => format!("  {} viewer count changed", style("--").cyan()),
        });
    });

    if format == OutputFormat::Text {
        println!("Connecting to room {}...", style(&room_id).bold());
    }
    match client.connect().await {
        Ok(()) => {
            if format == OutputFormat::Text {
                println!(
                    "  {} Connected. Type to chat, /quit or Ctrl+C to leave.",
                    style("OK").green().bold()
                );
            }
        }
        // The session keeps retrying in the background.
        Err(e) if e.is_recoverable() => println!("  {} {e}", style("WARN").yellow().bold()),
        Err(e) => return Err(e),
    }

    let mut states = client.state_receiver();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut exhausted = false;

    loop {
        tokio::select! {
            line = lines.next_line() => {
                match line {
                    Ok(Some(line)) => {
                        let line = line.trim();
                        if line == "/quit" {
                            break;
                        }
                        if line.is_empty() {
                            continue;
                        }
                        if let Err(e) = client.send_chat(line) {
                            println!("  {} message not sent: {e}", style("WARN").yellow().bold());
                        }
                    }
                    Ok(None) => {
                        debug!("stdin closed");
                        break;
                    }
                    Err(e) => {
                        warn!("failed to read stdin: {e}");
                        break;
                    }
                }
            }
            changed = states.changed() => {
                if changed.is_err() {
                    break;
                }
                let state = *states.borrow_and_update();
                debug!("room state: {state}");
                if let Some(gave_up) = leave_on(state) {
                    exhausted = gave_up;
                    break;
                }
            }
            path = nav_rx.recv() => {
                if let Some(path) = path {
                    debug!("navigated to {path}");
                }
                break;
            }
            _ = tokio::signal::ctrl_c() => {
                break;
            }
        }
    }

    if format == OutputFormat::Text {
        println!("\n  Leaving room...");
    }
    client.disconnect().await;

    if exhausted {
        return Err(SdError::RetryBudgetExhausted {
            attempts: client.reconnect_attempts(),
        });
    }
    Ok(())
}

/// Whether the watch loop should stop for `state`, and if so whether the
/// session gave up reconnecting.
fn leave_on(state: ConnectionState) -> Option<bool> {
    state
        .is_terminal()
        .then_some(state == ConnectionState::ClosedExhausted)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_chat_includes_sender_and_content() {
        let envelope = Envelope::new("chat")
            .with_sender(1, "alice")
            .with_content("hello")
            .with_timestamp(1_700_000_000_000);
        let line = console::strip_ansi_codes(&format_chat(&envelope)).to_string();
        assert!(line.ends_with("alice: hello"));
    }

    #[test]
    fn test_format_chat_anonymous() {
        let envelope = Envelope::new("chat").with_content("hi");
        let line = console::strip_ansi_codes(&format_chat(&envelope)).to_string();
        assert!(line.ends_with("anonymous: hi"));
    }

    #[test]
    fn test_leave_on_terminal_states_only() {
        assert_eq!(leave_on(ConnectionState::ClosedExhausted), Some(true));
        assert_eq!(leave_on(ConnectionState::ClosedClean), Some(false));
        assert_eq!(leave_on(ConnectionState::ClosedRetrying), None);
        assert_eq!(leave_on(ConnectionState::Connecting), None);
        assert_eq!(leave_on(ConnectionState::Open), None);
    }

    #[test]
    fn test_exit_navigator_forwards_path() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let nav = ExitNavigator { tx };
        nav.navigate("/live-rooms");
        assert_eq!(rx.try_recv().unwrap(), "/live-rooms");
    }
}
