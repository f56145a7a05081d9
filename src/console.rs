use crate::controller::View;
use crate::error::Alert;
use crate::messages::Command;
use anyhow::{Context, Result};
use std::io::BufRead;
use tokio::sync::mpsc;

pub const HELP: &str = "\
Commands:
  record (r)   start a new recording, replacing the current one
  stop (s)     stop recording
  play (p)     play the current recording
  clear (c)    delete the current recording
  status       show the available actions
  allow / deny answer a microphone access request
  quit (q)     exit";

/// Read commands from stdin and forward them on the channel
///
/// Blocking; run it on a dedicated thread so a pending read never holds up
/// runtime shutdown. Returns when stdin is closed or the receiving side goes away.
pub fn read_commands(tx: mpsc::Sender<Command>) -> Result<()> {
    for line in std::io::stdin().lock().lines() {
        let line = line.context("Failed to read stdin")?;
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let command = match parse_command(line) {
            Some(command) => command,
            None => {
                tracing::debug!("Unknown command: {}", line);
                println!("Unknown command '{}'", line);
                Command::Help
            }
        };

        if tx.blocking_send(command).is_err() {
            break;
        }
    }

    tracing::debug!("Console input closed");
    Ok(())
}

pub fn parse_command(input: &str) -> Option<Command> {
    let command = match input.trim().to_lowercase().as_str() {
        "record" | "r" => Command::Record,
        "stop" | "s" => Command::Stop,
        "play" | "p" => Command::Play,
        "clear" | "c" => Command::Clear,
        "status" => Command::Status,
        "allow" | "yes" | "y" => Command::Allow,
        "deny" | "no" | "n" => Command::Deny,
        "help" | "?" => Command::Help,
        "quit" | "q" | "exit" => Command::Quit,
        _ => return None,
    };

    Some(command)
}

/// One line showing the offered buttons and the size label
pub fn render_view(view: &View) -> String {
    let buttons = [
        (view.controls.record, "Record"),
        (view.controls.stop, "Stop"),
        (view.controls.play, "Play"),
        (view.controls.clear, "Clear"),
    ];

    let mut line = buttons
        .iter()
        .filter(|(shown, _)| *shown)
        .map(|(_, label)| format!("[{}]", label))
        .collect::<Vec<_>>()
        .join(" ");

    if let Some(size) = view.file_size {
        line.push_str("  ");
        line.push_str(&format_byte_count(size));
    }

    line
}

pub fn render_alert(alert: &Alert) -> String {
    format!("! {}\n  {}", alert.title, alert.message)
}

pub fn show(view: &View) {
    println!("{}", render_view(view));
}

pub fn show_alert(alert: &Alert) {
    println!("{}", render_alert(alert));
}

pub fn show_permission_prompt() {
    println!("voice-memo would like to access the microphone. Type 'allow' or 'deny'.");
}

/// Human readable file size using decimal units
pub fn format_byte_count(bytes: u64) -> String {
    const KB: f64 = 1_000.0;
    const MB: f64 = 1_000_000.0;
    const GB: f64 = 1_000_000_000.0;

    match bytes {
        0 => "Zero KB".to_string(),
        1 => "1 byte".to_string(),
        2..=999 => format!("{} bytes", bytes),
        1_000..=999_499 => format!("{} KB", (bytes as f64 / KB).round()),
        999_500..=999_949_999 => trim_zeros(format!("{:.1} MB", bytes as f64 / MB)),
        _ => trim_zeros(format!("{:.2} GB", bytes as f64 / GB)),
    }
}

fn trim_zeros(formatted: String) -> String {
    match formatted.split_once(' ') {
        Some((number, unit)) if number.contains('.') => {
            let number = number.trim_end_matches('0').trim_end_matches('.');
            format!("{} {}", number, unit)
        }
        _ => formatted,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::Controls;

    #[test]
    fn test_parse_commands_and_aliases() {
        assert_eq!(parse_command("record"), Some(Command::Record));
        assert_eq!(parse_command("  R "), Some(Command::Record));
        assert_eq!(parse_command("Stop"), Some(Command::Stop));
        assert_eq!(parse_command("p"), Some(Command::Play));
        assert_eq!(parse_command("clear"), Some(Command::Clear));
        assert_eq!(parse_command("yes"), Some(Command::Allow));
        assert_eq!(parse_command("n"), Some(Command::Deny));
        assert_eq!(parse_command("exit"), Some(Command::Quit));
        assert_eq!(parse_command("rewind"), None);
    }

    #[test]
    fn test_byte_count_formatting() {
        assert_eq!(format_byte_count(0), "Zero KB");
        assert_eq!(format_byte_count(1), "1 byte");
        assert_eq!(format_byte_count(512), "512 bytes");
        assert_eq!(format_byte_count(48_044), "48 KB");
        assert_eq!(format_byte_count(999_499), "999 KB");
        assert_eq!(format_byte_count(999_500), "1 MB");
        assert_eq!(format_byte_count(1_500_000), "1.5 MB");
        assert_eq!(format_byte_count(2_250_000_000), "2.25 GB");
    }

    #[test]
    fn test_render_idle_with_recording() {
        let view = View {
            controls: Controls {
                record: true,
                stop: false,
                play: true,
                clear: true,
            },
            file_size: Some(96_044),
        };

        assert_eq!(render_view(&view), "[Record] [Play] [Clear]  96 KB");
    }

    #[test]
    fn test_render_recording() {
        let view = View {
            controls: Controls {
                record: false,
                stop: true,
                play: false,
                clear: false,
            },
            file_size: None,
        };

        assert_eq!(render_view(&view), "[Stop]");
    }

    #[test]
    fn test_render_alert() {
        let alert = Alert {
            title: "No microphone is available".to_string(),
            message: "Connect one.".to_string(),
        };

        assert_eq!(
            render_alert(&alert),
            "! No microphone is available\n  Connect one."
        );
    }
}
