//! VTmpeg queue client (vtqueue)
//!
//! Sends exactly one command to the running daemon and prints its answer.

mod client;
mod target;

use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{ArgGroup, Parser};
use tracing::debug;
use vtm_common::config::{LoggingConfig, TomlConfig};
use vtm_common::protocol::{Command, Response};

use crate::client::Client;

/// Log targets that follow `--debug`
const LOG_TARGETS: &[&str] = &["vtqueue", "vtm_common"];

/// Command-line arguments for vtqueue
#[derive(Parser, Debug)]
#[command(name = "vtqueue")]
#[command(about = "Control the VTmpeg playback daemon")]
#[command(version)]
#[command(group(
    ArgGroup::new("action")
        .required(true)
        .args(["add", "remove", "list", "play", "pause", "stop", "next", "prev", "mute", "status"])
))]
struct Args {
    /// Add a file or URI to the queue
    #[arg(short, long, value_name = "URI")]
    add: Option<String>,

    /// Remove the item at POS (1-based)
    #[arg(short, long, value_name = "POS", value_parser = clap::value_parser!(i64).range(1..))]
    remove: Option<i64>,

    /// Queue position for --add (default: append)
    #[arg(short, long, value_name = "POS", requires = "add", allow_hyphen_values = true)]
    position: Option<i64>,

    /// List the queue
    #[arg(short, long)]
    list: bool,

    /// Start or resume playback
    #[arg(long)]
    play: bool,

    /// Pause playback
    #[arg(long)]
    pause: bool,

    /// Stop playback
    #[arg(long)]
    stop: bool,

    /// Skip to the next item
    #[arg(long)]
    next: bool,

    /// Go back to the previous item (loop mode)
    #[arg(long)]
    prev: bool,

    /// Toggle mute
    #[arg(long)]
    mute: bool,

    /// Show playback status
    #[arg(long)]
    status: bool,

    /// Rendezvous socket path (default: from the configuration file)
    #[arg(short, long, env = "VTMPEG_SOCKET")]
    socket: Option<PathBuf>,

    /// Configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Response timeout in milliseconds
    #[arg(long, default_value_t = 1000)]
    timeout_ms: u64,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,
}

impl Args {
    /// The single command this invocation asks for
    fn command(&self) -> Result<Command> {
        let command = if let Some(uri) = &self.add {
            Command::Insert {
                uri: target::resolve(uri)?,
                position: self.position.unwrap_or(-1),
            }
        } else if let Some(position) = self.remove {
            Command::Remove { position }
        } else if self.list {
            Command::List
        } else if self.play {
            Command::Play
        } else if self.pause {
            Command::Pause
        } else if self.stop {
            Command::Stop
        } else if self.next {
            Command::Next
        } else if self.prev {
            Command::Prev
        } else if self.mute {
            Command::Mute
        } else {
            Command::Status
        };
        Ok(command)
    }

    fn socket_path(&self) -> Result<PathBuf> {
        if let Some(path) = &self.socket {
            return Ok(path.clone());
        }
        let (config, source) = TomlConfig::load_or_default(self.config.as_deref())
            .context("Failed to load configuration")?;
        debug!(?source, "Socket path from configuration");
        Ok(config.socket_path)
    }
}

fn print_response(response: &Response) {
    println!("{}", response.status.marker());
    for line in &response.lines {
        println!("{}", line);
    }
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let args = Args::parse();

    if args.debug {
        let logging = LoggingConfig {
            level: "debug".to_string(),
            file: None,
        };
        vtm_common::logging::init(&logging, LOG_TARGETS).context("Failed to initialize logging")?;
    }

    let command = args.command()?;
    let client = Client::new(args.socket_path()?, Duration::from_millis(args.timeout_ms));
    debug!(%command, socket = %client.socket_path().display(), "Sending command");

    match client.send(&command).await? {
        Some(response) => print_response(&response),
        None if command.expects_response() => {
            eprintln!("error: daemon closed the connection without a response");
            return Ok(ExitCode::FAILURE);
        }
        None => debug!("Command accepted"),
    }

    Ok(ExitCode::SUCCESS)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> std::result::Result<Args, clap::Error> {
        Args::try_parse_from(std::iter::once("vtqueue").chain(args.iter().copied()))
    }

    #[test]
    fn test_exactly_one_action() {
        assert!(parse(&[]).is_err());
        assert!(parse(&["--list", "--pause"]).is_err());
        assert!(parse(&["--list"]).is_ok());
    }

    #[test]
    fn test_transport_commands() {
        let cases = [
            ("--play", Command::Play),
            ("--pause", Command::Pause),
            ("--stop", Command::Stop),
            ("--next", Command::Next),
            ("--prev", Command::Prev),
            ("--mute", Command::Mute),
            ("--status", Command::Status),
            ("-l", Command::List),
        ];
        for (flag, expected) in cases {
            assert_eq!(parse(&[flag]).unwrap().command().unwrap(), expected, "{}", flag);
        }
    }

    #[test]
    fn test_add_defaults_to_append() {
        let args = parse(&["--add", "rtsp://cam/stream"]).unwrap();
        assert_eq!(
            args.command().unwrap(),
            Command::Insert {
                uri: "rtsp://cam/stream".to_string(),
                position: -1,
            }
        );
    }

    #[test]
    fn test_add_with_position() {
        let args = parse(&["-a", "http://host/a.ts", "-p", "3"]).unwrap();
        assert_eq!(
            args.command().unwrap(),
            Command::Insert {
                uri: "http://host/a.ts".to_string(),
                position: 3,
            }
        );
    }

    #[test]
    fn test_position_requires_add() {
        assert!(parse(&["--list", "--position", "2"]).is_err());
    }

    #[test]
    fn test_remove_requires_positive_position() {
        assert!(parse(&["--remove", "0"]).is_err());
        assert_eq!(
            parse(&["-r", "2"]).unwrap().command().unwrap(),
            Command::Remove { position: 2 }
        );
    }

    #[test]
    fn test_add_missing_file_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("missing.mp4");
        let args = parse(&["--add", missing.to_str().unwrap()]).unwrap();
        assert!(args.command().is_err());
    }

    #[test]
    fn test_explicit_socket_wins() {
        let args = parse(&["--list", "--socket", "/run/vt/sock"]).unwrap();
        assert_eq!(args.socket_path().unwrap(), PathBuf::from("/run/vt/sock"));
    }
}
