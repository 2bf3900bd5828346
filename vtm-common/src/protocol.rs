//! Wire protocol between `vtqueue` and `vtmpegd`
//!
//! One request per connection. A request is a single text line:
//!
//! ```text
//! <id>[ <args>]\n
//! ```
//!
//! | ID | Command | Arguments             |
//! |----|---------|-----------------------|
//! | 1  | LIST    |                       |
//! | 2  | INSERT  | `<filename>;<pos>`    |
//! | 3  | REMOVE  | `<pos>`               |
//! | 4  | PLAY    |                       |
//! | 5  | PAUSE   |                       |
//! | 6  | STOP    |                       |
//! | 7  | NEXT    |                       |
//! | 8  | PREV    |                       |
//! | 9  | MUTE    |                       |
//! | 10 | STATUS  |                       |
//!
//! A response starts with a status marker line (`S` or `E`), followed by
//! free-text lines and a final line containing only the delimiter `;`.
//! Transport commands (PLAY..MUTE) normally produce no response at all; the
//! connection is simply closed.

use std::fmt;

use thiserror::Error;

/// Status marker for a successful command
pub const COMMAND_OK: char = 'S';

/// Status marker for a failed command
pub const COMMAND_ERROR: char = 'E';

/// Final line of every response
pub const COMMAND_DELIM: char = ';';

/// Well-known rendezvous path (a symlink to the active socket)
pub const DEFAULT_SOCKET_PATH: &str = "/tmp/VTmpegd";

/// Upper bound on a request, including the trailing newline
pub const MAX_REQUEST_LEN: usize = 2048;

/// Upper bound on an INSERT filename/URI
pub const MAX_URI_LEN: usize = 1023;

/// Upper bound on a single response line
pub const MAX_RESULT_LINE_LEN: usize = 2048;

/// Default hard limit on queue depth
pub const MAX_QUEUE_LEN: usize = 2048;

/// Numeric command identifiers as sent on the wire
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CommandId {
    List = 1,
    Insert = 2,
    Remove = 3,
    Play = 4,
    Pause = 5,
    Stop = 6,
    Next = 7,
    Prev = 8,
    Mute = 9,
    Status = 10,
}

impl CommandId {
    pub fn from_id(id: u32) -> Option<Self> {
        match id {
            1 => Some(Self::List),
            2 => Some(Self::Insert),
            3 => Some(Self::Remove),
            4 => Some(Self::Play),
            5 => Some(Self::Pause),
            6 => Some(Self::Stop),
            7 => Some(Self::Next),
            8 => Some(Self::Prev),
            9 => Some(Self::Mute),
            10 => Some(Self::Status),
            _ => None,
        }
    }

    pub fn id(self) -> u32 {
        self as u32
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::List => "LIST",
            Self::Insert => "INSERT",
            Self::Remove => "REMOVE",
            Self::Play => "PLAY",
            Self::Pause => "PAUSE",
            Self::Stop => "STOP",
            Self::Next => "NEXT",
            Self::Prev => "PREV",
            Self::Mute => "MUTE",
            Self::Status => "STATUS",
        }
    }
}

/// A decoded request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    List,
    /// Insert `uri` at 1-based `position`; `0` or negative appends
    Insert { uri: String, position: i64 },
    /// Remove the item at 1-based `position`
    Remove { position: i64 },
    Play,
    Pause,
    Stop,
    Next,
    Prev,
    Mute,
    Status,
    /// Well-formed numeric identifier that names no command
    Unknown(u32),
}

impl Command {
    /// Wire identifier of this command
    pub fn id(&self) -> u32 {
        match self {
            Self::List => CommandId::List.id(),
            Self::Insert { .. } => CommandId::Insert.id(),
            Self::Remove { .. } => CommandId::Remove.id(),
            Self::Play => CommandId::Play.id(),
            Self::Pause => CommandId::Pause.id(),
            Self::Stop => CommandId::Stop.id(),
            Self::Next => CommandId::Next.id(),
            Self::Prev => CommandId::Prev.id(),
            Self::Mute => CommandId::Mute.id(),
            Self::Status => CommandId::Status.id(),
            Self::Unknown(id) => *id,
        }
    }

    /// Whether the daemon always answers this command.
    ///
    /// Transport commands are fire-and-forget; PREV may still answer with an
    /// error, so readers must tolerate both outcomes for those.
    pub fn expects_response(&self) -> bool {
        matches!(
            self,
            Self::List | Self::Insert { .. } | Self::Remove { .. } | Self::Status | Self::Unknown(_)
        )
    }

    /// Render the request line sent by clients (newline terminated)
    pub fn to_request_line(&self) -> String {
        match self {
            Self::Insert { uri, position } => format!("{} {};{}\n", self.id(), uri, position),
            Self::Remove { position } => format!("{} {}\n", self.id(), position),
            _ => format!("{}\n", self.id()),
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Insert { uri, position } => write!(f, "INSERT {} at {}", uri, position),
            Self::Remove { position } => write!(f, "REMOVE {}", position),
            Self::Unknown(id) => write!(f, "UNKNOWN({})", id),
            other => match CommandId::from_id(other.id()) {
                Some(id) => f.write_str(id.name()),
                None => write!(f, "#{}", other.id()),
            },
        }
    }
}

/// Reasons a request (or response) cannot be decoded
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    #[error("invalid command identifier '{0}'")]
    InvalidId(String),

    #[error("{command} requires a {argument}")]
    MissingArgument {
        command: &'static str,
        argument: &'static str,
    },

    #[error("invalid {argument} '{value}'")]
    InvalidArgument { argument: &'static str, value: String },

    #[error("{what} exceeds {limit} bytes")]
    TooLong { what: &'static str, limit: usize },

    #[error("data is not valid UTF-8")]
    NotUtf8,

    #[error("missing status marker")]
    MissingStatus,
}

/// Decode one request.
///
/// Returns `Ok(None)` when the input carries no data (empty, or only a line
/// terminator). Only the first line is considered.
pub fn decode(raw: &[u8]) -> Result<Option<Command>, DecodeError> {
    if raw.len() > MAX_REQUEST_LEN {
        return Err(DecodeError::TooLong {
            what: "request",
            limit: MAX_REQUEST_LEN,
        });
    }

    let text = std::str::from_utf8(raw).map_err(|_| DecodeError::NotUtf8)?;
    let line = text.split('\n').next().unwrap_or("");
    let line = line.strip_suffix('\r').unwrap_or(line);

    if line.trim().is_empty() {
        return Ok(None);
    }

    let (id_part, args) = match line.split_once(' ') {
        Some((id, rest)) => (id, Some(rest)),
        None => (line, None),
    };

    let id: u32 = id_part
        .trim()
        .parse()
        .map_err(|_| DecodeError::InvalidId(id_part.trim().to_string()))?;

    let command = match CommandId::from_id(id) {
        Some(CommandId::List) => Command::List,
        Some(CommandId::Insert) => decode_insert(args)?,
        Some(CommandId::Remove) => Command::Remove {
            position: decode_position("REMOVE", args)?,
        },
        Some(CommandId::Play) => Command::Play,
        Some(CommandId::Pause) => Command::Pause,
        Some(CommandId::Stop) => Command::Stop,
        Some(CommandId::Next) => Command::Next,
        Some(CommandId::Prev) => Command::Prev,
        Some(CommandId::Mute) => Command::Mute,
        Some(CommandId::Status) => Command::Status,
        None => Command::Unknown(id),
    };

    Ok(Some(command))
}

/// `<filename>[;<position>]`, split at the last `;` so names may contain one
fn decode_insert(args: Option<&str>) -> Result<Command, DecodeError> {
    let args = args.unwrap_or("");
    let (uri, position) = match args.rsplit_once(COMMAND_DELIM) {
        Some((uri, pos)) if pos.trim().is_empty() => (uri, 0),
        Some((uri, pos)) => {
            let pos = pos.trim();
            let position = pos.parse::<i64>().map_err(|_| DecodeError::InvalidArgument {
                argument: "position",
                value: pos.to_string(),
            })?;
            (uri, position)
        }
        None => (args, 0),
    };

    if uri.is_empty() {
        return Err(DecodeError::MissingArgument {
            command: "INSERT",
            argument: "filename",
        });
    }
    if uri.len() > MAX_URI_LEN {
        return Err(DecodeError::TooLong {
            what: "filename",
            limit: MAX_URI_LEN,
        });
    }

    Ok(Command::Insert {
        uri: uri.to_string(),
        position,
    })
}

fn decode_position(command: &'static str, args: Option<&str>) -> Result<i64, DecodeError> {
    let arg = args.map(str::trim).unwrap_or("");
    if arg.is_empty() {
        return Err(DecodeError::MissingArgument {
            command,
            argument: "position",
        });
    }
    arg.parse().map_err(|_| DecodeError::InvalidArgument {
        argument: "position",
        value: arg.to_string(),
    })
}

/// Response status
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Ok,
    Error,
}

impl Status {
    pub fn marker(self) -> char {
        match self {
            Self::Ok => COMMAND_OK,
            Self::Error => COMMAND_ERROR,
        }
    }

    fn from_marker(c: char) -> Option<Self> {
        match c {
            COMMAND_OK => Some(Self::Ok),
            COMMAND_ERROR => Some(Self::Error),
            _ => None,
        }
    }
}

/// A status-prefixed, delimiter-terminated multi-line response
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    pub status: Status,
    pub lines: Vec<String>,
}

impl Response {
    pub fn ok<I, S>(lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            status: Status::Ok,
            lines: lines.into_iter().map(Into::into).collect(),
        }
    }

    pub fn error(line: impl Into<String>) -> Self {
        Self {
            status: Status::Error,
            lines: vec![line.into()],
        }
    }

    pub fn is_ok(&self) -> bool {
        self.status == Status::Ok
    }

    /// All text lines joined with newlines
    pub fn text(&self) -> String {
        self.lines.join("\n")
    }

    /// Serialize for the wire.
    ///
    /// Embedded newlines are flattened so a text line can never be mistaken
    /// for the delimiter line.
    pub fn encode(&self) -> Vec<u8> {
        let mut out = String::with_capacity(8 + self.lines.iter().map(|l| l.len() + 1).sum::<usize>());
        out.push(self.status.marker());
        out.push('\n');
        for line in &self.lines {
            let line = line.replace(['\n', '\r'], " ");
            if line == COMMAND_DELIM.to_string() {
                out.push(' ');
            }
            out.push_str(&line);
            out.push('\n');
        }
        out.push(COMMAND_DELIM);
        out.push('\n');
        out.into_bytes()
    }

    /// Parse a response read by a client.
    ///
    /// Zero bytes means the daemon closed without answering, which is how
    /// transport commands are acknowledged: `Ok(None)`. A missing delimiter
    /// line is tolerated (the connection may close right after the text).
    pub fn parse(raw: &[u8]) -> Result<Option<Self>, DecodeError> {
        if raw.is_empty() {
            return Ok(None);
        }
        let text = std::str::from_utf8(raw).map_err(|_| DecodeError::NotUtf8)?;
        let mut lines = text.lines();

        let first = lines.next().unwrap_or("");
        let mut chars = first.chars();
        let status = chars
            .next()
            .and_then(Status::from_marker)
            .ok_or(DecodeError::MissingStatus)?;

        let mut body = Vec::new();
        // Tolerate text on the status line ("E: Unknown command.")
        let inline = chars.as_str().trim_start_matches(':').trim();
        if !inline.is_empty() {
            body.push(inline.to_string());
        }

        for line in lines {
            if line == COMMAND_DELIM.to_string() {
                break;
            }
            if line.len() > MAX_RESULT_LINE_LEN {
                return Err(DecodeError::TooLong {
                    what: "response line",
                    limit: MAX_RESULT_LINE_LEN,
                });
            }
            body.push(line.to_string());
        }

        Ok(Some(Self { status, lines: body }))
    }

    /// True once `raw` holds a status line followed by the delimiter line
    pub fn is_complete(raw: &[u8]) -> bool {
        raw.split(|b| *b == b'\n')
            .skip(1)
            .any(|line| line == [COMMAND_DELIM as u8] || line == [COMMAND_DELIM as u8, b'\r'])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_empty_is_no_data() {
        assert_eq!(decode(b"").unwrap(), None);
        assert_eq!(decode(b"\n").unwrap(), None);
        assert_eq!(decode(b"\r\n").unwrap(), None);
    }

    #[test]
    fn test_decode_zero_is_a_command_not_no_data() {
        assert_eq!(decode(b"0").unwrap(), Some(Command::Unknown(0)));
        assert_eq!(decode(b"42\n").unwrap(), Some(Command::Unknown(42)));
    }

    #[test]
    fn test_decode_simple_commands() {
        assert_eq!(decode(b"1").unwrap(), Some(Command::List));
        assert_eq!(decode(b"4\n").unwrap(), Some(Command::Play));
        assert_eq!(decode(b"5\r\n").unwrap(), Some(Command::Pause));
        assert_eq!(decode(b"6").unwrap(), Some(Command::Stop));
        assert_eq!(decode(b"7").unwrap(), Some(Command::Next));
        assert_eq!(decode(b"8").unwrap(), Some(Command::Prev));
        assert_eq!(decode(b"9").unwrap(), Some(Command::Mute));
        assert_eq!(decode(b"10").unwrap(), Some(Command::Status));
        // Trailing arguments on argument-less commands are ignored
        assert_eq!(decode(b"1 whatever").unwrap(), Some(Command::List));
    }

    #[test]
    fn test_decode_invalid_id() {
        assert_eq!(decode(b"abc"), Err(DecodeError::InvalidId("abc".to_string())));
        assert_eq!(decode(b"-1"), Err(DecodeError::InvalidId("-1".to_string())));
    }

    #[test]
    fn test_decode_insert() {
        assert_eq!(
            decode(b"2 /tmp/a.mp4;0\n").unwrap(),
            Some(Command::Insert {
                uri: "/tmp/a.mp4".to_string(),
                position: 0
            })
        );
        assert_eq!(
            decode(b"2 http://host/stream;-1").unwrap(),
            Some(Command::Insert {
                uri: "http://host/stream".to_string(),
                position: -1
            })
        );
    }

    #[test]
    fn test_decode_insert_splits_at_last_delimiter() {
        assert_eq!(
            decode(b"2 /tmp/a;b.mp4;3").unwrap(),
            Some(Command::Insert {
                uri: "/tmp/a;b.mp4".to_string(),
                position: 3
            })
        );
    }

    #[test]
    fn test_decode_insert_without_position_appends() {
        assert_eq!(
            decode(b"2 /tmp/a.mp4").unwrap(),
            Some(Command::Insert {
                uri: "/tmp/a.mp4".to_string(),
                position: 0
            })
        );
    }

    #[test]
    fn test_decode_insert_errors() {
        assert!(matches!(
            decode(b"2"),
            Err(DecodeError::MissingArgument { command: "INSERT", .. })
        ));
        assert!(matches!(
            decode(b"2 ;4"),
            Err(DecodeError::MissingArgument { command: "INSERT", .. })
        ));
        assert!(matches!(
            decode(b"2 /tmp/a.mp4;x"),
            Err(DecodeError::InvalidArgument { argument: "position", .. })
        ));

        let long = format!("2 /{};0", "a".repeat(MAX_URI_LEN));
        assert_eq!(
            decode(long.as_bytes()),
            Err(DecodeError::TooLong {
                what: "filename",
                limit: MAX_URI_LEN
            })
        );
    }

    #[test]
    fn test_decode_remove() {
        assert_eq!(decode(b"3 2\n").unwrap(), Some(Command::Remove { position: 2 }));
        assert_eq!(decode(b"3 0").unwrap(), Some(Command::Remove { position: 0 }));
        assert!(matches!(
            decode(b"3"),
            Err(DecodeError::MissingArgument { command: "REMOVE", .. })
        ));
        assert!(matches!(
            decode(b"3 two"),
            Err(DecodeError::InvalidArgument { .. })
        ));
    }

    #[test]
    fn test_decode_rejects_oversized_request() {
        let raw = vec![b'1'; MAX_REQUEST_LEN + 1];
        assert!(matches!(decode(&raw), Err(DecodeError::TooLong { what: "request", .. })));
    }

    #[test]
    fn test_decode_rejects_invalid_utf8() {
        assert_eq!(decode(&[b'2', b' ', 0xff, 0xfe]), Err(DecodeError::NotUtf8));
    }

    #[test]
    fn test_request_lines() {
        let insert = Command::Insert {
            uri: "/tmp/a.mp4".to_string(),
            position: -1,
        };
        assert_eq!(insert.to_request_line(), "2 /tmp/a.mp4;-1\n");
        assert_eq!(Command::Remove { position: 3 }.to_request_line(), "3 3\n");
        assert_eq!(Command::Status.to_request_line(), "10\n");
        assert_eq!(decode(insert.to_request_line().as_bytes()).unwrap(), Some(insert));
    }

    #[test]
    fn test_expects_response() {
        assert!(Command::List.expects_response());
        assert!(Command::Status.expects_response());
        assert!(Command::Unknown(99).expects_response());
        assert!(!Command::Play.expects_response());
        assert!(!Command::Prev.expects_response());
    }

    #[test]
    fn test_encode_response() {
        let response = Response::ok(["Filename /tmp/a.mp4 OK"]);
        assert_eq!(response.encode(), b"S\nFilename /tmp/a.mp4 OK\n;\n".to_vec());

        let response = Response::error("Empty list.");
        assert_eq!(response.encode(), b"E\nEmpty list.\n;\n".to_vec());

        let response = Response::ok(Vec::<String>::new());
        assert_eq!(response.encode(), b"S\n;\n".to_vec());
    }

    #[test]
    fn test_encode_flattens_newlines() {
        let response = Response::ok(["two\nlines", ";"]);
        assert_eq!(response.encode(), b"S\ntwo lines\n ;\n;\n".to_vec());
    }

    #[test]
    fn test_parse_response() {
        let parsed = Response::parse(b"S\nVTmpeg queue list\n1;/tmp/a.mp4\n;\n")
            .unwrap()
            .unwrap();
        assert!(parsed.is_ok());
        assert_eq!(parsed.lines, vec!["VTmpeg queue list", "1;/tmp/a.mp4"]);

        let parsed = Response::parse(b"E: Unknown command.\n;\n").unwrap().unwrap();
        assert_eq!(parsed.status, Status::Error);
        assert_eq!(parsed.text(), "Unknown command.");

        assert_eq!(Response::parse(b"").unwrap(), None);
        assert_eq!(Response::parse(b"X\n;\n"), Err(DecodeError::MissingStatus));
    }

    #[test]
    fn test_is_complete() {
        assert!(!Response::is_complete(b"S\nFilename"));
        assert!(!Response::is_complete(b";\n"));
        assert!(Response::is_complete(b"S\nFilename /a OK\n;\n"));
        assert!(Response::is_complete(b"E\n;"));
    }
}
