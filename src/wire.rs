//! Newline-delimited text protocol over TCP.
//!
//! One command per line, one response line per command:
//!
//! - `PUT <key> [payload]` → `OK <bytes_written>` (empty payload deletes)
//! - `GET <key>` → `VALUE <payload>` | `NOTFOUND <key>`
//! - `DEL <key>` → `OK`
//! - `KEYS [prefix]` → `KEYS <name>...`
//! - `LINE SET <name> <time>[,<time>...]` → `OK`
//! - `LINE GET <name>` → `VALUE <json>` | `NOTFOUND <key>`
//! - `LINE DEL <name>` → `OK`
//! - `REPORT <hh:mm [am|pm]>` → `REPORT <json>` | `NONE`
//!
//! Any failure renders as `ERR <cause>`.

use std::sync::Arc;
use std::time::Instant;

use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_util::codec::{Framed, LinesCodec, LinesCodecError};

use crate::clock;
use crate::model::{self, Schedule, TrainLine};
use crate::observability;
use crate::report;
use crate::store::{Store, StoreError};

/// Longest accepted command line, payload included.
pub const MAX_LINE_LEN: usize = 64 * 1024;

/// Parsed command from one input line.
#[derive(Debug, PartialEq, Eq)]
pub enum Command {
    Put { key: String, payload: String },
    Get { key: String },
    Del { key: String },
    Keys { prefix: String },
    LineSet { name: String, times: Vec<String> },
    LineGet { name: String },
    LineDel { name: String },
    Report { time: String },
}

pub fn parse_command(line: &str) -> Result<Command, WireError> {
    let trimmed = line.trim();
    let (verb, rest) = match trimmed.split_once(' ') {
        Some((v, r)) => (v, r.trim()),
        None => (trimmed, ""),
    };

    match verb.to_uppercase().as_str() {
        "" => Err(WireError::Empty),
        "PUT" => {
            // Everything after the key is the payload, spaces included.
            let (key, payload) = rest.split_once(' ').unwrap_or((rest, ""));
            if key.is_empty() {
                return Err(WireError::WrongArity("PUT <key> [payload]"));
            }
            Ok(Command::Put {
                key: key.to_string(),
                payload: payload.to_string(),
            })
        }
        "GET" => one_arg(rest, "GET <key>").map(|key| Command::Get { key }),
        "DEL" => one_arg(rest, "DEL <key>").map(|key| Command::Del { key }),
        "KEYS" => Ok(Command::Keys {
            prefix: rest.to_string(),
        }),
        "LINE" => parse_line_command(rest),
        "REPORT" => {
            if rest.is_empty() {
                Err(WireError::WrongArity("REPORT <hh:mm [am|pm]>"))
            } else {
                Ok(Command::Report {
                    time: rest.to_string(),
                })
            }
        }
        other => Err(WireError::UnknownCommand(other.to_string())),
    }
}

fn one_arg(rest: &str, usage: &'static str) -> Result<String, WireError> {
    if rest.is_empty() || rest.contains(' ') {
        Err(WireError::WrongArity(usage))
    } else {
        Ok(rest.to_string())
    }
}

fn parse_line_command(rest: &str) -> Result<Command, WireError> {
    let (sub, rest) = match rest.split_once(' ') {
        Some((s, r)) => (s, r.trim()),
        None => (rest, ""),
    };
    match sub.to_uppercase().as_str() {
        "SET" => {
            let (name, times_text) = rest
                .split_once(' ')
                .ok_or(WireError::WrongArity("LINE SET <name> <time>[,<time>...]"))?;
            if !model::valid_line_name(name) {
                return Err(WireError::BadLineName(name.to_string()));
            }
            let times: Vec<String> = times_text
                .split(',')
                .map(|t| t.trim().to_string())
                .filter(|t| !t.is_empty())
                .collect();
            if times.is_empty() {
                return Err(WireError::WrongArity("LINE SET <name> <time>[,<time>...]"));
            }
            Ok(Command::LineSet {
                name: name.to_string(),
                times,
            })
        }
        "GET" => one_arg(rest, "LINE GET <name>").map(|name| Command::LineGet { name }),
        "DEL" => one_arg(rest, "LINE DEL <name>").map(|name| Command::LineDel { name }),
        other => Err(WireError::UnknownCommand(format!("LINE {other}"))),
    }
}

// ── Execution ────────────────────────────────────────────────

async fn execute(store: &Store, cmd: Command) -> String {
    match cmd {
        Command::Put { key, payload } => match store.put(&key, payload.as_bytes()).await {
            Ok(n) => format!("OK {n}"),
            Err(e) => render_store_err(e),
        },
        Command::Get { key } => match store.get(&key).await {
            Ok(bytes) => format!("VALUE {}", String::from_utf8_lossy(&bytes)),
            Err(e) => render_store_err(e),
        },
        Command::Del { key } => match store.delete(&key).await {
            Ok(()) => "OK".to_string(),
            Err(e) => render_store_err(e),
        },
        Command::Keys { prefix } => match store.keys(&prefix).await {
            Ok(keys) => {
                let mut sorted: Vec<String> = keys.into_iter().collect();
                sorted.sort();
                if sorted.is_empty() {
                    "KEYS".to_string()
                } else {
                    format!("KEYS {}", sorted.join(" "))
                }
            }
            Err(e) => render_store_err(e),
        },
        Command::LineSet { name, times } => {
            let line = TrainLine {
                name: name.clone(),
                schedule: Schedule {
                    times: times.into_iter().collect(),
                },
            };
            let json = match serde_json::to_vec(&line) {
                Ok(json) => json,
                Err(e) => return format!("ERR encode {name}: {e}"),
            };
            match store.put(&model::line_key(&name), &json).await {
                Ok(_) => "OK".to_string(),
                Err(e) => render_store_err(e),
            }
        }
        Command::LineGet { name } => match store.get(&model::line_key(&name)).await {
            Ok(bytes) => format!("VALUE {}", String::from_utf8_lossy(&bytes)),
            Err(e) => render_store_err(e),
        },
        Command::LineDel { name } => match store.delete(&model::line_key(&name)).await {
            Ok(()) => "OK".to_string(),
            Err(e) => render_store_err(e),
        },
        Command::Report { time } => {
            let threshold = match clock::parse(&time) {
                Ok(minutes) => minutes,
                Err(e) => return format!("ERR {e}"),
            };
            let entries = match report::load_entries(store).await {
                Ok(entries) => entries,
                Err(e) => return format!("ERR {e}"),
            };
            match report::find_collision(&entries, threshold) {
                Some(collision) => {
                    let answer = collision.into_answer();
                    match serde_json::to_string(&answer) {
                        Ok(json) => format!("REPORT {json}"),
                        Err(e) => format!("ERR encode report: {e}"),
                    }
                }
                None => "NONE".to_string(),
            }
        }
    }
}

fn render_store_err(e: StoreError) -> String {
    match e {
        StoreError::NotFound(key) => format!("NOTFOUND {key}"),
        other => format!("ERR {other}"),
    }
}

/// Serve one client: read command lines, answer one response line per
/// command until the peer disconnects.
pub async fn process_connection(
    socket: TcpStream,
    store: Arc<Store>,
) -> Result<(), LinesCodecError> {
    let mut framed = Framed::new(socket, LinesCodec::new_with_max_length(MAX_LINE_LEN));

    while let Some(line) = framed.next().await {
        let line = line?;
        let response = match parse_command(&line) {
            Ok(cmd) => {
                let label = observability::command_label(&cmd);
                let start = Instant::now();
                let response = execute(&store, cmd).await;
                let status = if response.starts_with("ERR") { "error" } else { "ok" };
                metrics::counter!(
                    observability::COMMANDS_TOTAL,
                    "command" => label,
                    "status" => status
                )
                .increment(1);
                metrics::histogram!(
                    observability::COMMAND_DURATION_SECONDS,
                    "command" => label
                )
                .record(start.elapsed().as_secs_f64());
                response
            }
            // Blank lines are ignored rather than answered.
            Err(WireError::Empty) => continue,
            Err(e) => format!("ERR {e}"),
        };
        framed.send(response).await?;
    }
    Ok(())
}

// ── Errors ────────────────────────────────────────────────────

#[derive(Debug, PartialEq, Eq)]
pub enum WireError {
    Empty,
    UnknownCommand(String),
    WrongArity(&'static str),
    BadLineName(String),
}

impl std::fmt::Display for WireError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WireError::Empty => write!(f, "empty command"),
            WireError::UnknownCommand(v) => write!(f, "unknown command: {v}"),
            WireError::WrongArity(usage) => write!(f, "usage: {usage}"),
            WireError::BadLineName(name) => write!(
                f,
                "train line name '{name}' must be 1 to 4 alphanumeric characters"
            ),
        }
    }
}

impl std::error::Error for WireError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_put_keeps_payload_spaces() {
        let cmd = parse_command("PUT k1 hello busy world").unwrap();
        assert_eq!(
            cmd,
            Command::Put {
                key: "k1".into(),
                payload: "hello busy world".into()
            }
        );
    }

    #[test]
    fn parse_put_without_payload_is_empty_payload() {
        let cmd = parse_command("PUT k1").unwrap();
        assert_eq!(
            cmd,
            Command::Put {
                key: "k1".into(),
                payload: String::new()
            }
        );
    }

    #[test]
    fn parse_verbs_are_case_insensitive() {
        assert_eq!(
            parse_command("get k1").unwrap(),
            Command::Get { key: "k1".into() }
        );
    }

    #[test]
    fn parse_keys_defaults_to_empty_prefix() {
        assert_eq!(
            parse_command("KEYS").unwrap(),
            Command::Keys { prefix: "".into() }
        );
        assert_eq!(
            parse_command("KEYS TL-").unwrap(),
            Command::Keys { prefix: "TL-".into() }
        );
    }

    #[test]
    fn parse_line_set_splits_times_on_commas() {
        let cmd = parse_command("LINE SET A12 9:00 am,10:30 am").unwrap();
        assert_eq!(
            cmd,
            Command::LineSet {
                name: "A12".into(),
                times: vec!["9:00 am".into(), "10:30 am".into()],
            }
        );
    }

    #[test]
    fn parse_line_set_rejects_bad_names() {
        let err = parse_command("LINE SET TOOLONG 9:00 am").unwrap_err();
        assert_eq!(err, WireError::BadLineName("TOOLONG".into()));
    }

    #[test]
    fn parse_report_keeps_time_spaces() {
        assert_eq!(
            parse_command("REPORT 1:05 pm").unwrap(),
            Command::Report { time: "1:05 pm".into() }
        );
    }

    #[test]
    fn parse_unknown_command_errors() {
        assert!(matches!(
            parse_command("FROB k1"),
            Err(WireError::UnknownCommand(_))
        ));
    }

    #[test]
    fn parse_blank_line_is_empty() {
        assert_eq!(parse_command("   "), Err(WireError::Empty));
    }

    // ── Execution against a real store ───────────────────────

    fn test_store(name: &str) -> Store {
        let dir = std::env::temp_dir().join("railyard_test_wire").join(name);
        let _ = std::fs::remove_dir_all(&dir);
        Store::open(dir).unwrap()
    }

    async fn run(store: &Store, line: &str) -> String {
        execute(store, parse_command(line).unwrap()).await
    }

    #[tokio::test]
    async fn put_get_del_over_commands() {
        let store = test_store("put_get_del");
        assert_eq!(run(&store, "PUT k1 payload").await, "OK 7");
        assert_eq!(run(&store, "GET k1").await, "VALUE payload");
        assert_eq!(run(&store, "DEL k1").await, "OK");
        assert_eq!(run(&store, "GET k1").await, "NOTFOUND k1");
    }

    #[tokio::test]
    async fn put_empty_payload_deletes() {
        let store = test_store("put_empty");
        assert_eq!(run(&store, "PUT k1 payload").await, "OK 7");
        assert_eq!(run(&store, "PUT k1").await, "OK 0");
        assert_eq!(run(&store, "GET k1").await, "NOTFOUND k1");
    }

    #[tokio::test]
    async fn keys_lists_sorted() {
        let store = test_store("keys_sorted");
        run(&store, "PUT b 1").await;
        run(&store, "PUT a 1").await;
        assert_eq!(run(&store, "KEYS").await, "KEYS a b");
    }

    #[tokio::test]
    async fn line_set_stores_decodable_json() {
        let store = test_store("line_set");
        assert_eq!(run(&store, "LINE SET A12 9:00 am,10:30 am").await, "OK");

        let response = run(&store, "LINE GET A12").await;
        let json = response.strip_prefix("VALUE ").unwrap();
        let line: TrainLine = serde_json::from_str(json).unwrap();
        assert_eq!(line.name, "A12");
        assert_eq!(line.schedule.times.len(), 2);

        assert_eq!(run(&store, "LINE DEL A12").await, "OK");
        assert_eq!(run(&store, "LINE GET A12").await, "NOTFOUND TL-A12");
    }

    #[tokio::test]
    async fn report_finds_shared_time() {
        let store = test_store("report_hit");
        run(&store, "LINE SET A1 9:00 am,11:00 am").await;
        run(&store, "LINE SET B2 9:00 am").await;

        let response = run(&store, "REPORT 7:00 am").await;
        let json = response.strip_prefix("REPORT ").unwrap();
        let answer: crate::model::TrainsAtTime = serde_json::from_str(json).unwrap();
        assert_eq!(answer.time, "9:0 pm");
        let trains: Vec<&str> = answer.trains.iter().map(String::as_str).collect();
        assert_eq!(trains, ["A1", "B2"]);
    }

    #[tokio::test]
    async fn report_without_collision_is_none() {
        let store = test_store("report_none");
        run(&store, "LINE SET A1 9:00 am").await;
        run(&store, "LINE SET B2 10:00 am").await;
        assert_eq!(run(&store, "REPORT 7:00 am").await, "NONE");
    }

    #[tokio::test]
    async fn report_rejects_bad_time() {
        let store = test_store("report_bad_time");
        let response = run(&store, "REPORT 13:00 pm").await;
        assert!(response.starts_with("ERR "), "got: {response}");
    }

    #[tokio::test]
    async fn report_surfaces_poisoned_records() {
        let store = test_store("report_poisoned");
        run(&store, "PUT TL-X {broken").await;
        let response = run(&store, "REPORT 7:00 am").await;
        assert!(response.starts_with("ERR "), "got: {response}");
        assert!(response.contains("TL-X"), "got: {response}");
    }
}
