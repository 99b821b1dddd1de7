use crate::engine::{Command, InboxMessage};
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tokio::sync::mpsc;
use tracing::warn;

/// Reads whitespace-tokenized commands from `reader`, one per line, and
/// forwards them to `inbox` until the stream ends or an `exit`/`quit` line is
/// read. Unrecognized lines are dropped silently, matching the original
/// parser's behaviour of ignoring anything it doesn't recognize.
pub async fn run<R: AsyncBufRead + Unpin>(reader: R, inbox: mpsc::Sender<InboxMessage>) {
    let mut lines = reader.lines();
    loop {
        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => break,
            Err(err) => {
                warn!(%err, "command source read failed");
                break;
            }
        };

        let Some(command) = parse_command(&line) else {
            continue;
        };
        let is_exit = matches!(command, Command::Exit);

        if inbox.send(InboxMessage::Command(command)).await.is_err() {
            break;
        }
        if is_exit {
            break;
        }
    }
}

/// Parses one command line. `closeall` additionally accepts an optional
/// trailing `client <key>` pair for symmetry with `initlimits`, a deliberate
/// supplement beyond the original parser (which only wires that pair onto
/// `initlimits`).
fn parse_command(line: &str) -> Option<Command> {
    let mut tokens = line.split_whitespace();
    let verb = tokens.next()?;

    match verb {
        "exit" | "quit" => Some(Command::Exit),
        "status" => Some(Command::Status),
        "closeall" => Some(Command::CloseAll {
            client: parse_client(tokens),
        }),
        "initlimits" => Some(Command::InitLimits {
            client: parse_client(tokens),
        }),
        _ => {
            warn!(line, "unrecognized command");
            None
        }
    }
}

fn parse_client<'a>(mut tokens: impl Iterator<Item = &'a str>) -> Option<String> {
    match (tokens.next(), tokens.next()) {
        (Some("client"), Some(key)) => Some(key.to_string()),
        _ => None,
    }
}
