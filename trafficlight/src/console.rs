//! Interactive console session
//!
//! One input line is one button press. Every state change is printed as
//! `LIGHT: <phase>  TIMER: <seconds>` so the operator sees the light and
//! the countdown the way the rig shows them.

use clap::ValueEnum;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tokio_util::sync::CancellationToken;
use tracing::debug;
use trafficlight_core::Phase;

use crate::controller::ControllerHandle;
use crate::error::TrafficLightError;

const HELP: &str = "\
commands:
  start                 start the automatic cycle
  stop                  stop the cycle and turn the light off
  go | caution | red    force a phase once (alias: green, yellow)
  manual <phase>        force go, caution, stop or off
  status                show the light and timer
  help                  show this text
  quit | exit           leave";

/// A parsed console line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsoleCommand {
    /// Start the automatic cycle.
    Start,
    /// Stop the cycle.
    Stop,
    /// Force one phase.
    Manual(Phase),
    /// Print the current state.
    Status,
    /// Print the command list.
    Help,
    /// End the session.
    Quit,
}

/// Why a session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEnd {
    /// Input reached end of file.
    Eof,
    /// The operator typed `quit` or `exit`.
    Quit,
    /// Shutdown was requested from outside (signal).
    Cancelled,
    /// The controller runtime went away.
    ControllerStopped,
}

impl SessionEnd {
    /// Label used in logs.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Eof => "end of input",
            Self::Quit => "operator quit",
            Self::Cancelled => "cancelled",
            Self::ControllerStopped => "controller stopped",
        }
    }
}

/// Parses one input line using shell quoting rules.
///
/// Returns `Ok(None)` for blank lines.
///
/// # Errors
///
/// Returns a message for the operator when the line is not a command.
pub fn parse_line(line: &str) -> Result<Option<ConsoleCommand>, String> {
    let tokens = shlex::split(line).ok_or_else(|| "unbalanced quotes".to_string())?;
    let tokens: Vec<String> = tokens.iter().map(|t| t.to_ascii_lowercase()).collect();
    let words: Vec<&str> = tokens.iter().map(String::as_str).collect();

    let command = match words.as_slice() {
        [] => return Ok(None),
        ["start"] => ConsoleCommand::Start,
        ["stop"] => ConsoleCommand::Stop,
        ["go" | "green"] => ConsoleCommand::Manual(Phase::Go),
        ["caution" | "yellow"] => ConsoleCommand::Manual(Phase::Caution),
        ["red"] => ConsoleCommand::Manual(Phase::Stop),
        ["manual", phase] => {
            let phase = Phase::from_str(phase, true)
                .map_err(|_| format!("unknown phase '{phase}': expected go, caution, stop or off"))?;
            ConsoleCommand::Manual(phase)
        }
        ["status"] => ConsoleCommand::Status,
        ["help" | "?"] => ConsoleCommand::Help,
        ["quit" | "exit"] => ConsoleCommand::Quit,
        _ => return Err(format!("unknown command '{}', type 'help'", line.trim())),
    };
    Ok(Some(command))
}

/// Runs a console session until end of input, `quit`, or cancellation.
///
/// # Errors
///
/// Returns an error if reading input or writing output fails, or if the
/// controller rejects a request because it has shut down.
pub async fn run_session<R, W>(
    handle: &ControllerHandle,
    input: R,
    mut output: W,
    autostart: bool,
    cancel: &CancellationToken,
) -> Result<SessionEnd, TrafficLightError>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut lines = input.lines();
    let mut updates = handle.subscribe();

    let initial = *updates.borrow_and_update();
    write_line(&mut output, &initial.to_string()).await?;

    if autostart {
        handle.start_cycle().await?;
    }

    let end = loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => break SessionEnd::Cancelled,
            changed = updates.changed() => {
                if changed.is_err() {
                    break SessionEnd::ControllerStopped;
                }
                let state = *updates.borrow_and_update();
                write_line(&mut output, &state.to_string()).await?;
            }
            line = lines.next_line() => {
                let Some(line) = line? else {
                    break SessionEnd::Eof;
                };
                match parse_line(&line) {
                    Ok(None) => {}
                    Ok(Some(ConsoleCommand::Quit)) => break SessionEnd::Quit,
                    Ok(Some(command)) => {
                        debug!(?command, "console command");
                        apply(handle, command, &mut output).await?;
                    }
                    Err(message) => write_line(&mut output, &message).await?,
                }
            }
        }
    };

    debug!(reason = end.as_str(), "console session ended");
    Ok(end)
}

async fn apply<W>(
    handle: &ControllerHandle,
    command: ConsoleCommand,
    output: &mut W,
) -> Result<(), TrafficLightError>
where
    W: AsyncWrite + Unpin,
{
    match command {
        ConsoleCommand::Start => {
            handle.start_cycle().await?;
        }
        ConsoleCommand::Stop => {
            handle.stop_cycle().await?;
        }
        ConsoleCommand::Manual(phase) => {
            handle.manual(phase).await?;
        }
        ConsoleCommand::Status => write_line(output, &handle.snapshot().to_string()).await?,
        ConsoleCommand::Help => write_line(output, HELP).await?,
        ConsoleCommand::Quit => {}
    }
    Ok(())
}

async fn write_line<W>(output: &mut W, line: &str) -> std::io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    output.write_all(line.as_bytes()).await?;
    output.write_all(b"\n").await?;
    output.flush().await
}
