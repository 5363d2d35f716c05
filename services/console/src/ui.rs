//! Terminal front end: the line commands a user types and the incremental
//! transcript renderer.

use console_core::transcript::{BlockKind, Change, Transcript};
use openai_realtime_types::Voice;
use std::io::{self, Write};

pub const HELP: &str = "\
Commands:
  /start                 open a realtime session
  /stop                  close the session
  <text>                 send a chat message
  /delete <item id>      delete a conversation item
  /voice <name>          alloy, ash, ballad, coral, echo, sage, shimmer, verse
  /temperature <value>   0.6 to 1.2
  /language <name>       language the assistants answer in
  /azure on|off          use the Azure OpenAI endpoint
  /chat-only on|off      skip the microphone
  /help                  show this text
  /quit                  exit";

/// Something the user asked the console to do.
#[derive(Debug, Clone, PartialEq)]
pub enum UiCommand {
    Start,
    Stop,
    SendText(String),
    DeleteItem(String),
    SetVoice(Voice),
    SetTemperature(f32),
    SetLanguage(String),
    SetAzure(bool),
    SetChatOnly(bool),
    Help,
    Quit,
}

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum ParseError {
    #[error("unknown command /{0}, try /help")]
    UnknownCommand(String),
    #[error("/{0} needs an argument")]
    MissingArgument(&'static str),
    #[error("invalid argument for /{command}: {reason}")]
    InvalidArgument {
        command: &'static str,
        reason: String,
    },
}

fn on_off(command: &'static str, arg: &str) -> Result<bool, ParseError> {
    match arg.to_ascii_lowercase().as_str() {
        "on" | "true" | "yes" | "1" => Ok(true),
        "off" | "false" | "no" | "0" => Ok(false),
        other => Err(ParseError::InvalidArgument {
            command,
            reason: format!("expected on or off, got '{}'", other),
        }),
    }
}

/// Parses one input line. Blank lines yield `None`.
pub fn parse_line(line: &str) -> Result<Option<UiCommand>, ParseError> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(None);
    }
    let Some(rest) = line.strip_prefix('/') else {
        return Ok(Some(UiCommand::SendText(line.to_string())));
    };

    let (name, arg) = match rest.split_once(char::is_whitespace) {
        Some((name, arg)) => (name, arg.trim()),
        None => (rest, ""),
    };
    let required = |command: &'static str| {
        if arg.is_empty() {
            Err(ParseError::MissingArgument(command))
        } else {
            Ok(arg)
        }
    };

    let command = match name {
        "start" => UiCommand::Start,
        "stop" => UiCommand::Stop,
        "help" => UiCommand::Help,
        "quit" | "exit" => UiCommand::Quit,
        "delete" => UiCommand::DeleteItem(required("delete")?.to_string()),
        "voice" => {
            let voice = required("voice")?
                .parse::<Voice>()
                .map_err(|reason| ParseError::InvalidArgument {
                    command: "voice",
                    reason,
                })?;
            UiCommand::SetVoice(voice)
        }
        "temperature" => {
            let value = required("temperature")?.parse::<f32>().map_err(|e| {
                ParseError::InvalidArgument {
                    command: "temperature",
                    reason: e.to_string(),
                }
            })?;
            UiCommand::SetTemperature(value)
        }
        "language" => UiCommand::SetLanguage(required("language")?.to_string()),
        "azure" => UiCommand::SetAzure(on_off("azure", required("azure")?)?),
        "chat-only" => UiCommand::SetChatOnly(on_off("chat-only", required("chat-only")?)?),
        other => return Err(ParseError::UnknownCommand(other.to_string())),
    };
    Ok(Some(command))
}

/// Shows the transcript and status messages.
pub trait Renderer: Send {
    /// Applies the changes recorded since the last call.
    fn render(&mut self, transcript: &Transcript, changes: &[Change]);

    /// A status line outside the transcript.
    fn notice(&mut self, message: &str);
}

const RULE: &str = "────────────────────────────────────────";

/// Writes the transcript as a running log. Text streamed into the block on
/// the current line continues that line; text for any other block reprints
/// that block on a fresh line.
pub struct TerminalRenderer<W: Write + Send> {
    out: W,
    /// Block whose text ends the current output line.
    cursor: Option<usize>,
    started: bool,
}

impl TerminalRenderer<io::Stdout> {
    pub fn stdout() -> Self {
        Self::new(io::stdout())
    }
}

impl<W: Write + Send> TerminalRenderer<W> {
    pub fn new(out: W) -> Self {
        Self {
            out,
            cursor: None,
            started: false,
        }
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    fn new_line(&mut self) -> io::Result<()> {
        if self.started {
            writeln!(self.out)?;
        }
        self.started = true;
        Ok(())
    }

    fn apply(&mut self, transcript: &Transcript, change: &Change) -> io::Result<()> {
        match change {
            Change::Opened { index, kind } => {
                if *kind == BlockKind::Rule {
                    self.new_line()?;
                    write!(self.out, "{}", RULE)?;
                    self.cursor = None;
                } else {
                    self.cursor = Some(*index);
                    self.new_line()?;
                }
            }
            Change::Appended { index, text } => {
                if self.cursor == Some(*index) {
                    write!(self.out, "{}", text)?;
                } else if let Some(block) = transcript.block(*index) {
                    self.new_line()?;
                    write!(self.out, "{}", block.text)?;
                    self.cursor = Some(*index);
                }
            }
            Change::Struck { index } => {
                if let Some(block) = transcript.block(*index) {
                    self.new_line()?;
                    write!(self.out, "\x1b[9m{}\x1b[0m (deleted)", block.text)?;
                    self.cursor = None;
                }
            }
        }
        Ok(())
    }
}

impl<W: Write + Send> Renderer for TerminalRenderer<W> {
    fn render(&mut self, transcript: &Transcript, changes: &[Change]) {
        let result = changes
            .iter()
            .try_for_each(|change| self.apply(transcript, change))
            .and_then(|_| self.out.flush());
        if let Err(e) = result {
            tracing::error!(error = %e, "Failed to write transcript");
        }
    }

    fn notice(&mut self, message: &str) {
        eprintln!("* {}", message);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_text_is_sent() {
        assert_eq!(
            parse_line("  hello there ").unwrap(),
            Some(UiCommand::SendText("hello there".to_string()))
        );
        assert_eq!(parse_line("   ").unwrap(), None);
    }

    #[test]
    fn test_parse_commands() {
        assert_eq!(parse_line("/start").unwrap(), Some(UiCommand::Start));
        assert_eq!(parse_line("/quit").unwrap(), Some(UiCommand::Quit));
        assert_eq!(
            parse_line("/delete  item_42 ").unwrap(),
            Some(UiCommand::DeleteItem("item_42".to_string()))
        );
        assert_eq!(
            parse_line("/voice shimmer").unwrap(),
            Some(UiCommand::SetVoice(Voice::Shimmer))
        );
        assert_eq!(
            parse_line("/temperature 1.1").unwrap(),
            Some(UiCommand::SetTemperature(1.1))
        );
        assert_eq!(
            parse_line("/language Brazilian Portuguese").unwrap(),
            Some(UiCommand::SetLanguage("Brazilian Portuguese".to_string()))
        );
        assert_eq!(
            parse_line("/azure on").unwrap(),
            Some(UiCommand::SetAzure(true))
        );
        assert_eq!(
            parse_line("/chat-only OFF").unwrap(),
            Some(UiCommand::SetChatOnly(false))
        );
    }

    #[test]
    fn test_parse_errors() {
        assert_eq!(
            parse_line("/delete"),
            Err(ParseError::MissingArgument("delete"))
        );
        assert_eq!(
            parse_line("/dance"),
            Err(ParseError::UnknownCommand("dance".to_string()))
        );
        assert!(matches!(
            parse_line("/voice robot"),
            Err(ParseError::InvalidArgument { command: "voice", .. })
        ));
        assert!(matches!(
            parse_line("/azure maybe"),
            Err(ParseError::InvalidArgument { command: "azure", .. })
        ));
    }

    fn rendered(transcript: &mut Transcript) -> String {
        let mut renderer = TerminalRenderer::new(Vec::new());
        let changes = transcript.drain_changes();
        renderer.render(transcript, &changes);
        String::from_utf8(renderer.into_inner()).unwrap()
    }

    #[test]
    fn test_streamed_text_continues_the_line() {
        let mut transcript = Transcript::new();
        transcript.new_block("Assistant: ");
        transcript.append("Hel");
        transcript.append("lo");
        assert_eq!(rendered(&mut transcript), "Assistant: Hello");
    }

    #[test]
    fn test_late_append_reprints_its_block() {
        let mut transcript = Transcript::new();
        let speech = transcript.new_speech_block();
        transcript.new_block("");
        transcript.append("Assistant: Hi");
        transcript.append_to(speech, "User (Speech): hey >> item_1");

        assert_eq!(
            rendered(&mut transcript),
            "\nAssistant: Hi\nUser (Speech): hey >> item_1"
        );
    }

    #[test]
    fn test_rule_and_strike() {
        let mut transcript = Transcript::new();
        transcript.new_block("User: hi");
        transcript.append_message_id("item_1");
        transcript.push_rule();
        transcript.mark_deleted("item_1");

        let out = rendered(&mut transcript);
        assert!(out.starts_with("User: hi >> item_1\n"));
        assert!(out.contains(RULE));
        assert!(out.ends_with("\x1b[9mUser: hi >> item_1\x1b[0m (deleted)"));
    }
}
