//! Parsing of REPL input lines.

use std::path::PathBuf;
use std::str::FromStr;
use tutor_core::session::{Mode, UnknownMode};

pub const HELP: &str = "\
Commands:
  /mode <analyze|learn|math|technical>  enter a mode
  /back                                 return to mode selection
  /topic <name>                         start learning a topic
  /new                                  clear the conversation for a new topic
  /upload <path>                        analyse a source file (analyze mode)
  /edit                                 replace the editor contents; end with a line containing only '.'
  /code                                 show the editor contents
  /submit                               submit the editor contents
  /diagram <description>                ask for a diagram
  /help                                 show this help
  /quit                                 exit
Anything else is sent to the tutor as your message.";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Mode(Mode),
    Back,
    Topic(String),
    NewTopic,
    Upload(PathBuf),
    Edit,
    ShowCode,
    Submit,
    Diagram(String),
    Help,
    Quit,
    Say(String),
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CommandError {
    #[error("unknown command '/{0}' (type /help for a list)")]
    Unknown(String),
    #[error("/{0} needs an argument")]
    MissingArgument(&'static str),
    #[error(transparent)]
    Mode(#[from] UnknownMode),
}

impl FromStr for Command {
    type Err = CommandError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let line = line.trim();
        let Some(rest) = line.strip_prefix('/') else {
            return Ok(Command::Say(line.to_string()));
        };
        let (name, arg) = match rest.split_once(char::is_whitespace) {
            Some((name, arg)) => (name, arg.trim()),
            None => (rest, ""),
        };
        let required = |name: &'static str| {
            if arg.is_empty() {
                Err(CommandError::MissingArgument(name))
            } else {
                Ok(arg.to_string())
            }
        };

        match name.to_lowercase().as_str() {
            "mode" => Ok(Command::Mode(required("mode")?.parse()?)),
            "back" => Ok(Command::Back),
            "topic" => required("topic").map(Command::Topic),
            "new" => Ok(Command::NewTopic),
            "upload" => required("upload").map(|p| Command::Upload(PathBuf::from(p))),
            "edit" => Ok(Command::Edit),
            "code" => Ok(Command::ShowCode),
            "submit" => Ok(Command::Submit),
            "diagram" => required("diagram").map(Command::Diagram),
            "help" | "?" => Ok(Command::Help),
            "quit" | "exit" => Ok(Command::Quit),
            other => Err(CommandError::Unknown(other.to_string())),
        }
    }
}
