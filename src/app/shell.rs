#[cfg(test)]
#[path = "shell_test.rs"]
mod tests;

use thiserror::Error;

pub const HELP: &str = r#"Type a message and press Enter to send it.

Commands:
  /new                       start a new conversation
  /list                      list conversations
  /switch <n|id>             switch to a conversation by list number or id prefix
  /rename <title>            rename the current conversation
  /pin                       pin or unpin the current conversation
  /archive                   archive or restore the current conversation
  /dup                       duplicate the current conversation
  /delete                    delete the current conversation
  /search <query>            search titles and latest messages
  /model [id]                show or set the model
  /models                    refresh and list available models
  /mode [id]                 show modes or set the mode (resets settings)
  /set <deep|web|image> <on|off>
                             toggle a conversation setting
  /split                     show thought and final answer of the last reply
  /stop                      stop the current response (also Ctrl-C)
  /help                      show this help
  /quit                      exit (also Ctrl-C when idle)"#;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Setting {
    DeepThinking,
    WebSearch,
    ImageTool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Send(String),
    New,
    List,
    Switch(String),
    Rename(String),
    Pin,
    Archive,
    Duplicate,
    Delete,
    Search(String),
    Model(Option<String>),
    Models,
    Mode(Option<String>),
    Set(Setting, bool),
    Split,
    Stop,
    Help,
    Quit,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ParseError {
    #[error("unknown command {0}, try /help")]
    Unknown(String),
    #[error("usage: {0}")]
    Usage(&'static str),
}

/// Parse one input line. Blank lines parse to `None`.
pub fn parse(line: &str) -> Result<Option<Command>, ParseError> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(None);
    }
    if !line.starts_with('/') {
        return Ok(Some(Command::Send(line.to_string())));
    }

    let mut parts = line.splitn(2, char::is_whitespace);
    let name = parts.next().unwrap_or_default();
    let arg = parts.next().map(str::trim).filter(|a| !a.is_empty());

    let command = match name {
        "/new" => Command::New,
        "/list" | "/ls" => Command::List,
        "/switch" | "/s" => Command::Switch(required(arg, "/switch <n|id>")?),
        "/rename" => Command::Rename(arg.unwrap_or_default().to_string()),
        "/pin" => Command::Pin,
        "/archive" => Command::Archive,
        "/dup" | "/duplicate" => Command::Duplicate,
        "/delete" | "/rm" => Command::Delete,
        "/search" | "/find" => Command::Search(arg.unwrap_or_default().to_string()),
        "/model" => Command::Model(arg.map(str::to_string)),
        "/models" => Command::Models,
        "/mode" => Command::Mode(arg.map(str::to_string)),
        "/set" => parse_set(arg)?,
        "/split" => Command::Split,
        "/stop" => Command::Stop,
        "/help" | "/h" | "/?" => Command::Help,
        "/quit" | "/exit" | "/q" => Command::Quit,
        other => return Err(ParseError::Unknown(other.to_string())),
    };
    Ok(Some(command))
}

fn required(arg: Option<&str>, usage: &'static str) -> Result<String, ParseError> {
    arg.map(str::to_string).ok_or(ParseError::Usage(usage))
}

fn parse_set(arg: Option<&str>) -> Result<Command, ParseError> {
    const USAGE: &str = "/set <deep|web|image> <on|off>";
    let mut words = arg.unwrap_or_default().split_whitespace();
    let setting = match words.next() {
        Some("deep") | Some("thinking") => Setting::DeepThinking,
        Some("web") | Some("search") => Setting::WebSearch,
        Some("image") => Setting::ImageTool,
        _ => return Err(ParseError::Usage(USAGE)),
    };
    let enabled = match words.next() {
        Some("on") | Some("true") | Some("1") => true,
        Some("off") | Some("false") | Some("0") => false,
        _ => return Err(ParseError::Usage(USAGE)),
    };
    if words.next().is_some() {
        return Err(ParseError::Usage(USAGE));
    }
    Ok(Command::Set(setting, enabled))
}
