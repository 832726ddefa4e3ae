use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CommandError {
    #[error("empty command")]
    Empty,

    #[error("unknown command `{0}`, try `help`")]
    Unknown(String),

    #[error("usage: {0}")]
    Usage(&'static str),

    #[error("unterminated quote")]
    UnterminatedQuote,

    #[error("undefined variable ${0}")]
    UndefinedVariable(String),

    #[error("bad substitution in `{0}`")]
    BadSubstitution(String),
}

/// Where `cd` goes
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CdTarget {
    Home,
    Previous,
    Path(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AliasArgs {
    List,
    Show(String),
    Define { name: String, value: String },
}

/// A parsed shell line
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    List(Option<String>),
    ChangeDir(CdTarget),
    PrintDir,
    Get { remote: String, local: Option<String> },
    Put { local: String, remote: Option<String> },
    Files,
    Platform,
    Connect,
    Disconnect,
    History,
    Alias(AliasArgs),
    Unalias(String),
    Help,
    Quit,
}

pub const HELP: &str = "\
ls [path]               list a remote directory
cd [path | - | ~]       change the remote directory
pwd                     print the remote directory
get <remote> [local]    download a file
put <local> [remote]    upload a file
files                   show the last listing again
platform                show local and remote platforms
connect                 (re)connect to the server
disconnect              close the connection
history                 show recent commands
alias [name[=value]]    list, show or define aliases
unalias <name>          remove an alias
help                    show this text
exit | quit             leave";

/// Replaces `$NAME` and `${NAME}` in `word` with `lookup(NAME)`.
/// A `$` that does not start a name is kept.
pub fn expand_vars<F>(word: &str, lookup: F) -> Result<String, CommandError>
where
    F: Fn(&str) -> Option<String>,
{
    let mut out = String::with_capacity(word.len());
    let mut chars = word.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch != '$' {
            out.push(ch);
            continue;
        }

        let braced = chars.next_if_eq(&'{').is_some();
        let mut name = String::new();
        if let Some(first) = chars.next_if(|c| c.is_ascii_alphabetic() || *c == '_') {
            name.push(first);
            while let Some(c) = chars.next_if(|c| c.is_ascii_alphanumeric() || *c == '_')
            {
                name.push(c);
            }
        }

        if braced {
            if name.is_empty() || chars.next_if_eq(&'}').is_none() {
                return Err(CommandError::BadSubstitution(word.to_string()));
            }
        } else if name.is_empty() {
            out.push('$');
            continue;
        }

        let value = lookup(&name).ok_or(CommandError::UndefinedVariable(name))?;
        out.push_str(&value);
    }
    Ok(out)
}

/// Splits on whitespace; double quotes keep spaces inside one word.
pub fn tokenize(line: &str) -> Result<Vec<String>, CommandError> {
    let mut words = Vec::new();
    let mut current = String::new();
    let mut in_word = false;
    let mut quoted = false;

    for ch in line.chars() {
        match ch {
            '"' => {
                quoted = !quoted;
                in_word = true;
            }
            c if c.is_whitespace() && !quoted => {
                if in_word {
                    words.push(std::mem::take(&mut current));
                    in_word = false;
                }
            }
            c => {
                current.push(c);
                in_word = true;
            }
        }
    }

    if quoted {
        return Err(CommandError::UnterminatedQuote);
    }
    if in_word {
        words.push(current);
    }
    Ok(words)
}

fn parse_alias(args: &[String]) -> Result<AliasArgs, CommandError> {
    const USAGE: &str = "alias [name[=value]]";

    let Some(first) = args.first() else {
        return Ok(AliasArgs::List);
    };

    let (name, mut value_parts) = match first.split_once('=') {
        Some((name, value)) => {
            let mut parts = Vec::new();
            if !value.is_empty() {
                parts.push(value.to_string());
            }
            (name.to_string(), parts)
        }
        None if args.len() == 1 => return Ok(AliasArgs::Show(first.clone())),
        None => (first.clone(), Vec::new()),
    };

    let rest = match args.get(1).map(String::as_str) {
        Some("=") if !first.contains('=') => &args[2..],
        _ => &args[1..],
    };
    value_parts.extend(rest.iter().cloned());

    let value = value_parts.join(" ");
    if name.is_empty() || value.is_empty() {
        return Err(CommandError::Usage(USAGE));
    }
    Ok(AliasArgs::Define { name, value })
}

impl Command {
    /// Builds a command from already split (and expanded) words.
    pub fn from_words(words: &[String]) -> Result<Self, CommandError> {
        let (name, args) = words.split_first().ok_or(CommandError::Empty)?;

        let no_args = |command: Command, usage| {
            if args.is_empty() { Ok(command) } else { Err(CommandError::Usage(usage)) }
        };

        match name.as_str() {
            "ls" | "dir" => match args {
                [] => Ok(Command::List(None)),
                [path] => Ok(Command::List(Some(path.clone()))),
                _ => Err(CommandError::Usage("ls [path]")),
            },
            "cd" => match args {
                [] => Ok(Command::ChangeDir(CdTarget::Home)),
                [path] => Ok(Command::ChangeDir(match path.as_str() {
                    "~" | "~/" => CdTarget::Home,
                    "-" => CdTarget::Previous,
                    _ => CdTarget::Path(path.clone()),
                })),
                _ => Err(CommandError::Usage("cd [path | - | ~]")),
            },
            "get" => match args {
                [remote] => Ok(Command::Get { remote: remote.clone(), local: None }),
                [remote, local] => Ok(Command::Get {
                    remote: remote.clone(),
                    local: Some(local.clone()),
                }),
                _ => Err(CommandError::Usage("get <remote> [local]")),
            },
            "put" => match args {
                [local] => Ok(Command::Put { local: local.clone(), remote: None }),
                [local, remote] => Ok(Command::Put {
                    local: local.clone(),
                    remote: Some(remote.clone()),
                }),
                _ => Err(CommandError::Usage("put <local> [remote]")),
            },
            "unalias" => match args {
                [alias] => Ok(Command::Unalias(alias.clone())),
                _ => Err(CommandError::Usage("unalias <name>")),
            },
            "alias" => parse_alias(args).map(Command::Alias),
            "pwd" => no_args(Command::PrintDir, "pwd"),
            "files" => no_args(Command::Files, "files"),
            "platform" => no_args(Command::Platform, "platform"),
            "connect" => no_args(Command::Connect, "connect"),
            "disconnect" => no_args(Command::Disconnect, "disconnect"),
            "history" => no_args(Command::History, "history"),
            "help" | "?" => no_args(Command::Help, "help"),
            "exit" | "quit" => no_args(Command::Quit, "exit"),
            other => Err(CommandError::Unknown(other.to_string())),
        }
    }
}

impl FromStr for Command {
    type Err = CommandError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        Self::from_words(&tokenize(line)?)
    }
}
