use crate::config::settings::ShellSettings;
use crate::errors::{Result, TransferError};
use crate::services::file_transfer::FileTransfer;
use crate::services::prompt::Prompter;
use crate::shell::alias::Aliases;
use crate::shell::command::{
    AliasArgs, CdTarget, Command, CommandError, HELP, expand_vars, tokenize,
};
use crate::shell::history::History;
use std::io::{BufRead, Write};
use tracing::{error, info, warn};

enum Flow {
    Continue,
    Quit,
}

/// Interactive loop driving a `FileTransfer`
pub struct Shell<R, W> {
    transfer: FileTransfer,
    history: History,
    aliases: Aliases,
    prompt: String,
    input: R,
    output: W,
}

impl<R: BufRead, W: Write> Shell<R, W> {
    pub fn new(
        transfer: FileTransfer,
        settings: &ShellSettings,
        input: R,
        output: W,
    ) -> Self {
        Self {
            transfer,
            history: History::new(
                settings.effective_history_limit(),
                Some(settings.history_path()),
            ),
            aliases: Aliases::default(),
            prompt: settings.prompt.clone(),
            input,
            output,
        }
    }

    /// Reads and runs commands until `exit` or end of input.
    pub async fn run(&mut self) -> anyhow::Result<()> {
        loop {
            write!(self.output, "{}", self.prompt)?;
            self.output.flush()?;

            let mut line = String::new();
            if self.input.read_line(&mut line)? == 0 {
                writeln!(self.output)?;
                break;
            }
            let line = line.trim();
            if line.is_empty() {
                continue;
            }

            let flow = match self.parse_line(line) {
                Ok(command) => match self.execute(command).await {
                    Ok(flow) => flow,
                    Err(e) => {
                        error!("{}", e);
                        writeln!(self.output, "error: {}", e)?;
                        Flow::Continue
                    }
                },
                Err(e) => {
                    writeln!(self.output, "error: {}", e)?;
                    Flow::Continue
                }
            };

            // recorded once it has run; `exit` itself is not kept
            if let Flow::Quit = flow {
                break;
            }
            if let Err(e) = self.history.push(line) {
                warn!("Failed to save history: {}", e);
            }
        }

        self.finish().await;
        Ok(())
    }

    /// Splits a line, expands aliases and then `$VAR`s, and parses it.
    fn parse_line(&self, line: &str) -> std::result::Result<Command, CommandError> {
        let words = self.aliases.expand(tokenize(line)?)?;
        let words = words
            .iter()
            .map(|word| expand_vars(word, |name| std::env::var(name).ok()))
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Command::from_words(&words)
    }

    async fn execute(&mut self, command: Command) -> Result<Flow> {
        match command {
            Command::List(path) => {
                let entries =
                    self.transfer.refresh_file_list(path.as_deref()).await?;
                for entry in entries {
                    writeln!(self.output, "{}", entry)?;
                }
            }
            Command::Files => {
                for entry in self.transfer.file_list() {
                    writeln!(self.output, "{}", entry)?;
                }
            }
            Command::ChangeDir(target) => {
                let cwd = match target {
                    CdTarget::Home => self.transfer.change_to_home().await?,
                    CdTarget::Previous => self.transfer.change_to_previous().await?,
                    CdTarget::Path(path) => self.transfer.change_dir(&path).await?,
                };
                writeln!(self.output, "{}", cwd)?;
            }
            Command::PrintDir => {
                let cwd = self
                    .transfer
                    .working_dir()
                    .ok_or(TransferError::NotConnected)?;
                writeln!(self.output, "{}", cwd)?;
            }
            Command::Get { remote, local } => {
                let report =
                    self.transfer.download(&remote, local.as_deref()).await?;
                writeln!(self.output, "{}", report)?;
            }
            Command::Put { local, remote } => {
                let report =
                    self.transfer.upload(&local, remote.as_deref()).await?;
                writeln!(self.output, "{}", report)?;
            }
            Command::Platform => {
                writeln!(
                    self.output,
                    "local:  {} {:?}",
                    self.transfer.local_platform(),
                    self.transfer.local_flags()
                )?;
                match (self.transfer.remote_platform(), self.transfer.remote_flags()) {
                    (Some(platform), Some(flags)) => {
                        writeln!(self.output, "remote: {} {:?}", platform, flags)?
                    }
                    _ => writeln!(self.output, "remote: not connected")?,
                }
            }
            Command::Connect => {
                let mut prompter = Prompter::new(&mut self.input, &mut self.output);
                self.transfer.collect_credentials(&mut prompter)?;
                self.transfer.establish_connection().await?;
                writeln!(
                    self.output,
                    "connected to {}",
                    self.transfer.credentials().server
                )?;
            }
            Command::Disconnect => {
                self.transfer.disconnect().await?;
                writeln!(self.output, "disconnected")?;
            }
            Command::History => {
                write!(self.output, "{}", self.history.render())?;
            }
            Command::Alias(AliasArgs::List) => {
                write!(self.output, "{}", self.aliases.render())?;
            }
            Command::Alias(AliasArgs::Show(name)) => match self.aliases.get(&name) {
                Some(value) => writeln!(self.output, "{}\t{}", name, value)?,
                None => writeln!(self.output, "error: no alias {}", name)?,
            },
            Command::Alias(AliasArgs::Define { name, value }) => {
                info!("Alias {} -> {}", name, value);
                self.aliases.define(name, value);
            }
            Command::Unalias(name) => {
                if !self.aliases.remove(&name) {
                    writeln!(self.output, "error: no alias {}", name)?;
                }
            }
            Command::Help => writeln!(self.output, "{}", HELP)?,
            Command::Quit => return Ok(Flow::Quit),
        }
        Ok(Flow::Continue)
    }

    async fn finish(&mut self) {
        if let Err(e) = self.transfer.disconnect().await {
            warn!("Failed to disconnect cleanly: {}", e);
        }
        if let Err(e) = self.history.flush() {
            warn!("Failed to save history: {}", e);
        }
    }

    #[cfg(test)]
    pub fn into_parts(self) -> (FileTransfer, R, W) {
        (self.transfer, self.input, self.output)
    }
}
