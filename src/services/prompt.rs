use crate::errors::{Result, TransferError};
use std::io::{BufRead, Write};

/// Reads answers to interactive questions from any line-based input
pub struct Prompter<R, W> {
    input: R,
    output: W,
}

impl<R: BufRead, W: Write> Prompter<R, W> {
    pub fn new(input: R, output: W) -> Self {
        Self { input, output }
    }

    pub fn get_username(&mut self) -> Result<String> {
        Ok(self.ask("Username", "username")?.trim().to_string())
    }

    // The password is kept exactly as typed, only the line ending goes
    pub fn get_password(&mut self) -> Result<String> {
        self.ask("Password", "password")
    }

    pub fn get_server(&mut self) -> Result<String> {
        Ok(self.ask("Server", "server")?.trim().to_string())
    }

    /// Writes `label: ` and reads one line without its line ending.
    pub fn ask(&mut self, label: &str, field: &'static str) -> Result<String> {
        write!(self.output, "{}: ", label)?;
        self.output.flush()?;

        let mut line = String::new();
        if self.input.read_line(&mut line)? == 0 {
            return Err(TransferError::InputClosed(field));
        }

        if line.ends_with('\n') {
            line.pop();
            if line.ends_with('\r') {
                line.pop();
            }
        }
        Ok(line)
    }

    #[cfg(test)]
    pub fn into_inner(self) -> (R, W) {
        (self.input, self.output)
    }
}
