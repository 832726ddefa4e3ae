use std::fs::OpenOptions;
use std::io::{self, Write};
use std::path::PathBuf;
use tracing::debug;

/// Recent shell lines, spilled to a file whenever the buffer fills up
pub struct History {
    entries: Vec<String>,
    limit: usize,
    file: Option<PathBuf>,
}

impl History {
    pub fn new(limit: usize, file: Option<PathBuf>) -> Self {
        Self { entries: Vec::new(), limit: limit.max(1), file }
    }

    /// Records a line. A full buffer is flushed first, or without a
    /// history file the oldest line is dropped. The line is kept even when
    /// the flush fails; the flush error is still returned.
    pub fn push(&mut self, line: &str) -> io::Result<()> {
        let mut result = Ok(());
        if self.entries.len() >= self.limit {
            if self.file.is_some() {
                result = self.flush();
            }
            if self.entries.len() >= self.limit {
                self.entries.remove(0);
            }
        }
        self.entries.push(line.to_string());
        result
    }

    /// Appends the buffer to the history file as `N<TAB>line` and clears it.
    pub fn flush(&mut self) -> io::Result<()> {
        let Some(path) = &self.file else {
            return Ok(());
        };
        if self.entries.is_empty() {
            return Ok(());
        }

        let mut file = OpenOptions::new().create(true).append(true).open(path)?;
        file.write_all(self.render().as_bytes())?;
        debug!("Wrote {} history lines to {}", self.entries.len(), path.display());
        self.entries.clear();
        Ok(())
    }

    pub fn render(&self) -> String {
        self.entries
            .iter()
            .enumerate()
            .map(|(i, line)| format!("{}\t{}\n", i + 1, line))
            .collect()
    }

    #[cfg(test)]
    pub fn entries(&self) -> &[String] {
        &self.entries
    }
}
