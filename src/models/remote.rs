use chrono::{DateTime, Utc};
use std::cmp::Ordering;
use std::fmt;
use std::time::Duration;

// One row of a remote directory listing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteEntry {
    pub name: String,
    pub is_dir: bool,
    pub size: u64,
    pub modified: Option<DateTime<Utc>>,
}

impl RemoteEntry {
    pub fn new(
        name: String,
        is_dir: bool,
        size: u64,
        mtime: Option<u32>,
    ) -> Self {
        let modified =
            mtime.and_then(|secs| DateTime::from_timestamp(secs as i64, 0));
        Self { name, is_dir, size, modified }
    }

    /// Directories first, then by name
    pub fn listing_order(a: &Self, b: &Self) -> Ordering {
        b.is_dir.cmp(&a.is_dir).then_with(|| a.name.cmp(&b.name))
    }
}

impl fmt::Display for RemoteEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = if self.is_dir { 'd' } else { '-' };
        let modified = self
            .modified
            .map(|m| m.format("%Y-%m-%d %H:%M").to_string())
            .unwrap_or_else(|| "-".repeat(16));
        write!(f, "{} {:>12} {} {}", kind, self.size, modified, self.name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Upload,
    Download,
}

/// Outcome of a completed transfer
#[derive(Debug, Clone)]
pub struct TransferReport {
    pub direction: Direction,
    pub source: String,
    pub destination: String,
    pub bytes: u64,
    pub elapsed: Duration,
}

impl fmt::Display for TransferReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let verb = match self.direction {
            Direction::Upload => "uploaded",
            Direction::Download => "downloaded",
        };
        write!(
            f,
            "{} {} -> {} ({} bytes in {:.2}s)",
            verb,
            self.source,
            self.destination,
            self.bytes,
            self.elapsed.as_secs_f64()
        )
    }
}
