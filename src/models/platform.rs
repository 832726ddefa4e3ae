use std::fmt;

/// Operating system family of one end of a transfer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Platform {
    Windows,
    Linux,
    MacOs,
    Unix,
    Unknown,
}

/// One flag per platform family; Linux and macOS also count as unix
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PlatformFlags {
    pub windows: bool,
    pub linux: bool,
    pub unix: bool,
    pub macos: bool,
}

impl Platform {
    /// Platform this binary is running on
    pub fn local() -> Self {
        Self::from_os_name(std::env::consts::OS)
    }

    /// Maps Rust OS names (`std::env::consts::OS`) and `uname -s` output.
    pub fn from_os_name(name: &str) -> Self {
        let name = name.trim().to_ascii_lowercase();

        if name.starts_with("windows")
            || name.starts_with("cygwin")
            || name.starts_with("mingw")
            || name.starts_with("msys")
        {
            return Platform::Windows;
        }

        match name.as_str() {
            "linux" | "android" | "gnu/linux" => Platform::Linux,
            "macos" | "darwin" | "ios" => Platform::MacOs,
            "freebsd" | "openbsd" | "netbsd" | "dragonfly" | "dragonflybsd"
            | "solaris" | "sunos" | "illumos" | "aix" | "hp-ux" | "haiku" => {
                Platform::Unix
            }
            _ => Platform::Unknown,
        }
    }

    /// Guesses the platform from a canonical remote login directory.
    pub fn from_home_path(path: &str) -> Self {
        let trimmed = path.trim();
        let without_slash = trimmed.strip_prefix('/').unwrap_or(trimmed);
        let bytes = without_slash.as_bytes();

        if bytes.len() >= 2 && bytes[0].is_ascii_alphabetic() && bytes[1] == b':' {
            return Platform::Windows;
        }
        if trimmed.starts_with("/Users/") {
            return Platform::MacOs;
        }
        if trimmed.starts_with("/home/") || trimmed == "/root" {
            return Platform::Linux;
        }
        if trimmed.starts_with('/') {
            return Platform::Unix;
        }
        Platform::Unknown
    }

    pub fn flags(self) -> PlatformFlags {
        match self {
            Platform::Windows => {
                PlatformFlags { windows: true, ..Default::default() }
            }
            Platform::Linux => {
                PlatformFlags { linux: true, unix: true, ..Default::default() }
            }
            Platform::MacOs => {
                PlatformFlags { macos: true, unix: true, ..Default::default() }
            }
            Platform::Unix => PlatformFlags { unix: true, ..Default::default() },
            Platform::Unknown => PlatformFlags::default(),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Platform::Windows => "windows",
            Platform::Linux => "linux",
            Platform::MacOs => "macos",
            Platform::Unix => "unix",
            Platform::Unknown => "unknown",
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
