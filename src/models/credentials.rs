use crate::errors::{Result, TransferError};
use std::fmt;

// Login details gathered from the user or from settings
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub password: String,
    pub server: String,
}

impl Credentials {
    pub fn new(username: String, password: String, server: String) -> Self {
        Self { username, password, server }
    }

    /// Username and server are required; an empty password is allowed.
    pub fn validate(&self) -> Result<()> {
        if self.username.trim().is_empty() {
            return Err(TransferError::MissingField("username"));
        }
        if self.server.trim().is_empty() {
            return Err(TransferError::MissingField("server"));
        }
        Ok(())
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("server", &self.server)
            .finish()
    }
}

/// Host and port of the remote machine
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerAddress {
    pub host: String,
    pub port: u16,
}

impl ServerAddress {
    /// Accepts `host`, `host:port`, `[v6]`, `[v6]:port` or a bare IPv6 literal.
    pub fn parse(server: &str, default_port: u16) -> Result<Self> {
        let server = server.trim();
        if server.is_empty() {
            return Err(TransferError::MissingField("server"));
        }

        let (host, port) = if let Some(rest) = server.strip_prefix('[') {
            let (host, tail) = rest
                .split_once(']')
                .ok_or_else(|| TransferError::InvalidServer(server.to_string()))?;
            match tail {
                "" => (host, None),
                _ => {
                    let port = tail.strip_prefix(':').ok_or_else(|| {
                        TransferError::InvalidServer(server.to_string())
                    })?;
                    (host, Some(port))
                }
            }
        } else if server.matches(':').count() > 1 {
            // bare IPv6 literal, no port
            (server, None)
        } else {
            match server.split_once(':') {
                Some((host, port)) => (host, Some(port)),
                None => (server, None),
            }
        };

        if host.is_empty() {
            return Err(TransferError::InvalidServer(server.to_string()));
        }

        let port = match port {
            Some(port) => match port.parse::<u16>() {
                Ok(port) if port != 0 => port,
                _ => return Err(TransferError::InvalidServer(server.to_string())),
            },
            None => default_port,
        };

        Ok(Self { host: host.to_string(), port })
    }
}

impl fmt::Display for ServerAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.host.contains(':') {
            write!(f, "[{}]:{}", self.host, self.port)
        } else {
            write!(f, "{}:{}", self.host, self.port)
        }
    }
}
