use crate::config::settings::ConnectionSettings;
use crate::errors::{Result, TransferError};
use crate::models::credentials::{Credentials, ServerAddress};
use russh::client::{self, Handle};
use russh::keys::ssh_key::{self, HashAlg};
use russh::{ChannelMsg, Disconnect};
use russh_sftp::client::SftpSession;
use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::timeout;
use tracing::{debug, info, warn};

/// russh client callbacks: verifies the server host key
pub struct ClientHandler {
    expected_fingerprint: Option<String>,
    // fingerprint of a key that failed verification
    rejected_key: Arc<Mutex<Option<String>>>,
}

impl client::Handler for ClientHandler {
    type Error = russh::Error;

    async fn check_server_key(
        &mut self,
        server_public_key: &ssh_key::PublicKey,
    ) -> std::result::Result<bool, Self::Error> {
        let actual = server_public_key.fingerprint(HashAlg::Sha256).to_string();
        info!("Server host key fingerprint: {}", actual);

        match &self.expected_fingerprint {
            Some(expected) if expected.trim() != actual => {
                warn!("Host key does not match the configured fingerprint");
                if let Ok(mut rejected) = self.rejected_key.lock() {
                    *rejected = Some(actual);
                }
                Ok(false)
            }
            _ => Ok(true),
        }
    }
}

/// An authenticated SSH connection with an open SFTP subsystem
pub struct RemoteSession {
    handle: Handle<ClientHandler>,
    sftp: SftpSession,
    address: ServerAddress,
    home: String,
    cwd: String,
    previous: Option<String>,
    // bounds every round trip after login
    wait: Duration,
}

/// Connects to `credentials.server`, logs in with the password and opens SFTP.
pub async fn connect(
    credentials: &Credentials,
    settings: &ConnectionSettings,
) -> Result<RemoteSession> {
    credentials.validate()?;
    let address = ServerAddress::parse(&credentials.server, settings.port)?;
    let rejected_key = Arc::new(Mutex::new(None));

    let result =
        open_session(credentials, settings, &address, rejected_key.clone())
            .await;

    // A rejected host key surfaces from russh as a generic error
    if result.is_err()
        && let Ok(mut rejected) = rejected_key.lock()
        && let Some(actual) = rejected.take()
    {
        return Err(TransferError::HostKeyMismatch {
            expected: settings
                .host_fingerprint
                .clone()
                .unwrap_or_default()
                .trim()
                .to_string(),
            actual,
        });
    }

    result
}

async fn open_session(
    credentials: &Credentials,
    settings: &ConnectionSettings,
    address: &ServerAddress,
    rejected_key: Arc<Mutex<Option<String>>>,
) -> Result<RemoteSession> {
    let wait = Duration::from_secs(settings.connect_timeout_secs.max(1));
    let config = Arc::new(client::Config::default());
    let handler = ClientHandler {
        expected_fingerprint: settings.host_fingerprint.clone(),
        rejected_key,
    };

    info!("Connecting to {} as {}", address, credentials.username);

    let mut handle = within(
        wait,
        address,
        client::connect(config, (address.host.as_str(), address.port), handler),
    )
    .await?;

    let auth = within(
        wait,
        address,
        handle.authenticate_password(
            credentials.username.clone(),
            credentials.password.clone(),
        ),
    )
    .await?;

    if !auth.success() {
        warn!("Password rejected for user {}", credentials.username);
        return Err(TransferError::AuthRejected(credentials.username.clone()));
    }
    debug!("Authenticated as {}", credentials.username);

    let channel = within(wait, address, handle.channel_open_session()).await?;
    within(wait, address, channel.request_subsystem(true, "sftp")).await?;
    let sftp =
        within(wait, address, SftpSession::new(channel.into_stream())).await?;

    let home = within(wait, address, sftp.canonicalize(".")).await?;
    info!("SFTP session ready, remote directory: {}", home);

    Ok(RemoteSession {
        handle,
        sftp,
        address: address.clone(),
        cwd: home.clone(),
        home,
        previous: None,
        wait,
    })
}

/// Runs one protocol step, failing with `Timeout` once `wait` has passed.
async fn within<T, E, F>(
    wait: Duration,
    address: &ServerAddress,
    step: F,
) -> Result<T>
where
    F: Future<Output = std::result::Result<T, E>>,
    TransferError: From<E>,
{
    match timeout(wait, step).await {
        Ok(result) => Ok(result?),
        Err(_) => {
            warn!("No answer from {} within {:?}", address, wait);
            Err(TransferError::Timeout(address.to_string()))
        }
    }
}

impl RemoteSession {
    pub fn sftp(&self) -> &SftpSession {
        &self.sftp
    }

    pub fn address(&self) -> &ServerAddress {
        &self.address
    }

    /// Directory the server placed us in at login
    pub fn home(&self) -> &str {
        &self.home
    }

    pub fn cwd(&self) -> &str {
        &self.cwd
    }

    /// Directory before the last `set_cwd`
    pub fn previous(&self) -> Option<&str> {
        self.previous.as_deref()
    }

    pub fn set_cwd(&mut self, cwd: String) {
        debug!("Remote directory is now {}", cwd);
        self.previous = Some(std::mem::replace(&mut self.cwd, cwd));
    }

    /// Absolute paths pass through, `~` means the login directory, and
    /// anything else hangs off the working directory.
    pub fn resolve(&self, path: &str) -> String {
        let path = path.trim();
        if path.is_empty() || path == "." {
            self.cwd.clone()
        } else if path == "~" {
            self.home.clone()
        } else if let Some(rest) = path.strip_prefix("~/") {
            join_remote(&self.home, rest)
        } else if path.starts_with('/') {
            path.to_string()
        } else {
            join_remote(&self.cwd, path)
        }
    }

    /// Runs one command on its own channel, returning exit status and stdout.
    pub async fn exec(&self, command: &str) -> Result<(Option<u32>, String)> {
        within(self.wait, &self.address, async {
            let mut channel = self.handle.channel_open_session().await?;
            channel.exec(true, command).await?;

            let mut stdout = Vec::new();
            let mut status = None;
            while let Some(msg) = channel.wait().await {
                match msg {
                    ChannelMsg::Data { ref data } => stdout.extend_from_slice(data),
                    ChannelMsg::ExitStatus { exit_status } => {
                        status = Some(exit_status)
                    }
                    ChannelMsg::Close => break,
                    _ => {}
                }
            }

            debug!("`{}` exited with {:?}", command, status);
            Ok::<_, TransferError>((
                status,
                String::from_utf8_lossy(&stdout).into_owned(),
            ))
        })
        .await
    }

    pub async fn close(self) -> Result<()> {
        info!("Disconnecting from {}", self.address);
        self.handle
            .disconnect(Disconnect::ByApplication, "", "English")
            .await?;
        Ok(())
    }
}

/// Joins remote path segments; SFTP always separates with `/`.
pub fn join_remote(base: &str, name: &str) -> String {
    if base.ends_with('/') {
        format!("{}{}", base, name)
    } else {
        format!("{}/{}", base, name)
    }
}

/// Last component of a remote path
pub fn remote_file_name(path: &str) -> Option<&str> {
    path.trim_end_matches('/')
        .rsplit('/')
        .next()
        .filter(|name| !name.is_empty())
}
