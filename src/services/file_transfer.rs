use crate::config::settings::Settings;
use crate::errors::{Result, TransferError};
use crate::models::credentials::Credentials;
use crate::models::platform::{Platform, PlatformFlags};
use crate::models::remote::{Direction, RemoteEntry, TransferReport};
use crate::services::connection::{
    self, RemoteSession, join_remote, remote_file_name,
};
use crate::services::prompt::Prompter;
use std::io::{BufRead, Write};
use std::path::{Path, PathBuf};
use std::time::Instant;
use tokio::fs;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tracing::{debug, info, warn};

// Credential fields that came from a prompt rather than settings
#[derive(Debug, Default)]
struct Prompted {
    username: bool,
    password: bool,
    server: bool,
}

/// Moves files between this machine and one remote server
pub struct FileTransfer {
    settings: Settings,
    credentials: Credentials,
    prompted: Prompted,
    file_list: Vec<RemoteEntry>,
    local_platform: Platform,
    local_flags: PlatformFlags,
    remote_platform: Option<Platform>,
    session: Option<RemoteSession>,
}

impl FileTransfer {
    pub fn new(settings: Settings) -> Self {
        let connection = &settings.connection;
        let credentials = Credentials::new(
            connection.username.clone().unwrap_or_default(),
            connection.password.clone().unwrap_or_default(),
            connection.server.clone().unwrap_or_default(),
        );

        let mut transfer = Self {
            settings,
            credentials,
            prompted: Prompted::default(),
            file_list: Vec::new(),
            local_platform: Platform::Unknown,
            local_flags: PlatformFlags::default(),
            remote_platform: None,
            session: None,
        };
        transfer.determine_platform();
        transfer
    }

    pub fn get_username<R: BufRead, W: Write>(
        &mut self,
        prompter: &mut Prompter<R, W>,
    ) -> Result<()> {
        self.credentials.username = prompter.get_username()?;
        self.prompted.username = true;
        Ok(())
    }

    pub fn get_password<R: BufRead, W: Write>(
        &mut self,
        prompter: &mut Prompter<R, W>,
    ) -> Result<()> {
        self.credentials.password = prompter.get_password()?;
        self.prompted.password = true;
        Ok(())
    }

    pub fn get_server<R: BufRead, W: Write>(
        &mut self,
        prompter: &mut Prompter<R, W>,
    ) -> Result<()> {
        self.credentials.server = prompter.get_server()?;
        self.prompted.server = true;
        Ok(())
    }

    /// Prompts only for the fields settings did not already provide.
    /// A field forgotten after a failed connection is asked for again.
    pub fn collect_credentials<R: BufRead, W: Write>(
        &mut self,
        prompter: &mut Prompter<R, W>,
    ) -> Result<()> {
        if self.credentials.username.trim().is_empty() {
            self.get_username(prompter)?;
        }
        if self.settings.connection.password.is_none() && !self.prompted.password
        {
            self.get_password(prompter)?;
        }
        if self.credentials.server.trim().is_empty() {
            self.get_server(prompter)?;
        }
        Ok(())
    }

    /// Connects with the current credentials, replacing any open session.
    pub async fn establish_connection(&mut self) -> Result<()> {
        self.credentials.validate()?;

        if let Some(previous) = self.session.take() {
            if let Err(e) = previous.close().await {
                warn!("Failed to close previous session: {}", e);
            }
        }
        self.file_list.clear();
        self.remote_platform = None;

        let session =
            match connection::connect(&self.credentials, &self.settings.connection)
                .await
            {
                Ok(session) => session,
                Err(e) => {
                    self.forget_prompted(&e);
                    return Err(e);
                }
            };
        info!(
            "Connected to {} as {}",
            session.address(),
            self.credentials.username
        );
        self.session = Some(session);

        let remote = self.detect_remote_platform().await?;
        info!("Remote platform: {}", remote);
        Ok(())
    }

    // Typed values that caused the failure are dropped so the next
    // `collect_credentials` asks for them again.
    fn forget_prompted(&mut self, error: &TransferError) {
        match error {
            TransferError::AuthRejected(_) => {
                if std::mem::take(&mut self.prompted.password) {
                    debug!("Forgetting rejected password");
                    self.credentials.password.clear();
                }
                if std::mem::take(&mut self.prompted.username) {
                    self.credentials.username.clear();
                }
            }
            TransferError::InvalidServer(_)
            | TransferError::Timeout(_)
            | TransferError::Ssh(_)
            | TransferError::Io(_) => {
                if std::mem::take(&mut self.prompted.server) {
                    debug!("Forgetting unreachable server");
                    self.credentials.server.clear();
                }
            }
            _ => {}
        }
    }

    /// Sets the local platform flags from the running OS.
    pub fn determine_platform(&mut self) -> Platform {
        self.local_platform = Platform::local();
        self.local_flags = self.local_platform.flags();
        info!("Local platform: {}", self.local_platform);
        self.local_platform
    }

    /// Asks the server for `uname -s`, falling back to its login directory.
    pub async fn detect_remote_platform(&mut self) -> Result<Platform> {
        let session = self.session()?;

        let reported = match session.exec("uname -s").await {
            Ok((Some(0), output)) => Platform::from_os_name(&output),
            Ok((status, _)) => {
                debug!("uname exited with {:?}", status);
                Platform::Unknown
            }
            Err(e) => {
                debug!("uname unavailable: {}", e);
                Platform::Unknown
            }
        };

        let platform = match reported {
            Platform::Unknown => Platform::from_home_path(session.home()),
            known => known,
        };

        self.remote_platform = Some(platform);
        Ok(platform)
    }

    /// Lists a remote directory (the working directory by default).
    pub async fn refresh_file_list(
        &mut self,
        path: Option<&str>,
    ) -> Result<&[RemoteEntry]> {
        let session = self.session()?;
        let target = session.resolve(path.unwrap_or(""));
        debug!("Listing remote directory {}", target);

        let mut entries = Vec::new();
        for entry in session.sftp().read_dir(target.as_str()).await? {
            let name = entry.file_name();
            if name == "." || name == ".." {
                continue;
            }
            let metadata = entry.metadata();
            entries.push(RemoteEntry::new(
                name,
                entry.file_type().is_dir(),
                metadata.size.unwrap_or(0),
                metadata.mtime,
            ));
        }
        entries.sort_by(RemoteEntry::listing_order);

        info!("{} entries in {}", entries.len(), target);
        self.file_list = entries;
        Ok(&self.file_list)
    }

    pub async fn change_dir(&mut self, path: &str) -> Result<&str> {
        let target = self.session()?.resolve(path);
        self.enter_dir(target).await
    }

    /// Returns to the directory the server placed us in at login.
    pub async fn change_to_home(&mut self) -> Result<&str> {
        let home = self.session()?.home().to_string();
        self.enter_dir(home).await
    }

    /// Swaps back to the directory before the last change.
    pub async fn change_to_previous(&mut self) -> Result<&str> {
        let previous = self
            .session()?
            .previous()
            .ok_or(TransferError::NoPreviousDirectory)?
            .to_string();
        self.enter_dir(previous).await
    }

    async fn enter_dir(&mut self, target: String) -> Result<&str> {
        let session = self.session.as_mut().ok_or(TransferError::NotConnected)?;

        let canonical = session.sftp().canonicalize(target.as_str()).await?;
        let metadata = session.sftp().metadata(canonical.as_str()).await?;
        if !metadata.is_dir() {
            return Err(TransferError::NotADirectory(canonical));
        }

        session.set_cwd(canonical);
        Ok(session.cwd())
    }

    /// Copies a remote file here. `local` may be a file path or a directory.
    pub async fn download(
        &self,
        remote: &str,
        local: Option<&str>,
    ) -> Result<TransferReport> {
        let session = self.session()?;
        let source = session.resolve(remote);

        let metadata = session.sftp().metadata(source.as_str()).await?;
        if metadata.is_dir() {
            return Err(TransferError::NotAFile(source));
        }
        let file_name = remote_file_name(&source)
            .ok_or_else(|| TransferError::NotAFile(source.clone()))?;
        let destination = local_destination(
            local,
            &self.settings.transfer.local_dir,
            file_name,
        )
        .await;

        info!("Downloading {} to {}", source, destination.display());
        let started = Instant::now();

        let mut reader = session.sftp().open(source.as_str()).await?;
        let bytes = copy_into_place(
            &mut reader,
            &destination,
            self.settings.transfer.effective_chunk_size(),
        )
        .await?;

        let report = TransferReport {
            direction: Direction::Download,
            source,
            destination: destination.display().to_string(),
            bytes,
            elapsed: started.elapsed(),
        };
        info!("{}", report);
        Ok(report)
    }

    /// Copies a local file to the server. `remote` may be a file or directory.
    pub async fn upload(
        &self,
        local: &str,
        remote: Option<&str>,
    ) -> Result<TransferReport> {
        let session = self.session()?;
        let local_path = Path::new(local);

        let metadata = fs::metadata(local_path).await?;
        if !metadata.is_file() {
            return Err(TransferError::NotAFile(local.to_string()));
        }
        let file_name = local_path
            .file_name()
            .map(|name| name.to_string_lossy().to_string())
            .ok_or_else(|| TransferError::NotAFile(local.to_string()))?;

        let destination = match remote {
            None => session.resolve(&file_name),
            Some(remote) => {
                let target = session.resolve(remote);
                let is_dir = session
                    .sftp()
                    .metadata(target.as_str())
                    .await
                    .map(|m| m.is_dir())
                    .unwrap_or(false);
                if is_dir { join_remote(&target, &file_name) } else { target }
            }
        };

        info!("Uploading {} to {}", local, destination);
        let started = Instant::now();

        let mut reader = fs::File::open(local_path).await?;
        let mut writer = session.sftp().create(destination.as_str()).await?;
        let bytes = copy_chunked(
            &mut reader,
            &mut writer,
            self.settings.transfer.effective_chunk_size(),
        )
        .await?;
        writer.shutdown().await?;

        let report = TransferReport {
            direction: Direction::Upload,
            source: local.to_string(),
            destination,
            bytes,
            elapsed: started.elapsed(),
        };
        info!("{}", report);
        Ok(report)
    }

    pub async fn disconnect(&mut self) -> Result<()> {
        self.file_list.clear();
        self.remote_platform = None;
        match self.session.take() {
            Some(session) => session.close().await,
            None => Ok(()),
        }
    }

    pub fn is_connected(&self) -> bool {
        self.session.is_some()
    }

    pub fn credentials(&self) -> &Credentials {
        &self.credentials
    }

    pub fn file_list(&self) -> &[RemoteEntry] {
        &self.file_list
    }

    pub fn local_platform(&self) -> Platform {
        self.local_platform
    }

    pub fn local_flags(&self) -> PlatformFlags {
        self.local_flags
    }

    pub fn remote_platform(&self) -> Option<Platform> {
        self.remote_platform
    }

    pub fn remote_flags(&self) -> Option<PlatformFlags> {
        self.remote_platform.map(Platform::flags)
    }

    pub fn working_dir(&self) -> Option<&str> {
        self.session.as_ref().map(RemoteSession::cwd)
    }

    fn session(&self) -> Result<&RemoteSession> {
        self.session.as_ref().ok_or(TransferError::NotConnected)
    }
}

/// Picks the local target: default directory, an explicit directory, or a file.
async fn local_destination(
    local: Option<&str>,
    default_dir: &str,
    file_name: &str,
) -> PathBuf {
    match local {
        None => Path::new(default_dir).join(file_name),
        Some(path) => {
            let path = PathBuf::from(path);
            let is_dir = fs::metadata(&path)
                .await
                .map(|m| m.is_dir())
                .unwrap_or(false);
            if is_dir { path.join(file_name) } else { path }
        }
    }
}

/// Downloads land in `<destination>.part` first and are renamed over
/// `destination` only when complete. A failed copy removes the part file.
pub async fn copy_into_place<R>(
    reader: &mut R,
    destination: &Path,
    chunk_size: usize,
) -> std::io::Result<u64>
where
    R: AsyncRead + Unpin + ?Sized,
{
    let partial = partial_path(destination);

    let result: std::io::Result<u64> = async {
        let mut writer = fs::File::create(&partial).await?;
        let bytes = copy_chunked(reader, &mut writer, chunk_size).await?;
        drop(writer);
        fs::rename(&partial, destination).await?;
        Ok(bytes)
    }
    .await;

    if let Err(e) = &result {
        warn!("Download into {} failed: {}", destination.display(), e);
        if let Err(e) = fs::remove_file(&partial).await {
            debug!("No part file to remove at {}: {}", partial.display(), e);
        }
    }
    result
}

fn partial_path(destination: &Path) -> PathBuf {
    let mut name = destination.as_os_str().to_os_string();
    name.push(".part");
    PathBuf::from(name)
}

/// Streams `reader` into `writer` through a buffer of `chunk_size` bytes.
pub async fn copy_chunked<R, W>(
    reader: &mut R,
    writer: &mut W,
    chunk_size: usize,
) -> std::io::Result<u64>
where
    R: AsyncRead + Unpin + ?Sized,
    W: AsyncWrite + Unpin + ?Sized,
{
    let mut buffer = vec![0u8; chunk_size.max(1)];
    let mut total = 0u64;

    loop {
        let n = reader.read(&mut buffer).await?;
        if n == 0 {
            break;
        }
        writer.write_all(&buffer[..n]).await?;
        total += n as u64;
        debug!("Copied {} bytes ({} total)", n, total);
    }

    writer.flush().await?;
    Ok(total)
}
