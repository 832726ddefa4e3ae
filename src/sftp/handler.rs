use russh_sftp::protocol::{
    Attrs, Data, File, FileAttributes, Handle, Name, OpenFlags, Status,
    StatusCode, Version,
};
use std::collections::HashMap;
use std::os::unix::prelude::{MetadataExt, PermissionsExt};
use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;
use tokio::fs;
use tokio::io::{AsyncReadExt, AsyncSeekExt, AsyncWriteExt, SeekFrom};
use tracing::{debug, warn};

/// SFTP subsystem serving a directory tree rooted at `/`
pub struct LoopbackSftp {
    /// Protocol version negotiated with the client
    version: Option<u32>,
    /// Real directory shown as `/`
    root_dir: PathBuf,
    /// Open file and directory handles by id
    handles: HashMap<String, OpenHandle>,
    next_handle_id: u64,
}

/// What an SFTP handle refers to
enum OpenHandle {
    File(fs::File),
    // remaining listing, drained on the first readdir
    Dir(Option<Vec<File>>),
}

/// Collapses `.`/`..` segments; `..` never climbs above `/`.
pub fn normalize_virtual(path: &str) -> String {
    let mut parts: Vec<&str> = Vec::new();
    for segment in path.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                parts.pop();
            }
            other => parts.push(other),
        }
    }
    format!("/{}", parts.join("/"))
}

impl LoopbackSftp {
    /// Creates a subsystem serving `root_dir`
    pub fn new(root_dir: PathBuf) -> Self {
        Self { version: None, root_dir, handles: HashMap::new(), next_handle_id: 1 }
    }

    /// Maps a client path onto the root directory
    fn real_path(&self, path: &str) -> PathBuf {
        let virtual_path = normalize_virtual(path);
        self.root_dir.join(virtual_path.trim_start_matches('/'))
    }

    /// Stores a handle under a fresh id
    fn insert_handle(&mut self, handle: OpenHandle) -> String {
        let id = format!("h{}", self.next_handle_id);
        self.next_handle_id += 1;
        self.handles.insert(id.clone(), handle);
        id
    }

    /// Success status for `id`
    fn ok(id: u32) -> Status {
        Status {
            id,
            status_code: StatusCode::Ok,
            error_message: "Ok".to_string(),
            language_tag: "en-US".to_string(),
        }
    }
}

/// SFTP attributes for local metadata
fn attributes(metadata: &std::fs::Metadata) -> FileAttributes {
    let seconds = |time: std::io::Result<std::time::SystemTime>| {
        time.ok()
            .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
            .map(|d| d.as_secs() as u32)
    };

    FileAttributes {
        size: Some(metadata.len()),
        uid: Some(metadata.uid()),
        gid: Some(metadata.gid()),
        permissions: Some(metadata.permissions().mode()),
        atime: seconds(metadata.accessed()),
        mtime: seconds(metadata.modified()),
        ..Default::default()
    }
}

async fn stat_path(path: &Path) -> Result<FileAttributes, StatusCode> {
    fs::metadata(path)
        .await
        .map(|m| attributes(&m))
        .map_err(|_| StatusCode::NoSuchFile)
}

impl russh_sftp::server::Handler for LoopbackSftp {
    type Error = StatusCode;

    /// Reply for operations this server lacks
    fn unimplemented(&self) -> Self::Error {
        StatusCode::OpUnsupported
    }

    /// Negotiates the protocol version; only once per session
    async fn init(
        &mut self,
        version: u32,
        _extensions: HashMap<String, String>,
    ) -> Result<Version, Self::Error> {
        if self.version.is_some() {
            return Err(StatusCode::ConnectionLost);
        }
        self.version = Some(version);
        Ok(Version::new())
    }

    /// Opens a file with the client's flags
    async fn open(
        &mut self,
        id: u32,
        filename: String,
        pflags: OpenFlags,
        _attrs: FileAttributes,
    ) -> Result<Handle, Self::Error> {
        let path = self.real_path(&filename);
        debug!("Loopback open {} ({:?})", path.display(), pflags);

        let file = fs::OpenOptions::new()
            .read(pflags.contains(OpenFlags::READ))
            .write(pflags.contains(OpenFlags::WRITE))
            .create(pflags.contains(OpenFlags::CREATE))
            .truncate(pflags.contains(OpenFlags::TRUNCATE))
            .append(pflags.contains(OpenFlags::APPEND))
            .open(&path)
            .await
            .map_err(|e| {
                warn!("Loopback open failed for {}: {}", path.display(), e);
                StatusCode::NoSuchFile
            })?;

        let handle = self.insert_handle(OpenHandle::File(file));
        Ok(Handle { id, handle })
    }

    /// Drops a file or directory handle
    async fn close(
        &mut self,
        id: u32,
        handle: String,
    ) -> Result<Status, Self::Error> {
        self.handles.remove(&handle);
        Ok(Self::ok(id))
    }

    /// Reads up to `len` bytes at `offset`
    async fn read(
        &mut self,
        id: u32,
        handle: String,
        offset: u64,
        len: u32,
    ) -> Result<Data, Self::Error> {
        let Some(OpenHandle::File(file)) = self.handles.get_mut(&handle) else {
            return Err(StatusCode::Failure);
        };

        file.seek(SeekFrom::Start(offset))
            .await
            .map_err(|_| StatusCode::Failure)?;
        let mut buffer = vec![0u8; len as usize];
        let n = file.read(&mut buffer).await.map_err(|_| StatusCode::Failure)?;
        if n == 0 && len > 0 {
            return Err(StatusCode::Eof);
        }

        buffer.truncate(n);
        Ok(Data { id, data: buffer })
    }

    /// Writes `data` at `offset`
    async fn write(
        &mut self,
        id: u32,
        handle: String,
        offset: u64,
        data: Vec<u8>,
    ) -> Result<Status, Self::Error> {
        let Some(OpenHandle::File(file)) = self.handles.get_mut(&handle) else {
            return Err(StatusCode::Failure);
        };

        file.seek(SeekFrom::Start(offset))
            .await
            .map_err(|_| StatusCode::Failure)?;
        file.write_all(&data).await.map_err(|_| StatusCode::Failure)?;
        file.flush().await.map_err(|_| StatusCode::Failure)?;
        Ok(Self::ok(id))
    }

    /// Snapshots a directory listing behind a new handle
    async fn opendir(
        &mut self,
        id: u32,
        path: String,
    ) -> Result<Handle, Self::Error> {
        let dir = self.real_path(&path);
        let mut entries =
            fs::read_dir(&dir).await.map_err(|_| StatusCode::NoSuchFile)?;

        let mut files = vec![
            File::new(".".to_string(), FileAttributes::default()),
            File::new("..".to_string(), FileAttributes::default()),
        ];
        while let Some(entry) =
            entries.next_entry().await.map_err(|_| StatusCode::Failure)?
        {
            let Ok(name) = entry.file_name().into_string() else {
                continue;
            };
            let attrs = stat_path(&entry.path()).await?;
            files.push(File::new(name, attrs));
        }

        let handle = self.insert_handle(OpenHandle::Dir(Some(files)));
        Ok(Handle { id, handle })
    }

    /// Returns the whole listing once, then EOF
    async fn readdir(
        &mut self,
        id: u32,
        handle: String,
    ) -> Result<Name, Self::Error> {
        match self.handles.get_mut(&handle) {
            Some(OpenHandle::Dir(listing)) => match listing.take() {
                Some(files) => Ok(Name { id, files }),
                None => Err(StatusCode::Eof),
            },
            _ => Err(StatusCode::Failure),
        }
    }

    /// Canonical virtual path
    async fn realpath(
        &mut self,
        id: u32,
        path: String,
    ) -> Result<Name, Self::Error> {
        let resolved = normalize_virtual(&path);
        Ok(Name { id, files: vec![File::dummy(&resolved)] })
    }

    /// Attributes of a path
    async fn stat(&mut self, id: u32, path: String) -> Result<Attrs, Self::Error> {
        let attrs = stat_path(&self.real_path(&path)).await?;
        Ok(Attrs { id, attrs })
    }

    /// Attributes of a path without following links
    async fn lstat(
        &mut self,
        id: u32,
        path: String,
    ) -> Result<Attrs, Self::Error> {
        // no symlinks in the fixtures
        let attrs = stat_path(&self.real_path(&path)).await?;
        Ok(Attrs { id, attrs })
    }

    /// Attributes of an open file
    async fn fstat(
        &mut self,
        id: u32,
        handle: String,
    ) -> Result<Attrs, Self::Error> {
        let Some(OpenHandle::File(file)) = self.handles.get(&handle) else {
            return Err(StatusCode::Failure);
        };
        let metadata = file.metadata().await.map_err(|_| StatusCode::Failure)?;
        Ok(Attrs { id, attrs: attributes(&metadata) })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_virtual() {
        assert_eq!(normalize_virtual("."), "/");
        assert_eq!(normalize_virtual(""), "/");
        assert_eq!(normalize_virtual("/docs/../a.txt"), "/a.txt");
        assert_eq!(normalize_virtual("docs/./readme.md"), "/docs/readme.md");
        assert_eq!(normalize_virtual("/../../etc/passwd"), "/etc/passwd");
    }
}
