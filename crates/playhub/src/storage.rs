//! On-disk area for uploaded artifact payloads.
//!
//! Layout: `<root>/<artifact_id>/<filename>`, exactly one payload per
//! artifact. An upload is written to a hidden `.part` file next to the
//! final one and renamed into place once every byte has arrived; files
//! starting with `.` are never served.

use std::io;
use std::path::{Path, PathBuf};

use playhub_transport::{TcpConnection, TransportError};
use tokio::fs;

use crate::StorageError;

/// The payload currently stored for an artifact.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredPayload {
    pub path: PathBuf,
    pub filename: String,
    pub size: u64,
}

/// Handle to the payload directory.
#[derive(Debug, Clone)]
pub struct ArtifactStorage {
    root: PathBuf,
}

impl ArtifactStorage {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Reduces a client-supplied file name to its final path component.
    ///
    /// # Errors
    /// [`StorageError::InvalidName`] if nothing usable is left.
    pub fn file_name(name: &str) -> Result<String, StorageError> {
        let last = Path::new(name)
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or_default();
        if last.is_empty() || last.starts_with('.') {
            return Err(StorageError::InvalidName(name.to_string()));
        }
        Ok(last.to_string())
    }

    fn artifact_dir(&self, artifact_id: &str) -> Result<PathBuf, StorageError> {
        let plain = !artifact_id.is_empty()
            && artifact_id != ".."
            && artifact_id != "."
            && !artifact_id.contains(['/', '\\']);
        if !plain {
            return Err(StorageError::InvalidName(artifact_id.to_string()));
        }
        Ok(self.root.join(artifact_id))
    }

    /// Receives exactly `size` raw bytes from `conn` and stores them as the
    /// artifact's payload, replacing whatever was there.
    ///
    /// If the file cannot be written the bytes are still drained, so the
    /// connection stays on a frame boundary and the error can be reported.
    ///
    /// # Errors
    /// - [`StorageError::Io`] if the payload could not be written (the
    ///   connection is still usable)
    /// - [`StorageError::Transport`] if the transfer broke off
    pub async fn receive(
        &self,
        conn: &TcpConnection,
        artifact_id: &str,
        filename: &str,
        size: u64,
    ) -> Result<StoredPayload, StorageError> {
        let filename = Self::file_name(filename)?;
        let dir = self.artifact_dir(artifact_id)?;
        let part = dir.join(format!(".{filename}.part"));

        let mut file = match open_part(&dir, &part).await {
            Ok(file) => file,
            Err(e) => {
                tracing::warn!(path = %part.display(), error = %e, "cannot stage upload, draining");
                conn.recv_raw(&mut tokio::io::sink(), size).await?;
                return Err(e.into());
            }
        };

        let received = conn.recv_raw(&mut file, size).await;
        let synced = match received {
            Ok(()) => file.sync_all().await,
            Err(TransportError::SinkFailed(e)) => Err(e),
            Err(e) => {
                drop(file);
                let _ = fs::remove_file(&part).await;
                return Err(e.into());
            }
        };
        drop(file);
        if let Err(e) = synced {
            let _ = fs::remove_file(&part).await;
            return Err(e.into());
        }

        let path = dir.join(&filename);
        fs::rename(&part, &path).await?;
        remove_payloads(&dir, &path).await?;
        tracing::info!(artifact_id, path = %path.display(), size, "payload stored");
        Ok(StoredPayload {
            path,
            filename,
            size,
        })
    }

    /// The artifact's payload, if one was uploaded.
    pub async fn locate(&self, artifact_id: &str) -> Result<Option<StoredPayload>, StorageError> {
        let dir = self.artifact_dir(artifact_id)?;
        let mut entries = match fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let mut found: Option<StoredPayload> = None;
        while let Some(entry) = entries.next_entry().await? {
            let Some(name) = entry.file_name().to_str().map(str::to_owned) else {
                continue;
            };
            if name.starts_with('.') {
                continue;
            }
            let meta = match entry.metadata().await {
                Ok(meta) => meta,
                // Replaced by a concurrent upload.
                Err(e) if e.kind() == io::ErrorKind::NotFound => continue,
                Err(e) => return Err(e.into()),
            };
            if !meta.is_file() {
                continue;
            }
            // Normally there is exactly one; pick deterministically otherwise.
            if found.as_ref().is_none_or(|f| name < f.filename) {
                found = Some(StoredPayload {
                    path: entry.path(),
                    filename: name,
                    size: meta.len(),
                });
            }
        }
        Ok(found)
    }

    /// Opens the artifact's payload for sending.
    ///
    /// The size comes from the open handle, so it stays correct even if a
    /// new upload replaces or removes the file afterwards. A payload that
    /// disappears between listing and opening is looked up again, as is a
    /// listing that raced a replacement and came back empty.
    pub async fn open(&self, artifact_id: &str) -> Result<Option<PayloadReader>, StorageError> {
        let mut attempts = 0;
        loop {
            let payload = match self.locate(artifact_id).await? {
                Some(payload) => payload,
                None if attempts < OPEN_ATTEMPTS => {
                    attempts += 1;
                    continue;
                }
                None => return Ok(None),
            };
            match fs::File::open(&payload.path).await {
                Ok(file) => {
                    let size = file.metadata().await?.len();
                    return Ok(Some(PayloadReader {
                        filename: payload.filename,
                        size,
                        file,
                    }));
                }
                Err(e) if e.kind() == io::ErrorKind::NotFound && attempts < OPEN_ATTEMPTS => {
                    attempts += 1;
                    tracing::debug!(artifact_id, path = %payload.path.display(), "payload replaced while opening");
                }
                Err(e) => return Err(e.into()),
            }
        }
    }
}

const OPEN_ATTEMPTS: usize = 3;

/// An opened payload, ready to stream.
#[derive(Debug)]
pub struct PayloadReader {
    pub filename: String,
    pub size: u64,
    file: fs::File,
}

impl PayloadReader {
    /// Streams the payload to `conn` as raw bytes. The caller must have
    /// announced `self.size` first.
    pub async fn send(mut self, conn: &TcpConnection) -> Result<(), TransportError> {
        conn.send_raw(&mut self.file, self.size).await
    }
}

async fn open_part(dir: &Path, part: &Path) -> io::Result<fs::File> {
    fs::create_dir_all(dir).await?;
    fs::File::create(part).await
}

/// Deletes every payload in `dir` except `keep`. Hidden files belong to
/// uploads still in flight and are left alone.
async fn remove_payloads(dir: &Path, keep: &Path) -> io::Result<()> {
    let mut entries = fs::read_dir(dir).await?;
    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        if path == keep || entry.file_name().to_string_lossy().starts_with('.') {
            continue;
        }
        if entry.metadata().await?.is_file() {
            fs::remove_file(&path).await?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_name_keeps_last_component() {
        assert_eq!(ArtifactStorage::file_name("game.py").unwrap(), "game.py");
        assert_eq!(ArtifactStorage::file_name("a/b/game.py").unwrap(), "game.py");
        assert_eq!(ArtifactStorage::file_name("../../etc/passwd").unwrap(), "passwd");
    }

    #[test]
    fn test_file_name_rejects_unusable() {
        for bad in ["", "..", "/", ".hidden", "dir/.."] {
            assert!(
                matches!(ArtifactStorage::file_name(bad), Err(StorageError::InvalidName(_))),
                "{bad:?} should be rejected"
            );
        }
    }

    #[tokio::test]
    async fn test_locate_missing_artifact_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let storage = ArtifactStorage::new(dir.path());
        assert_eq!(storage.locate("1").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_locate_skips_partial_uploads() {
        let dir = tempfile::tempdir().unwrap();
        let storage = ArtifactStorage::new(dir.path());
        let artifact = dir.path().join("3");
        std::fs::create_dir_all(&artifact).unwrap();
        std::fs::write(artifact.join(".next.bin.part"), b"partial").unwrap();
        std::fs::write(artifact.join("game.bin"), b"0123456789").unwrap();

        let found = storage.locate("3").await.unwrap().unwrap();
        assert_eq!(found.filename, "game.bin");
        assert_eq!(found.size, 10);
    }

    #[tokio::test]
    async fn test_open_keeps_payload_after_replacement() {
        let dir = tempfile::tempdir().unwrap();
        let storage = ArtifactStorage::new(dir.path());
        let artifact = dir.path().join("4");
        std::fs::create_dir_all(&artifact).unwrap();
        std::fs::write(artifact.join("a.bin"), b"first payload").unwrap();

        let mut reader = storage.open("4").await.unwrap().unwrap();
        std::fs::remove_file(artifact.join("a.bin")).unwrap();
        std::fs::write(artifact.join("b.bin"), b"second").unwrap();

        assert_eq!(reader.filename, "a.bin");
        assert_eq!(reader.size, 13);
        let mut bytes = Vec::new();
        tokio::io::AsyncReadExt::read_to_end(&mut reader.file, &mut bytes).await.unwrap();
        assert_eq!(bytes, b"first payload");

        let next = storage.open("4").await.unwrap().unwrap();
        assert_eq!((next.filename.as_str(), next.size), ("b.bin", 6));
    }

    #[tokio::test]
    async fn test_open_missing_payload_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let storage = ArtifactStorage::new(dir.path());
        std::fs::create_dir_all(dir.path().join("5")).unwrap();
        assert!(storage.open("5").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_artifact_id_must_be_plain() {
        let dir = tempfile::tempdir().unwrap();
        let storage = ArtifactStorage::new(dir.path());
        assert!(matches!(
            storage.locate("../1").await,
            Err(StorageError::InvalidName(_))
        ));
    }
}
