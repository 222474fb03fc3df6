//! On-disk asset lifecycle (create, rename, delete) keyed by record identity.

use super::sanitize::{asset_stem, is_owned_by, upload_extension};
use crate::record_store::RecordKey;
use serde::Serialize;
use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use thiserror::Error;
use tokio::fs;
use tokio::io::{AsyncRead, AsyncWriteExt};
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AssetKind {
    Audio,
    Document,
}

impl AssetKind {
    pub const ALL: [AssetKind; 2] = [AssetKind::Audio, AssetKind::Document];
}

impl fmt::Display for AssetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AssetKind::Audio => write!(f, "audio"),
            AssetKind::Document => write!(f, "document"),
        }
    }
}

/// Where one kind of asset lives on disk and how it is exposed publicly.
#[derive(Debug, Clone)]
pub struct AssetLocation {
    pub dir: PathBuf,
    pub public_prefix: String,
}

impl AssetLocation {
    pub fn new(dir: impl Into<PathBuf>, public_prefix: impl Into<String>) -> Self {
        Self {
            dir: dir.into(),
            public_prefix: public_prefix.into(),
        }
    }

    pub fn public_path(&self, file_name: &str) -> String {
        format!("{}/{}", self.public_prefix.trim_end_matches('/'), file_name)
    }
}

/// Incoming bytes for an asset, with the filename the client supplied.
pub struct Upload {
    filename: String,
    reader: Pin<Box<dyn AsyncRead + Send>>,
}

impl Upload {
    pub fn new(filename: impl Into<String>, reader: impl AsyncRead + Send + 'static) -> Self {
        Self {
            filename: filename.into(),
            reader: Box::pin(reader),
        }
    }

    pub fn from_bytes(filename: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self::new(filename, io::Cursor::new(bytes))
    }

    /// Streams the content of a local file.
    pub async fn open(path: &Path) -> io::Result<Self> {
        let file = fs::File::open(path).await?;
        let filename = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or_default()
            .to_string();
        Ok(Self::new(filename, file))
    }

    pub fn filename(&self) -> &str {
        &self.filename
    }
}

impl fmt::Debug for Upload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Upload")
            .field("filename", &self.filename)
            .finish_non_exhaustive()
    }
}

/// What a mutation asks the asset manager to do with one kind of asset.
#[derive(Debug, Default)]
pub enum AssetChange {
    /// Leave the asset as is (it still follows a rename).
    #[default]
    Keep,
    /// Remove the asset.
    Delete,
    /// Replace the asset with new content.
    Replace(Upload),
}

/// Errors that can occur while writing or moving assets.
///
/// Deletions never produce a fatal error for a mutation; they are reported as
/// [`AssetError::Remove`] so the caller can log them.
#[derive(Debug, Error)]
pub enum AssetError {
    #[error("Failed to list {kind} assets in {dir:?}: {source}")]
    Lookup {
        kind: AssetKind,
        dir: PathBuf,
        source: io::Error,
    },

    #[error("Failed to write {kind} asset {path:?}: {source}")]
    Write {
        kind: AssetKind,
        path: PathBuf,
        source: io::Error,
    },

    #[error("Failed to rename {kind} asset {from:?} to {to:?}: {source}")]
    Rename {
        kind: AssetKind,
        from: PathBuf,
        to: PathBuf,
        source: io::Error,
    },

    #[error("Failed to remove {kind} asset {path:?}: {source}")]
    Remove {
        kind: AssetKind,
        path: PathBuf,
        source: io::Error,
    },
}

/// Maps record identities to asset files, one directory per [`AssetKind`].
#[derive(Debug, Clone)]
pub struct AssetManager {
    audio: AssetLocation,
    document: AssetLocation,
}

impl AssetManager {
    pub fn new(audio: AssetLocation, document: AssetLocation) -> Self {
        Self { audio, document }
    }

    pub fn location(&self, kind: AssetKind) -> &AssetLocation {
        match kind {
            AssetKind::Audio => &self.audio,
            AssetKind::Document => &self.document,
        }
    }

    /// Files of `kind` owned by `key`. A missing directory owns nothing.
    pub async fn locate(
        &self,
        kind: AssetKind,
        key: &RecordKey,
    ) -> Result<Vec<PathBuf>, AssetError> {
        let dir = &self.location(kind).dir;
        let stem = asset_stem(key);
        let lookup_error = |source| AssetError::Lookup {
            kind,
            dir: dir.clone(),
            source,
        };

        let mut entries = match fs::read_dir(dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(lookup_error(e)),
        };

        let mut owned = Vec::new();
        while let Some(entry) = entries.next_entry().await.map_err(lookup_error)? {
            if let Some(name) = entry.file_name().to_str() {
                if is_owned_by(name, &stem) {
                    owned.push(entry.path());
                }
            }
        }
        owned.sort();
        Ok(owned)
    }

    /// Removes every file of `kind` owned by `key`.
    ///
    /// All files are attempted even if one fails; the last failure is returned.
    pub async fn remove(&self, kind: AssetKind, key: &RecordKey) -> Result<usize, AssetError> {
        let mut removed = 0;
        let mut last_error = None;
        for path in self.locate(kind, key).await? {
            match fs::remove_file(&path).await {
                Ok(()) => {
                    debug!("Removed {} asset {:?}", kind, path);
                    removed += 1;
                }
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(source) => {
                    warn!("Failed to remove {} asset {:?}: {}", kind, path, source);
                    last_error = Some(AssetError::Remove { kind, path, source });
                }
            }
        }
        match last_error {
            Some(e) => Err(e),
            None => Ok(removed),
        }
    }

    /// Applies `change` to the asset of `kind` and returns the public path the
    /// record should reference afterwards (`None` when there is no asset).
    ///
    /// Precedence: deletion, then following a rename, then storing new content,
    /// then passing `previous_path` through.
    pub async fn store(
        &self,
        kind: AssetKind,
        old: Option<&RecordKey>,
        new: &RecordKey,
        change: AssetChange,
        previous_path: Option<&str>,
    ) -> Result<Option<String>, AssetError> {
        let renamed = old.filter(|old| *old != new);
        match change {
            AssetChange::Delete => {
                for key in std::iter::once(new).chain(renamed) {
                    if let Err(e) = self.remove(kind, key).await {
                        warn!("Ignoring {} asset deletion failure for {}: {}", kind, key, e);
                    }
                }
                Ok(None)
            }
            AssetChange::Keep => match renamed {
                Some(old) => self.follow_rename(kind, old, new).await,
                None => Ok(previous_path.map(str::to_string)),
            },
            AssetChange::Replace(upload) => self.write_upload(kind, renamed, new, upload).await,
        }
    }

    async fn follow_rename(
        &self,
        kind: AssetKind,
        old: &RecordKey,
        new: &RecordKey,
    ) -> Result<Option<String>, AssetError> {
        let location = self.location(kind);
        let old_stem = asset_stem(old);
        let new_stem = asset_stem(new);

        let mut existing = self.locate(kind, old).await?.into_iter();
        let Some(source) = existing.next() else {
            debug!("No {} asset to rename for {}", kind, old);
            return Ok(None);
        };
        for extra in existing {
            warn!("Removing duplicate {} asset {:?}", kind, extra);
            if let Err(e) = fs::remove_file(&extra).await {
                warn!("Failed to remove duplicate {} asset {:?}: {}", kind, extra, e);
            }
        }

        let source_name = file_name_of(&source);
        let extension = &source_name[old_stem.len()..];
        let target_name = format!("{}{}", new_stem, extension);
        let target = location.dir.join(&target_name);

        if source != target {
            fs::rename(&source, &target)
                .await
                .map_err(|e| AssetError::Rename {
                    kind,
                    from: source.clone(),
                    to: target.clone(),
                    source: e,
                })?;
            info!("Renamed {} asset {:?} to {:?}", kind, source, target);
        }
        Ok(Some(location.public_path(&target_name)))
    }

    async fn write_upload(
        &self,
        kind: AssetKind,
        old: Option<&RecordKey>,
        new: &RecordKey,
        upload: Upload,
    ) -> Result<Option<String>, AssetError> {
        let location = self.location(kind);
        let write_error = |path: &Path, source| AssetError::Write {
            kind,
            path: path.to_path_buf(),
            source,
        };

        fs::create_dir_all(&location.dir)
            .await
            .map_err(|e| write_error(&location.dir, e))?;

        let target_name = format!("{}{}", asset_stem(new), upload_extension(&upload.filename));
        let target = location.dir.join(&target_name);
        // Hidden name, so it is never owned by any stem while it is written.
        let staging = location.dir.join(format!(".{}.upload", target_name));

        if let Err(e) = write_stream(&staging, upload.reader).await {
            let _ = fs::remove_file(&staging).await;
            return Err(write_error(&staging, e));
        }

        // One asset per stem: drop whatever the old and new identities owned.
        for key in std::iter::once(new).chain(old) {
            match self.locate(kind, key).await {
                Ok(paths) => {
                    for path in paths.into_iter().filter(|p| *p != target) {
                        if let Err(e) = fs::remove_file(&path).await {
                            warn!("Failed to remove replaced {} asset {:?}: {}", kind, path, e);
                        }
                    }
                }
                Err(e) => warn!("Could not clean up previous {} assets: {}", kind, e),
            }
        }

        if let Err(e) = fs::rename(&staging, &target).await {
            let _ = fs::remove_file(&staging).await;
            return Err(AssetError::Rename {
                kind,
                from: staging,
                to: target,
                source: e,
            });
        }
        info!("Stored {} asset {:?}", kind, target);
        Ok(Some(location.public_path(&target_name)))
    }
}

/// Drains `reader` into a new file at `path`; the handle is closed on return.
async fn write_stream(path: &Path, mut reader: Pin<Box<dyn AsyncRead + Send>>) -> io::Result<u64> {
    let mut file = fs::File::create(path).await?;
    let written = tokio::io::copy(&mut reader, &mut file).await?;
    file.flush().await?;
    file.sync_all().await?;
    Ok(written)
}

fn file_name_of(path: &Path) -> String {
    path.file_name()
        .and_then(|n| n.to_str())
        .unwrap_or_default()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn manager(dir: &TempDir) -> AssetManager {
        AssetManager::new(
            AssetLocation::new(dir.path().join("audio"), "/media/audio/"),
            AssetLocation::new(dir.path().join("documents"), "/media/documents"),
        )
    }

    fn audio_files(dir: &TempDir) -> Vec<String> {
        let mut names: Vec<String> = std::fs::read_dir(dir.path().join("audio"))
            .map(|entries| {
                entries
                    .filter_map(|e| e.ok())
                    .map(|e| e.file_name().to_string_lossy().to_string())
                    .collect()
            })
            .unwrap_or_default();
        names.sort();
        names
    }

    #[tokio::test]
    async fn test_upload_creates_directory_and_returns_public_path() {
        let dir = TempDir::new().unwrap();
        let assets = manager(&dir);
        let key = RecordKey::new("Author", "Song");

        let path = assets
            .store(
                AssetKind::Audio,
                None,
                &key,
                AssetChange::Replace(Upload::from_bytes("take1.MP3", b"abc".to_vec())),
                None,
            )
            .await
            .unwrap();

        assert_eq!(path.as_deref(), Some("/media/audio/song-author.mp3"));
        assert_eq!(audio_files(&dir), vec!["song-author.mp3"]);
        let content = std::fs::read(dir.path().join("audio/song-author.mp3")).unwrap();
        assert_eq!(content, b"abc");
    }

    #[tokio::test]
    async fn test_upload_with_new_extension_replaces_old_file() {
        let dir = TempDir::new().unwrap();
        let assets = manager(&dir);
        let key = RecordKey::new("Author", "Song");

        for name in ["a.mp3", "b.ogg"] {
            assets
                .store(
                    AssetKind::Audio,
                    Some(&key),
                    &key,
                    AssetChange::Replace(Upload::from_bytes(name, b"x".to_vec())),
                    None,
                )
                .await
                .unwrap();
        }
        assert_eq!(audio_files(&dir), vec!["song-author.ogg"]);
    }

    #[tokio::test]
    async fn test_rename_moves_file_preserving_extension() {
        let dir = TempDir::new().unwrap();
        let assets = manager(&dir);
        let old = RecordKey::new("Author", "Old Title");
        let new = RecordKey::new("Author", "New Title");
        assets
            .store(
                AssetKind::Audio,
                None,
                &old,
                AssetChange::Replace(Upload::from_bytes("x.flac", b"x".to_vec())),
                None,
            )
            .await
            .unwrap();

        let path = assets
            .store(
                AssetKind::Audio,
                Some(&old),
                &new,
                AssetChange::Keep,
                Some("/media/audio/old_title-author.flac"),
            )
            .await
            .unwrap();

        assert_eq!(path.as_deref(), Some("/media/audio/new_title-author.flac"));
        assert_eq!(audio_files(&dir), vec!["new_title-author.flac"]);
    }

    #[tokio::test]
    async fn test_rename_without_file_is_a_noop() {
        let dir = TempDir::new().unwrap();
        let assets = manager(&dir);
        let path = assets
            .store(
                AssetKind::Document,
                Some(&RecordKey::new("A", "1")),
                &RecordKey::new("A", "2"),
                AssetChange::Keep,
                None,
            )
            .await
            .unwrap();
        assert_eq!(path, None);
    }

    #[tokio::test]
    async fn test_delete_leaves_files_of_other_stems() {
        let dir = TempDir::new().unwrap();
        let assets = manager(&dir);
        let key = RecordKey::new("author", "song");
        std::fs::create_dir_all(dir.path().join("audio")).unwrap();
        std::fs::write(dir.path().join("audio/song-author.mp3"), b"x").unwrap();
        std::fs::write(dir.path().join("audio/song-author_live.mp3"), b"y").unwrap();

        let path = assets
            .store(
                AssetKind::Audio,
                Some(&key),
                &key,
                AssetChange::Delete,
                Some("/media/audio/song-author.mp3"),
            )
            .await
            .unwrap();

        assert_eq!(path, None);
        assert_eq!(audio_files(&dir), vec!["song-author_live.mp3"]);
    }

    #[tokio::test]
    async fn test_keep_passes_previous_path_through() {
        let dir = TempDir::new().unwrap();
        let assets = manager(&dir);
        let key = RecordKey::new("A", "T");
        let path = assets
            .store(
                AssetKind::Audio,
                Some(&key),
                &key,
                AssetChange::Keep,
                Some("/media/audio/t-a.mp3"),
            )
            .await
            .unwrap();
        assert_eq!(path.as_deref(), Some("/media/audio/t-a.mp3"));
    }

    #[tokio::test]
    async fn test_write_failure_is_reported() {
        let dir = TempDir::new().unwrap();
        // A regular file where the audio directory should be.
        std::fs::write(dir.path().join("audio"), b"not a dir").unwrap();
        let assets = manager(&dir);

        let result = assets
            .store(
                AssetKind::Audio,
                None,
                &RecordKey::new("A", "T"),
                AssetChange::Replace(Upload::from_bytes("a.mp3", b"x".to_vec())),
                None,
            )
            .await;
        assert!(matches!(result, Err(AssetError::Write { .. })));
    }
}
