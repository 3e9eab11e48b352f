//! Filesystem byte source for streamed videos.
//!
//! [`VideoSource`] resolves a record's path segment under a canonical root
//! and opens it as a [`StreamSession`], a chunked body stream that tracks
//! how many bytes reached the client and releases the file when dropped.

use std::io;
use std::path::{Component, Path, PathBuf};
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};

use bytes::Bytes;
use futures_core::Stream;
use tokio::fs::File;
use tokio_util::io::ReaderStream;
use vs_core::{Error, VideoId};

/// Why a record's bytes could not be served.
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    #[error("file not found: {}", path.display())]
    NotFound { path: PathBuf },

    #[error("failed to open {}: {source}", path.display())]
    Open {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("path escapes the video root: {segment}")]
    OutsideRoot { segment: String },

    #[error("not a regular file: {}", path.display())]
    NotAFile { path: PathBuf },
}

impl SourceError {
    /// Label used for the stream error metric.
    pub fn kind(&self) -> &'static str {
        match self {
            SourceError::NotFound { .. } => "file_missing",
            SourceError::Open { .. } => "file_unreadable",
            SourceError::OutsideRoot { .. } => "outside_root",
            SourceError::NotAFile { .. } => "not_a_file",
        }
    }

    /// The record exists but its bytes do not: always a server fault.
    pub fn into_error(self, id: &VideoId) -> Error {
        Error::inconsistency(id, self)
    }

    fn from_io(path: &Path, e: io::Error) -> Self {
        if e.kind() == io::ErrorKind::NotFound {
            SourceError::NotFound {
                path: path.to_path_buf(),
            }
        } else {
            SourceError::Open {
                path: path.to_path_buf(),
                source: e,
            }
        }
    }
}

/// Opens video files under a fixed root directory.
#[derive(Debug)]
pub struct VideoSource {
    root: PathBuf,
    chunk_size: usize,
    active: Arc<AtomicUsize>,
}

impl VideoSource {
    /// Canonicalize `root` and build a source over it.
    ///
    /// Fails if the root does not exist or is not a directory.
    pub fn new(root: impl AsRef<Path>, chunk_size: usize) -> vs_core::Result<Self> {
        let root = root.as_ref();
        let canonical = std::fs::canonicalize(root).map_err(|e| {
            Error::Validation(format!("video root {} is unusable: {e}", root.display()))
        })?;
        if !canonical.is_dir() {
            return Err(Error::Validation(format!(
                "video root {} is not a directory",
                canonical.display()
            )));
        }

        Ok(Self {
            root: canonical,
            chunk_size: chunk_size.max(1),
            active: Arc::new(AtomicUsize::new(0)),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Number of sessions currently open.
    pub fn active_streams(&self) -> usize {
        self.active.load(Ordering::Relaxed)
    }

    /// Resolve `segment` under the root and open it for streaming.
    ///
    /// The size is probed before any byte is read.
    pub async fn open(&self, segment: &str) -> Result<StreamSession, SourceError> {
        let joined = self.join(segment)?;

        let path = tokio::fs::canonicalize(&joined)
            .await
            .map_err(|e| SourceError::from_io(&joined, e))?;
        // Catches symlinks that point out of the root.
        if !path.starts_with(&self.root) {
            return Err(SourceError::OutsideRoot {
                segment: segment.to_string(),
            });
        }

        let file = File::open(&path)
            .await
            .map_err(|e| SourceError::from_io(&path, e))?;
        let meta = file
            .metadata()
            .await
            .map_err(|e| SourceError::from_io(&path, e))?;
        if !meta.is_file() {
            return Err(SourceError::NotAFile { path });
        }

        Ok(StreamSession::new(
            file,
            path,
            meta.len(),
            self.chunk_size,
            ActiveGuard::acquire(&self.active),
        ))
    }

    /// Lexical check: only plain relative components are accepted.
    fn join(&self, segment: &str) -> Result<PathBuf, SourceError> {
        let rel = Path::new(segment);
        let plain = rel
            .components()
            .all(|c| matches!(c, Component::Normal(_) | Component::CurDir));
        if segment.is_empty() || !plain {
            return Err(SourceError::OutsideRoot {
                segment: segment.to_string(),
            });
        }
        Ok(self.root.join(rel))
    }
}

/// Keeps the open-session count and gauge in step with live sessions.
#[derive(Debug)]
struct ActiveGuard(Arc<AtomicUsize>);

impl ActiveGuard {
    fn acquire(counter: &Arc<AtomicUsize>) -> Self {
        counter.fetch_add(1, Ordering::Relaxed);
        metrics::gauge!("vidstream_active_streams").increment(1.0);
        Self(Arc::clone(counter))
    }
}

impl Drop for ActiveGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::Relaxed);
        metrics::gauge!("vidstream_active_streams").decrement(1.0);
    }
}

/// One open video being delivered to one client.
///
/// Yields the file in order, in chunks of at most the configured size.
/// Dropping the session closes the file, whether the body finished, the
/// client went away or the response was never sent.
#[derive(Debug)]
pub struct StreamSession {
    inner: ReaderStream<File>,
    path: PathBuf,
    size: u64,
    sent: u64,
    done: bool,
    _active: ActiveGuard,
}

impl StreamSession {
    fn new(file: File, path: PathBuf, size: u64, chunk_size: usize, active: ActiveGuard) -> Self {
        Self {
            inner: ReaderStream::with_capacity(file, chunk_size),
            path,
            size,
            sent: 0,
            done: false,
            _active: active,
        }
    }

    /// Byte size probed at open time; this is the advertised `Content-Length`.
    pub fn size(&self) -> u64 {
        self.size
    }
}

impl Stream for StreamSession {
    type Item = io::Result<Bytes>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let poll = Pin::new(&mut self.inner).poll_next(cx);
        match &poll {
            Poll::Ready(Some(Ok(chunk))) => self.sent += chunk.len() as u64,
            Poll::Ready(None) => self.done = true,
            Poll::Ready(Some(Err(e))) => {
                tracing::warn!(path = %self.path.display(), error = %e, "Read failed mid-stream");
            }
            Poll::Pending => {}
        }
        poll
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl Drop for StreamSession {
    fn drop(&mut self) {
        if self.done {
            tracing::debug!(
                path = %self.path.display(),
                bytes = self.sent,
                "Stream finished"
            );
        } else {
            tracing::debug!(
                path = %self.path.display(),
                bytes = self.sent,
                size = self.size,
                "Stream closed before completion"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn source_with(files: &[(&str, &[u8])]) -> (tempfile::TempDir, VideoSource) {
        let dir = tempfile::tempdir().unwrap();
        for (name, data) in files {
            let path = dir.path().join(name);
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent).unwrap();
            }
            std::fs::write(path, data).unwrap();
        }
        let source = VideoSource::new(dir.path(), 4).unwrap();
        (dir, source)
    }

    async fn collect(mut session: StreamSession) -> Vec<u8> {
        let mut out = Vec::new();
        while let Some(chunk) =
            std::future::poll_fn(|cx| Pin::new(&mut session).poll_next(cx)).await
        {
            out.extend_from_slice(&chunk.unwrap());
        }
        out
    }

    #[tokio::test]
    async fn streams_whole_file_in_order() {
        let (_dir, source) = source_with(&[("a.mp4", b"0123456789")]);

        let session = source.open("a.mp4").await.unwrap();
        assert_eq!(session.size(), 10);
        assert_eq!(collect(session).await, b"0123456789");
    }

    #[tokio::test]
    async fn empty_file_yields_nothing() {
        let (_dir, source) = source_with(&[("empty.mp4", b"")]);

        let session = source.open("empty.mp4").await.unwrap();
        assert_eq!(session.size(), 0);
        assert!(collect(session).await.is_empty());
    }

    #[tokio::test]
    async fn nested_segment_is_allowed() {
        let (_dir, source) = source_with(&[("2024/clip.mp4", b"abc")]);
        let session = source.open("2024/clip.mp4").await.unwrap();
        assert_eq!(session.size(), 3);
    }

    #[tokio::test]
    async fn missing_file_is_not_found() {
        let (_dir, source) = source_with(&[]);
        let err = source.open("nope.mp4").await.unwrap_err();
        assert!(matches!(err, SourceError::NotFound { .. }), "{err}");
        assert_eq!(err.kind(), "file_missing");
    }

    #[tokio::test]
    async fn unopenable_path_is_500() {
        let (_dir, source) = source_with(&[]);

        // The OS rejects interior NUL bytes before touching the disk.
        let err = source.open("bad\0name.mp4").await.unwrap_err();
        assert!(matches!(err, SourceError::Open { .. }), "{err}");
        assert_eq!(err.kind(), "file_unreadable");
        assert_eq!(err.into_error(&VideoId::from("v3")).http_status(), 500);
    }

    #[tokio::test]
    async fn traversal_is_rejected() {
        let (_dir, source) = source_with(&[("a.mp4", b"x")]);

        for segment in ["../secret.mp4", "/etc/passwd", "a/../../secret.mp4", ""] {
            let err = source.open(segment).await.unwrap_err();
            assert!(matches!(err, SourceError::OutsideRoot { .. }), "{segment}: {err}");
        }
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn symlink_out_of_root_is_rejected() {
        let outside = tempfile::tempdir().unwrap();
        std::fs::write(outside.path().join("secret.mp4"), b"s").unwrap();
        let (dir, source) = source_with(&[]);
        std::os::unix::fs::symlink(outside.path().join("secret.mp4"), dir.path().join("link.mp4"))
            .unwrap();

        let err = source.open("link.mp4").await.unwrap_err();
        assert!(matches!(err, SourceError::OutsideRoot { .. }), "{err}");
    }

    #[tokio::test]
    async fn directory_is_not_a_file() {
        let (dir, source) = source_with(&[]);
        std::fs::create_dir(dir.path().join("clips")).unwrap();

        let err = source.open("clips").await.unwrap_err();
        assert!(matches!(err, SourceError::NotAFile { .. }), "{err}");
    }

    #[tokio::test]
    async fn active_count_follows_session_lifetime() {
        let (_dir, source) = source_with(&[("a.mp4", b"0123456789")]);

        let first = source.open("a.mp4").await.unwrap();
        let second = source.open("a.mp4").await.unwrap();
        assert_eq!(source.active_streams(), 2);

        drop(first);
        assert_eq!(source.active_streams(), 1);
        collect(second).await;
        assert_eq!(source.active_streams(), 0);
    }

    #[tokio::test]
    async fn sent_count_tracks_partial_reads() {
        let (_dir, source) = source_with(&[("a.mp4", b"0123456789")]);
        let mut session = source.open("a.mp4").await.unwrap();

        let first = std::future::poll_fn(|cx| Pin::new(&mut session).poll_next(cx))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(first.len(), 4);
        assert_eq!(session.sent, 4);
    }

    #[test]
    fn missing_root_is_rejected() {
        let err = VideoSource::new("/definitely/not/here", 1024).unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
    }

    #[test]
    fn source_error_maps_to_inconsistency() {
        let err = SourceError::NotFound {
            path: PathBuf::from("/videos/a.mp4"),
        }
        .into_error(&VideoId::from("v1"));
        assert_eq!(err.http_status(), 500);
        assert!(err.to_string().contains("v1"));
    }
}
