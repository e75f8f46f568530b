//! Response body sources and one-shot consumption.
//!
//! A body is empty, a block of in-memory bytes, or a lazy file-range
//! stream. In-memory bodies are plain values and cost nothing to share; a
//! lazy stream is a single-use resource, so it sits behind a take-once slot
//! that hands the stream to exactly one consumer. Everybody else gets a
//! chunk sequence that reports [`BodyError::AlreadyConsumed`].

use std::io::SeekFrom;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, PoisonError};

use hyper::body::Bytes;
use tokio::fs::File;
use tokio::io::{AsyncReadExt, AsyncSeekExt};

use crate::error::BodyError;

/// Read granularity for lazy file-range streams.
const CHUNK_SIZE: u64 = 64 * 1024;

/// A response body source.
#[derive(Debug, Clone, Default)]
pub struct Body {
    kind: BodyKind,
}

#[derive(Debug, Clone, Default)]
enum BodyKind {
    #[default]
    Empty,
    Full(Bytes),
    Stream(StreamSlot),
}

impl Body {
    /// An absent body.
    #[must_use]
    pub fn empty() -> Self {
        Self { kind: BodyKind::Empty }
    }

    /// An in-memory body.
    pub fn full(bytes: impl Into<Bytes>) -> Self {
        Self {
            kind: BodyKind::Full(bytes.into()),
        }
    }

    /// A lazy stream over the inclusive byte range `[start, end]` of the
    /// file at `path`. The file is opened on first read.
    pub(crate) fn file_range(path: PathBuf, start: u64, end: u64) -> Self {
        let stream = FileStream {
            path,
            file: None,
            next: start,
            remaining: end - start + 1,
        };
        Self {
            kind: BodyKind::Stream(StreamSlot(Arc::new(Mutex::new(Some(stream))))),
        }
    }

    /// True when no body bytes will ever be produced.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        matches!(&self.kind, BodyKind::Empty) || matches!(&self.kind, BodyKind::Full(b) if b.is_empty())
    }

    /// Begin consuming the body. For a lazy stream this takes the
    /// underlying resource out of its slot; a second take observes
    /// [`BodyError::AlreadyConsumed`].
    pub(crate) fn chunks(&self) -> ByteChunks {
        let state = match &self.kind {
            BodyKind::Empty => ChunksState::Done,
            BodyKind::Full(bytes) => ChunksState::Full(bytes.clone()),
            BodyKind::Stream(slot) => match slot.take() {
                Some(stream) => ChunksState::Stream(stream),
                None => ChunksState::Consumed,
            },
        };
        ByteChunks { state }
    }
}

impl From<Bytes> for Body {
    fn from(bytes: Bytes) -> Self {
        Self::full(bytes)
    }
}

impl From<Vec<u8>> for Body {
    fn from(bytes: Vec<u8>) -> Self {
        Self::full(bytes)
    }
}

impl From<String> for Body {
    fn from(text: String) -> Self {
        Self::full(text)
    }
}

impl From<&'static str> for Body {
    fn from(text: &'static str) -> Self {
        Self::full(Bytes::from_static(text.as_bytes()))
    }
}

/// Shared take-once slot for a single-use stream.
#[derive(Debug, Clone)]
struct StreamSlot(Arc<Mutex<Option<FileStream>>>);

impl StreamSlot {
    fn take(&self) -> Option<FileStream> {
        self.0
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
    }
}

/// Finite, non-restartable sequence of body byte chunks.
///
/// Obtained from [`Response::bytes`](crate::response::Response::bytes);
/// consuming it is the one allowed drain of the underlying stream.
#[derive(Debug)]
pub struct ByteChunks {
    state: ChunksState,
}

#[derive(Debug)]
enum ChunksState {
    Done,
    Full(Bytes),
    Stream(FileStream),
    Consumed,
}

impl ByteChunks {
    /// Next chunk, or `None` once the sequence is exhausted. An error chunk
    /// terminates the sequence.
    pub async fn next(&mut self) -> Option<Result<Bytes, BodyError>> {
        match std::mem::replace(&mut self.state, ChunksState::Done) {
            ChunksState::Done => None,
            ChunksState::Full(bytes) => Some(Ok(bytes)),
            ChunksState::Consumed => Some(Err(BodyError::AlreadyConsumed)),
            ChunksState::Stream(mut stream) => match stream.next_chunk().await {
                Some(Ok(chunk)) => {
                    self.state = ChunksState::Stream(stream);
                    Some(Ok(chunk))
                }
                Some(Err(e)) => Some(Err(e)),
                None => None,
            },
        }
    }

    /// Drain the remaining chunks into one contiguous buffer.
    pub async fn collect(mut self) -> Result<Bytes, BodyError> {
        let mut buf = Vec::new();
        while let Some(chunk) = self.next().await {
            buf.extend_from_slice(&chunk?);
        }
        Ok(Bytes::from(buf))
    }
}

/// Bounded reader over a byte range of a file.
///
/// Opens the file and seeks on first read; yields chunks of at most
/// [`CHUNK_SIZE`] bytes until the range is exhausted.
#[derive(Debug)]
struct FileStream {
    path: PathBuf,
    file: Option<File>,
    next: u64,
    remaining: u64,
}

impl FileStream {
    async fn next_chunk(&mut self) -> Option<Result<Bytes, BodyError>> {
        if self.remaining == 0 {
            return None;
        }

        if self.file.is_none() {
            match self.open_at_start().await {
                Ok(file) => self.file = Some(file),
                Err(e) => {
                    self.remaining = 0;
                    return Some(Err(e));
                }
            }
        }
        let file = self.file.as_mut()?;

        let want = usize::try_from(self.remaining.min(CHUNK_SIZE)).unwrap_or(usize::MAX);
        let mut buf = vec![0u8; want];
        match file.read(&mut buf).await {
            Ok(0) => {
                // The file shrank between stat and read.
                let unread = self.remaining;
                self.remaining = 0;
                Some(Err(BodyError::Read(format!(
                    "file truncated with {unread} bytes of the range unread"
                ))))
            }
            Ok(n) => {
                buf.truncate(n);
                self.next += n as u64;
                self.remaining -= n as u64;
                Some(Ok(Bytes::from(buf)))
            }
            Err(e) => {
                self.remaining = 0;
                Some(Err(BodyError::Read(e.to_string())))
            }
        }
    }

    async fn open_at_start(&self) -> Result<File, BodyError> {
        let mut file = File::open(&self.path)
            .await
            .map_err(|e| BodyError::Read(format!("{}: {e}", self.path.display())))?;
        file.seek(SeekFrom::Start(self.next))
            .await
            .map_err(|e| BodyError::Read(e.to_string()))?;
        Ok(file)
    }
}
