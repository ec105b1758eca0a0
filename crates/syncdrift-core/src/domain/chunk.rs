//! Chunked content transfer.
//!
//! Content is always moved as an ordered chunk producer rather than a
//! single buffer, to bound memory on large files. A [`FileContentStream`]
//! is finite and single-use: once drained (or dropped before completion)
//! it cannot be rewound, only re-requested from the source target.

use tokio::sync::mpsc;

use super::metadata::FileMetadata;

/// One piece of a file's content, in transfer order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileChunk {
    pub content: Vec<u8>,
    pub chunk_index: u32,
    pub total_chunks: u32,
    pub chunk_hash: String,
}

/// A finite, ordered stream of [`FileChunk`]s paired with the metadata
/// describing the whole file.
///
/// Dropping the stream before it is drained closes the receiving half of
/// the channel; the producing task (see `syncdrift-fs`) detects the closed
/// channel on its next send and stops reading, releasing its file handle.
pub struct FileContentStream {
    pub metadata: FileMetadata,
    receiver: mpsc::Receiver<FileChunk>,
}

impl FileContentStream {
    pub fn new(metadata: FileMetadata, receiver: mpsc::Receiver<FileChunk>) -> Self {
        Self { metadata, receiver }
    }

    /// Pulls the next chunk, or `None` once the stream is exhausted.
    pub async fn next_chunk(&mut self) -> Option<FileChunk> {
        self.receiver.recv().await
    }

    /// Drains every remaining chunk into a single buffer, in order.
    ///
    /// Used by `applyFileChange` to materialize the whole file before the
    /// hash check and write.
    pub async fn drain_to_vec(mut self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(self.metadata.size as usize);
        while let Some(chunk) = self.next_chunk().await {
            buf.extend_from_slice(&chunk.content);
        }
        buf
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::path::TargetPath;

    #[tokio::test]
    async fn drains_chunks_in_order() {
        let (tx, rx) = mpsc::channel(4);
        let metadata = FileMetadata::for_file(TargetPath::new("a.txt").unwrap(), b"hello world", 0);
        let stream = FileContentStream::new(metadata, rx);

        tx.send(FileChunk {
            content: b"hello ".to_vec(),
            chunk_index: 0,
            total_chunks: 2,
            chunk_hash: "x".into(),
        })
        .await
        .unwrap();
        tx.send(FileChunk {
            content: b"world".to_vec(),
            chunk_index: 1,
            total_chunks: 2,
            chunk_hash: "y".into(),
        })
        .await
        .unwrap();
        drop(tx);

        let data = stream.drain_to_vec().await;
        assert_eq!(data, b"hello world");
    }

    #[tokio::test]
    async fn single_chunk_stream() {
        let (tx, rx) = mpsc::channel(1);
        let metadata = FileMetadata::for_file(TargetPath::new("a.txt").unwrap(), b"hi", 0);
        let stream = FileContentStream::new(metadata, rx);

        tx.send(FileChunk {
            content: b"hi".to_vec(),
            chunk_index: 0,
            total_chunks: 1,
            chunk_hash: "z".into(),
        })
        .await
        .unwrap();
        drop(tx);

        assert_eq!(stream.drain_to_vec().await, b"hi");
    }

    #[tokio::test]
    async fn dropping_stream_closes_receiver_without_panicking() {
        let (tx, rx) = mpsc::channel(1);
        let metadata = FileMetadata::for_file(TargetPath::new("a.txt").unwrap(), b"", 0);
        let stream = FileContentStream::new(metadata, rx);
        drop(stream);
        assert!(tx.send(FileChunk {
            content: vec![],
            chunk_index: 0,
            total_chunks: 1,
            chunk_hash: String::new(),
        }).await.is_err());
    }
}
