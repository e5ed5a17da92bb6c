//! Audio input abstractions: push streams, pull sources and WAV framing.

mod pull_stream;
mod push_stream;
pub mod wav;

pub use pull_stream::{CallbackPullSource, MemoryPullSource, PullAudioSource};
pub use push_stream::{AudioChunks, PushAudioStream, push_audio_stream};
pub use wav::{ChunkCallback, ChunkedFileReader, ReaderControl, WavMeta, read_wav_samples, write_pcm_wav};

use bytes::Bytes;

/// Error types for audio stream operations
#[derive(Debug, Clone, thiserror::Error)]
pub enum AudioError {
    #[error("Stream closed")]
    StreamClosed,
    #[error("I/O error: {0}")]
    Io(String),
    #[error("Invalid WAV data: {0}")]
    InvalidWav(String),
}

/// Default read size for pull sources: 100 ms of 16 kHz 16-bit mono PCM.
pub const DEFAULT_PULL_CHUNK_BYTES: usize = 3200;

/// The audio feeding mode handed to a translator.
pub enum AudioInput {
    /// Chunks written by the caller through a [`PushAudioStream`].
    Push(AudioChunks),
    /// Consumer-driven reads from a [`PullAudioSource`].
    Pull {
        source: Box<dyn PullAudioSource>,
        chunk_size: usize,
    },
}

impl AudioInput {
    pub fn push(chunks: AudioChunks) -> Self {
        Self::Push(chunks)
    }

    pub fn pull(source: impl PullAudioSource + 'static) -> Self {
        Self::pull_with_chunk_size(source, DEFAULT_PULL_CHUNK_BYTES)
    }

    pub fn pull_with_chunk_size(source: impl PullAudioSource + 'static, chunk_size: usize) -> Self {
        Self::Pull {
            source: Box::new(source),
            chunk_size: chunk_size.max(2),
        }
    }

    /// Produce the next chunk, or `None` at end-of-stream.
    ///
    /// Pull reads run a cooperative yield first so a tight in-memory source
    /// cannot starve the other tasks on the runtime.
    pub(crate) async fn next_chunk(&mut self) -> Option<Bytes> {
        match self {
            Self::Push(chunks) => chunks.recv().await,
            Self::Pull { source, chunk_size } => {
                tokio::task::yield_now().await;
                let mut buf = vec![0u8; *chunk_size];
                let n = source.read(&mut buf);
                if n == 0 {
                    return None;
                }
                buf.truncate(n);
                Some(Bytes::from(buf))
            }
        }
    }

    /// Close the underlying source. Push streams close from the writer side;
    /// pull sources get their close hook invoked here.
    pub(crate) fn close(&mut self) {
        if let Self::Pull { source, .. } = self {
            source.close();
        }
    }
}
