//! Push audio input stream.
//!
//! The caller writes chunks of PCM bytes; the consumer (a translator engine)
//! receives them in write order. Closing the stream signals end-of-stream to
//! the consumer once the buffered chunks are drained.

use bytes::Bytes;
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tracing::debug;

use super::AudioError;
use crate::harness::Close;

/// Writer half of a push audio stream.
///
/// Cheap to clone is intentionally not offered: the stream has one producer,
/// matching the single feeding loop the recognizer scenarios use.
pub struct PushAudioStream {
    tx: Mutex<Option<mpsc::UnboundedSender<Bytes>>>,
}

/// Consumer half handed to a translator engine.
pub struct AudioChunks {
    rx: mpsc::UnboundedReceiver<Bytes>,
}

/// Create a connected push stream and its consumer half.
pub fn push_audio_stream() -> (PushAudioStream, AudioChunks) {
    let (tx, rx) = mpsc::unbounded_channel();
    (
        PushAudioStream {
            tx: Mutex::new(Some(tx)),
        },
        AudioChunks { rx },
    )
}

impl PushAudioStream {
    /// Buffer a chunk for the consumer.
    ///
    /// # Errors
    /// [`AudioError::StreamClosed`] if the stream was closed, by either end.
    pub fn write(&self, chunk: impl Into<Bytes>) -> Result<(), AudioError> {
        let guard = self.tx.lock();
        let tx = guard.as_ref().ok_or(AudioError::StreamClosed)?;
        tx.send(chunk.into()).map_err(|_| AudioError::StreamClosed)
    }

    /// Signal end-of-stream. Buffered chunks remain readable. Idempotent.
    pub fn close(&self) {
        if self.tx.lock().take().is_some() {
            debug!("push audio stream closed");
        }
    }

    pub fn is_closed(&self) -> bool {
        self.tx.lock().is_none()
    }
}

impl Close for PushAudioStream {
    fn close(&mut self) {
        PushAudioStream::close(self);
    }
}

impl AudioChunks {
    /// Receive the next chunk; `None` once the stream is closed and drained.
    pub async fn recv(&mut self) -> Option<Bytes> {
        self.rx.recv().await
    }
}
