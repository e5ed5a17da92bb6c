//! WAV framing helpers and a chunked file reader with flow control.

use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use bytes::Bytes;
use tokio::io::AsyncReadExt;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tracing::debug;

use super::AudioError;
use crate::harness::Close;

/// Format of a decoded WAV file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WavMeta {
    pub sample_rate: u32,
    pub channels: u16,
    pub bits_per_sample: u16,
}

/// Write 16-bit mono PCM samples as a WAV file.
pub fn write_pcm_wav(
    path: impl AsRef<Path>,
    sample_rate: u32,
    samples: &[i16],
) -> Result<(), AudioError> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut writer = hound::WavWriter::create(path.as_ref(), spec)
        .map_err(|e| AudioError::Io(e.to_string()))?;
    for &sample in samples {
        writer
            .write_sample(sample)
            .map_err(|e| AudioError::Io(e.to_string()))?;
    }
    writer.finalize().map_err(|e| AudioError::Io(e.to_string()))
}

/// Read a 16-bit PCM WAV file into samples.
///
/// # Errors
/// [`AudioError::InvalidWav`] for non-PCM or non-16-bit content.
pub fn read_wav_samples(path: impl AsRef<Path>) -> Result<(WavMeta, Vec<i16>), AudioError> {
    let reader =
        hound::WavReader::open(path.as_ref()).map_err(|e| AudioError::InvalidWav(e.to_string()))?;
    let spec = reader.spec();
    if spec.sample_format != hound::SampleFormat::Int || spec.bits_per_sample != 16 {
        return Err(AudioError::InvalidWav(format!(
            "expected 16-bit integer PCM, got {:?} at {} bits",
            spec.sample_format, spec.bits_per_sample
        )));
    }
    let samples = reader
        .into_samples::<i16>()
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| AudioError::InvalidWav(e.to_string()))?;
    Ok((
        WavMeta {
            sample_rate: spec.sample_rate,
            channels: spec.channels,
            bits_per_sample: spec.bits_per_sample,
        },
        samples,
    ))
}

/// Async callback invoked with every chunk the reader produces.
pub type ChunkCallback =
    Arc<dyn Fn(Bytes) -> Pin<Box<dyn std::future::Future<Output = ()> + Send>> + Send + Sync>;

/// Reads a file in fixed-size chunks, delivering each to a data callback.
///
/// Supports pause/resume flow control from inside the callback, mirroring a
/// throttled read-stream feeding a push audio stream.
pub struct ChunkedFileReader {
    path: PathBuf,
    chunk_size: usize,
}

/// Control handle for a spawned [`ChunkedFileReader`].
#[derive(Clone)]
pub struct ReaderControl {
    paused: Arc<AtomicBool>,
    stopped: Arc<AtomicBool>,
    notify: Arc<Notify>,
}

impl ReaderControl {
    fn new() -> Self {
        Self {
            paused: Arc::new(AtomicBool::new(false)),
            stopped: Arc::new(AtomicBool::new(false)),
            notify: Arc::new(Notify::new()),
        }
    }

    /// Stop delivering chunks after the current one.
    pub fn pause(&self) {
        self.paused.store(true, Ordering::SeqCst);
    }

    /// Resume a paused reader.
    pub fn resume(&self) {
        self.paused.store(false, Ordering::SeqCst);
        self.notify.notify_waiters();
    }

    pub fn is_paused(&self) -> bool {
        self.paused.load(Ordering::SeqCst)
    }

    /// Stop the reader permanently. Idempotent.
    pub fn close(&self) {
        self.stopped.store(true, Ordering::SeqCst);
        self.notify.notify_waiters();
    }

    fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }

    /// Wait while paused; returns false once the reader is stopped.
    async fn gate(&self) -> bool {
        loop {
            if self.is_stopped() {
                return false;
            }
            if !self.is_paused() {
                return true;
            }
            let notified = self.notify.notified();
            if self.is_stopped() || !self.is_paused() {
                continue;
            }
            notified.await;
        }
    }
}

impl Close for ReaderControl {
    fn close(&mut self) {
        ReaderControl::close(self);
    }
}

impl ChunkedFileReader {
    pub fn new(path: impl Into<PathBuf>, chunk_size: usize) -> Self {
        Self {
            path: path.into(),
            chunk_size: chunk_size.max(1),
        }
    }

    /// Spawn the read loop, delivering chunks to `on_chunk` until the file is
    /// exhausted or the control handle closes the reader.
    pub fn spawn(self, on_chunk: ChunkCallback) -> (ReaderControl, JoinHandle<Result<(), AudioError>>) {
        let control = ReaderControl::new();
        let task_control = control.clone();

        let handle = tokio::spawn(async move {
            let mut file = tokio::fs::File::open(&self.path)
                .await
                .map_err(|e| AudioError::Io(format!("{}: {e}", self.path.display())))?;
            let mut buf = vec![0u8; self.chunk_size];
            let mut delivered = 0usize;

            loop {
                if !task_control.gate().await {
                    debug!(chunks = delivered, "chunked reader closed");
                    return Ok(());
                }
                let n = file
                    .read(&mut buf)
                    .await
                    .map_err(|e| AudioError::Io(e.to_string()))?;
                if n == 0 {
                    debug!(chunks = delivered, "chunked reader reached end of file");
                    return Ok(());
                }
                delivered += 1;
                on_chunk(Bytes::copy_from_slice(&buf[..n])).await;
            }
        });

        (control, handle)
    }
}
