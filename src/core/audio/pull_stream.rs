//! Pull audio input: the consumer drives a read callback.

/// An audio source the consumer reads from on demand.
///
/// `read` fills `buf` and returns the number of bytes produced; returning 0
/// signals end-of-stream. The engine calls `close` once when it stops
/// consuming, whether or not the source was exhausted.
pub trait PullAudioSource: Send {
    fn read(&mut self, buf: &mut [u8]) -> usize;

    fn close(&mut self) {}
}

/// Adapter building a [`PullAudioSource`] from plain closures, for callers
/// that carry their pump state in captured variables rather than a struct.
pub struct CallbackPullSource<R>
where
    R: FnMut(&mut [u8]) -> usize + Send,
{
    read_fn: R,
    close_fn: Option<Box<dyn FnOnce() + Send>>,
}

impl<R> CallbackPullSource<R>
where
    R: FnMut(&mut [u8]) -> usize + Send,
{
    pub fn new(read_fn: R) -> Self {
        Self {
            read_fn,
            close_fn: None,
        }
    }

    pub fn with_close(read_fn: R, close_fn: impl FnOnce() + Send + 'static) -> Self {
        Self {
            read_fn,
            close_fn: Some(Box::new(close_fn)),
        }
    }
}

impl<R> PullAudioSource for CallbackPullSource<R>
where
    R: FnMut(&mut [u8]) -> usize + Send,
{
    fn read(&mut self, buf: &mut [u8]) -> usize {
        (self.read_fn)(buf)
    }

    fn close(&mut self) {
        if let Some(close_fn) = self.close_fn.take() {
            close_fn();
        }
    }
}

/// In-memory source yielding a fixed byte buffer, then end-of-stream.
pub struct MemoryPullSource {
    data: Vec<u8>,
    position: usize,
}

impl MemoryPullSource {
    pub fn new(data: Vec<u8>) -> Self {
        Self { data, position: 0 }
    }
}

impl PullAudioSource for MemoryPullSource {
    fn read(&mut self, buf: &mut [u8]) -> usize {
        let remaining = self.data.len() - self.position;
        let n = remaining.min(buf.len());
        buf[..n].copy_from_slice(&self.data[self.position..self.position + n]);
        self.position += n;
        n
    }
}
