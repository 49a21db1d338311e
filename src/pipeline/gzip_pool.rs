use flate2::Compression;
use flate2::write::GzEncoder;
use std::io::{self, Write};
use std::sync::{Arc, Mutex, MutexGuard};

/// Compressed output is handed to the client whenever this much is staged.
pub const CHUNK_SIZE: usize = 32 * 1024;

/// Buffers that grew past this are dropped instead of being kept for reuse.
const MAX_RETAINED_CAPACITY: usize = 4 * CHUNK_SIZE;

/// Bounded pool of staging buffers for gzip responses.
///
/// Bodies are compressed while they are written: the encoder fills a pooled
/// buffer which is drained to the client every [`CHUNK_SIZE`] bytes, so a
/// response never holds more than a chunk of compressed output. At most
/// `max_idle` buffers are kept between requests; anything released beyond
/// that is freed.
#[derive(Debug)]
pub struct GzipPool {
    idle: Mutex<Vec<Vec<u8>>>,
    max_idle: usize,
    level: Compression,
}

impl GzipPool {
    pub fn new(max_idle: usize) -> Arc<Self> {
        Arc::new(Self {
            idle: Mutex::new(Vec::with_capacity(max_idle)),
            max_idle,
            level: Compression::default(),
        })
    }

    pub fn idle_count(&self) -> usize {
        self.lock().len()
    }

    pub fn acquire(self: &Arc<Self>) -> PooledBuffer {
        let buffer = self.lock().pop().unwrap_or_default();
        PooledBuffer {
            buffer: Some(buffer),
            pool: Arc::clone(self),
        }
    }

    /// Gzips everything `source` writes and streams the result into `out`.
    /// Returns the number of compressed bytes written.
    ///
    /// The staging buffer goes back to the pool on every exit path.
    pub fn compress_to<W, F>(self: &Arc<Self>, out: &mut W, source: F) -> io::Result<u64>
    where
        W: Write + ?Sized,
        F: FnOnce(&mut dyn Write) -> io::Result<u64>,
    {
        let mut pooled = self.acquire();
        let mut sink = ChunkedSink {
            staged: pooled.buffer_mut(),
            out,
            written: 0,
        };

        let mut encoder = GzEncoder::new(&mut sink, self.level);
        source(&mut encoder)?;
        encoder.finish()?;

        sink.flush()?;
        Ok(sink.written)
    }

    fn release(&self, mut buffer: Vec<u8>) {
        if buffer.capacity() > MAX_RETAINED_CAPACITY {
            return;
        }
        buffer.clear();
        let mut idle = self.lock();
        if idle.len() < self.max_idle {
            idle.push(buffer);
        }
    }

    fn lock(&self) -> MutexGuard<'_, Vec<Vec<u8>>> {
        // A panic while holding the lock cannot leave the list inconsistent.
        self.idle.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// A buffer checked out of a [`GzipPool`], returned (cleared) on drop.
#[derive(Debug)]
pub struct PooledBuffer {
    buffer: Option<Vec<u8>>,
    pool: Arc<GzipPool>,
}

impl PooledBuffer {
    fn buffer_mut(&mut self) -> &mut Vec<u8> {
        self.buffer.get_or_insert_with(Vec::new)
    }
}

impl Drop for PooledBuffer {
    fn drop(&mut self) {
        if let Some(buffer) = self.buffer.take() {
            self.pool.release(buffer);
        }
    }
}

/// Stages encoder output and forwards it to `out` a chunk at a time.
struct ChunkedSink<'a, W: ?Sized> {
    staged: &'a mut Vec<u8>,
    out: &'a mut W,
    written: u64,
}

impl<W: Write + ?Sized> ChunkedSink<'_, W> {
    fn drain(&mut self) -> io::Result<()> {
        if !self.staged.is_empty() {
            self.out.write_all(self.staged.as_slice())?;
            self.written += self.staged.len() as u64;
            self.staged.clear();
        }
        Ok(())
    }
}

impl<W: Write + ?Sized> Write for ChunkedSink<'_, W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if self.staged.len() >= CHUNK_SIZE {
            self.drain()?;
        }
        let take = buf.len().min(CHUNK_SIZE - self.staged.len());
        self.staged.extend_from_slice(&buf[..take]);
        Ok(take)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.drain()?;
        self.out.flush()
    }
}
