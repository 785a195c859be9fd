use std::fmt;
use std::ops::{Deref, DerefMut};
use std::sync::{Mutex, PoisonError};

use bytes::BytesMut;
use tracing::trace;

/// Idle buffers kept by a pool unless configured otherwise.
pub const DEFAULT_MAX_IDLE: usize = 64;

/// Free list of reusable byte buffers.
///
/// New buffers start zero-filled at `initial_size` bytes. A buffer whose
/// capacity grew beyond `recycle_size` while in use is dropped on return
/// rather than kept, as is any buffer returned while `max_idle` are
/// already waiting.
pub struct BufferPool {
    free: Mutex<Vec<BytesMut>>,
    initial_size: usize,
    recycle_size: usize,
    max_idle: usize,
}

impl BufferPool {
    pub fn new(initial_size: usize, recycle_size: usize) -> Self {
        Self {
            free: Mutex::new(Vec::new()),
            initial_size,
            recycle_size,
            max_idle: DEFAULT_MAX_IDLE,
        }
    }

    /// Cap the number of idle buffers kept for reuse.
    pub fn with_max_idle(mut self, max_idle: usize) -> Self {
        self.max_idle = max_idle;
        self
    }

    /// Take a buffer for exclusive use; it returns to the pool on drop.
    pub fn take(&self) -> ScratchBuffer<'_> {
        let reused = self
            .free
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop();
        let buf = reused.unwrap_or_else(|| BytesMut::zeroed(self.initial_size));
        ScratchBuffer { buf, pool: self }
    }

    /// Number of buffers waiting for reuse.
    pub fn available(&self) -> usize {
        self.free.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn recycle_size(&self) -> usize {
        self.recycle_size
    }

    pub fn max_idle(&self) -> usize {
        self.max_idle
    }

    fn give_back(&self, buf: BytesMut) {
        if buf.capacity() > self.recycle_size {
            trace!(
                capacity = buf.capacity(),
                recycle_size = self.recycle_size,
                "dropping oversized scratch buffer"
            );
            return;
        }
        let mut free = self.free.lock().unwrap_or_else(PoisonError::into_inner);
        if free.len() >= self.max_idle {
            trace!(max_idle = self.max_idle, "free list full, dropping scratch buffer");
            return;
        }
        free.push(buf);
    }
}

impl fmt::Debug for BufferPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BufferPool")
            .field("available", &self.available())
            .field("initial_size", &self.initial_size)
            .field("recycle_size", &self.recycle_size)
            .field("max_idle", &self.max_idle)
            .finish()
    }
}

/// A buffer borrowed from a [`BufferPool`].
pub struct ScratchBuffer<'a> {
    buf: BytesMut,
    pool: &'a BufferPool,
}

impl Deref for ScratchBuffer<'_> {
    type Target = BytesMut;

    fn deref(&self) -> &BytesMut {
        &self.buf
    }
}

impl DerefMut for ScratchBuffer<'_> {
    fn deref_mut(&mut self) -> &mut BytesMut {
        &mut self.buf
    }
}

impl Drop for ScratchBuffer<'_> {
    fn drop(&mut self) {
        self.pool.give_back(std::mem::take(&mut self.buf));
    }
}
