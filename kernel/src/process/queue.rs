//! Per-process message queue (`p_queue`)
//!
//! A fixed byte buffer filled from the front; `len` is the write index.
//! Messages are written whole or not at all.

use alloc::boxed::Box;
use alloc::vec;

use crate::error::{KernelError, KernelResult, Resource};

pub struct MessageQueue {
    buf: Box<[u8]>,
    len: usize,
}

impl MessageQueue {
    pub fn new(capacity: usize) -> Self {
        Self { buf: vec![0u8; capacity].into_boxed_slice(), len: 0 }
    }

    pub fn capacity(&self) -> usize {
        self.buf.len()
    }

    /// Bytes waiting to be read
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn free(&self) -> usize {
        self.capacity() - self.len
    }

    /// Append a whole message
    pub fn write(&mut self, msg: &[u8]) -> KernelResult<()> {
        if msg.len() > self.free() {
            return Err(KernelError::exhausted(Resource::MessageQueue, self.capacity()));
        }
        self.buf[self.len..self.len + msg.len()].copy_from_slice(msg);
        self.len += msg.len();
        Ok(())
    }

    /// Move up to `out.len()` bytes from the front into `out`
    pub fn read(&mut self, out: &mut [u8]) -> usize {
        let n = out.len().min(self.len);
        out[..n].copy_from_slice(&self.buf[..n]);
        self.buf.copy_within(n..self.len, 0);
        self.len -= n;
        n
    }

    pub fn clear(&mut self) {
        self.len = 0;
    }
}
