//! Capped stdout/stderr capture and the `process.nextTick` queue (spec §4.2).
//!
//! Both buffers are plain byte-capped ring buffers: once `max_bytes` is
//! reached the oldest 20% of the buffer is dropped to make room, rather than
//! failing the write or growing without bound.

use std::collections::VecDeque;

const DEFAULT_MAX_BYTES: usize = 1024 * 1024;
const DEFAULT_MAX_TICKS: usize = 10_000;

pub struct RingBuffer {
    data: String,
    max_bytes: usize,
}

impl RingBuffer {
    pub fn new(max_bytes: usize) -> Self {
        Self {
            data: String::new(),
            max_bytes,
        }
    }

    pub fn push(&mut self, text: &str) {
        self.data.push_str(text);
        if self.data.len() > self.max_bytes {
            let drop_to = self.data.len() - self.data.len() / 5;
            let boundary = (0..=drop_to)
                .rev()
                .find(|&i| self.data.is_char_boundary(i))
                .unwrap_or(0);
            self.data.replace_range(..boundary, "");
        }
    }

    pub fn take(&mut self) -> String {
        std::mem::take(&mut self.data)
    }

    pub fn clear(&mut self) {
        self.data.clear();
    }
}

impl Default for RingBuffer {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_BYTES)
    }
}

/// Bounded FIFO queue backing `process.nextTick`. Callbacks themselves are
/// owned and run by the QuickJS job queue; this side only tracks depth so
/// `eval` can refuse to enqueue once the sandbox is saturated.
pub struct NextTickQueue {
    depth: VecDeque<()>,
    max_depth: usize,
}

impl NextTickQueue {
    pub fn new(max_depth: usize) -> Self {
        Self {
            depth: VecDeque::with_capacity(max_depth.min(1024)),
            max_depth,
        }
    }

    pub fn try_push(&mut self) -> bool {
        if self.depth.len() >= self.max_depth {
            return false;
        }
        self.depth.push_back(());
        true
    }

    pub fn pop(&mut self) {
        self.depth.pop_front();
    }

    pub fn len(&self) -> usize {
        self.depth.len()
    }

    pub fn is_empty(&self) -> bool {
        self.depth.is_empty()
    }
}

impl Default for NextTickQueue {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_TICKS)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ring_buffer_drops_oldest_on_overflow() {
        let mut rb = RingBuffer::new(10);
        rb.push("0123456789");
        rb.push("X");
        assert!(rb.data.len() <= 10);
        assert!(rb.data.ends_with('X'));
    }

    #[test]
    fn next_tick_queue_rejects_past_capacity() {
        let mut q = NextTickQueue::new(2);
        assert!(q.try_push());
        assert!(q.try_push());
        assert!(!q.try_push());
        q.pop();
        assert!(q.try_push());
    }
}
