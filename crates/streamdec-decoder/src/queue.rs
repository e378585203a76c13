use std::collections::VecDeque;

use crate::io::PullSource;

/// Append-only byte buffer read from the front by the demuxer.
///
/// In journal mode pulled bytes stay buffered behind a cursor, so the reader
/// can be moved back to any position that has not been released yet. A failed
/// container open or a packet cut short by an empty queue is replayed this way
/// once more input arrives. Positions are absolute offsets into the pushed
/// stream.
#[derive(Debug, Default)]
pub struct InputQueue {
    bytes: VecDeque<u8>,
    // Stream position of `bytes[0]`.
    base: u64,
    cursor: usize,
    journaling: bool,
    starved: bool,
}

impl InputQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, data: &[u8]) {
        self.bytes.extend(data);
    }

    /// Bytes that have been pushed and not yet handed to the demuxer.
    pub fn available(&self) -> usize {
        self.bytes.len() - self.cursor
    }

    pub fn is_empty(&self) -> bool {
        self.available() == 0
    }

    /// Stream position of the next byte handed to the demuxer.
    pub fn position(&self) -> u64 {
        self.base + self.cursor as u64
    }

    /// Stream position one past the last pushed byte.
    pub fn end(&self) -> u64 {
        self.base + self.bytes.len() as u64
    }

    /// Copies up to `limit` unread bytes without consuming them.
    pub fn peek(&self, limit: usize) -> Vec<u8> {
        self.bytes
            .iter()
            .skip(self.cursor)
            .take(limit)
            .copied()
            .collect()
    }

    pub fn begin_journal(&mut self) {
        self.cursor = 0;
        self.journaling = true;
        self.starved = false;
    }

    /// Makes every retained byte readable again.
    pub fn rewind(&mut self) {
        self.cursor = 0;
    }

    /// Moves the read position back or forward within the retained bytes.
    ///
    /// Returns `false`, leaving the cursor alone, when `position` was already
    /// released or has not been pushed yet.
    pub fn seek(&mut self, position: u64) -> bool {
        if position < self.base || position > self.end() {
            return false;
        }
        self.cursor = (position - self.base) as usize;
        true
    }

    /// Forgets bytes before `position`; they can no longer be replayed.
    ///
    /// Unread bytes are never released.
    pub fn release_to(&mut self, position: u64) {
        let count = position.saturating_sub(self.base).min(self.cursor as u64) as usize;
        self.bytes.drain(..count);
        self.base += count as u64;
        self.cursor -= count;
    }

    /// Reports whether a pull found the queue empty since the last call, and
    /// clears the flag.
    pub fn take_starved(&mut self) -> bool {
        std::mem::take(&mut self.starved)
    }
}

impl PullSource for InputQueue {
    fn pull(&mut self, dst: &mut [u8]) -> usize {
        let count = dst.len().min(self.available());
        if count == 0 {
            if !dst.is_empty() {
                self.starved = true;
            }
            return 0;
        }

        let start = self.cursor;
        for (slot, byte) in dst.iter_mut().zip(self.bytes.range(start..start + count)) {
            *slot = *byte;
        }

        if self.journaling {
            self.cursor += count;
        } else {
            self.bytes.drain(..count);
            self.base += count as u64;
        }
        count
    }
}
