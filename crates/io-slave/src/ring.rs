//! Software ring buffer
//!
//! Absorbs bytes the hardware FIFO cannot take yet and hands them back, in
//! order, as FIFO space frees up. Unlike a fixed-size `[u8; N]` ring the
//! storage is borrowed from the caller and every byte of it is usable: the
//! separate `len` counter disambiguates full from empty.
//!
//! The buffer itself is not synchronized. The driver keeps it inside the
//! instance state, which is only reachable from within a critical section.

/// Ring buffer over caller-provided storage
#[derive(Debug, Default)]
pub struct RingBuffer<'a> {
    storage: Option<&'a mut [u8]>,
    write_index: usize,
    read_index: usize,
    len: usize,
}

impl<'a> RingBuffer<'a> {
    /// Create an empty ring using the first `capacity` bytes of `storage`.
    ///
    /// `None` (or zero capacity) yields a disabled ring that accepts nothing.
    pub fn new(storage: Option<&'a mut [u8]>, capacity: usize) -> Self {
        let storage = storage.map(|buf| {
            let cap = capacity.min(buf.len());
            buf.split_at_mut(cap).0
        });
        Self {
            storage,
            write_index: 0,
            read_index: 0,
            len: 0,
        }
    }

    /// Disabled ring with no storage
    pub const fn empty() -> Self {
        Self {
            storage: None,
            write_index: 0,
            read_index: 0,
            len: 0,
        }
    }

    /// Usable bytes
    pub fn capacity(&self) -> usize {
        self.storage.as_deref().map_or(0, <[u8]>::len)
    }

    /// Bytes currently held
    pub fn len(&self) -> usize {
        self.len
    }

    /// True when no bytes are held
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Bytes that can still be written
    pub fn free(&self) -> usize {
        self.capacity().saturating_sub(self.len)
    }

    /// True when backing storage was supplied
    pub fn has_storage(&self) -> bool {
        self.storage.is_some()
    }

    /// Current write index
    pub fn write_index(&self) -> usize {
        self.write_index
    }

    /// Current read index
    pub fn read_index(&self) -> usize {
        self.read_index
    }

    /// Append up to [`free`](Self::free) bytes; returns how many were taken.
    ///
    /// Bytes beyond the free space are rejected, not queued.
    #[allow(clippy::arithmetic_side_effects)] // Safety: write_index < cap; first + rest == to_write <= free <= cap
    #[allow(clippy::indexing_slicing)] // Safety: both ranges end at or before cap, checked by min() above each
    pub fn write(&mut self, data: &[u8]) -> usize {
        let to_write = data.len().min(self.free());
        let Some(buf) = self.storage.as_deref_mut() else {
            return 0;
        };
        if to_write == 0 {
            return 0;
        }
        let cap = buf.len();
        let first = to_write.min(cap - self.write_index);
        let rest = to_write - first;

        buf[self.write_index..self.write_index + first].copy_from_slice(&data[..first]);
        buf[..rest].copy_from_slice(&data[first..to_write]);

        self.write_index = (self.write_index + to_write) % cap;
        self.len += to_write;
        to_write
    }

    /// Held bytes as (contiguous run from the read index, wrapped remainder)
    #[allow(clippy::arithmetic_side_effects)] // Safety: read_index < cap; len <= cap
    #[allow(clippy::indexing_slicing)] // Safety: read_index + first <= cap and rest <= read_index
    pub fn chunks(&self) -> (&[u8], &[u8]) {
        let Some(buf) = self.storage.as_deref() else {
            return (&[], &[]);
        };
        if self.len == 0 {
            return (&[], &[]);
        }
        let first = self.len.min(buf.len() - self.read_index);
        let rest = self.len - first;
        (
            &buf[self.read_index..self.read_index + first],
            &buf[..rest],
        )
    }

    /// Drop `count` bytes from the head (clamped to [`len`](Self::len))
    #[allow(clippy::arithmetic_side_effects)] // Safety: count <= len <= cap, so read_index + count < 2 * cap
    pub fn consume(&mut self, count: usize) {
        let count = count.min(self.len);
        let cap = self.capacity();
        if count == 0 || cap == 0 {
            return;
        }
        self.read_index = (self.read_index + count) % cap;
        self.len -= count;
    }

    /// Move up to `max` bytes from the head into `sink`, in at most two
    /// contiguous chunks; returns the bytes moved.
    ///
    /// The second chunk starts at the beginning of the storage and is only
    /// offered once the first (which runs to the end of the storage) has been
    /// taken in full, so byte order is preserved across the wrap.
    #[allow(clippy::arithmetic_side_effects)] // Safety: take1 + take2 <= max and <= len
    #[allow(clippy::indexing_slicing)] // Safety: take1 <= first.len(), take2 <= rest.len()
    pub fn drain_into(&mut self, max: usize, mut sink: impl FnMut(&[u8])) -> usize {
        let (first, rest) = self.chunks();
        let take1 = first.len().min(max);
        if take1 > 0 {
            sink(&first[..take1]);
        }
        let mut moved = take1;
        if take1 == first.len() {
            let take2 = rest.len().min(max - take1);
            if take2 > 0 {
                sink(&rest[..take2]);
            }
            moved += take2;
        }
        self.consume(moved);
        moved
    }

    /// Reset to empty, keeping the storage
    pub fn clear(&mut self) {
        self.write_index = 0;
        self.read_index = 0;
        self.len = 0;
    }
}
