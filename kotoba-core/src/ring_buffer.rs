//! Fixed-capacity float32 ring buffer for the realtime worker (spec §3,
//! §4.7). Ported near-verbatim from `original_source/src/api/
//! realtime_worker.py`'s `_ring_buffer` / `_write_pos` handling: append in
//! place while there's room, otherwise shift the tail to keep the most
//! recent `capacity` samples.

/// Default capacity: 60 s at 16 kHz mono (spec §5: "≈ 3.75 MB" at f32).
pub const DEFAULT_CAPACITY_SAMPLES: usize = 60 * 16_000;

pub struct AudioRingBuffer {
    samples: Vec<f32>,
    capacity: usize,
    write_pos: usize,
}

impl AudioRingBuffer {
    pub fn new(capacity: usize) -> Self {
        Self {
            samples: vec![0.0; capacity],
            capacity,
            write_pos: 0,
        }
    }

    pub fn with_default_capacity() -> Self {
        Self::new(DEFAULT_CAPACITY_SAMPLES)
    }

    /// Number of valid samples currently buffered.
    pub fn len(&self) -> usize {
        self.write_pos
    }

    pub fn is_empty(&self) -> bool {
        self.write_pos == 0
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Appends a frame, shifting out the oldest samples on overflow so the
    /// buffer always holds the most recent `capacity` samples.
    pub fn push(&mut self, frame: &[f32]) {
        let n = frame.len();
        let space = self.capacity - self.write_pos;

        if n <= space {
            self.samples[self.write_pos..self.write_pos + n].copy_from_slice(frame);
            self.write_pos += n;
            return;
        }

        if n >= self.capacity {
            let tail = &frame[n - self.capacity..];
            self.samples.copy_from_slice(tail);
            self.write_pos = self.capacity;
            return;
        }

        let keep = self.capacity - n;
        self.samples.copy_within(self.write_pos - keep..self.write_pos, 0);
        self.samples[keep..keep + n].copy_from_slice(frame);
        self.write_pos = self.capacity;
    }

    /// Takes a copy of the buffered samples and resets the write position
    /// to zero (the flush operation in spec §4.7 step 3).
    pub fn take(&mut self) -> Vec<f32> {
        let out = self.samples[..self.write_pos].to_vec();
        self.write_pos = 0;
        out
    }

    /// Discards buffered samples without returning them (used when a
    /// flush candidate is below the minimum duration, spec §4.7 step 3).
    pub fn discard(&mut self) {
        self.write_pos = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn appends_in_place_while_there_is_room() {
        let mut buf = AudioRingBuffer::new(10);
        buf.push(&[1.0, 2.0, 3.0]);
        assert_eq!(buf.len(), 3);
        buf.push(&[4.0, 5.0]);
        assert_eq!(buf.len(), 5);
        assert_eq!(buf.take(), vec![1.0, 2.0, 3.0, 4.0, 5.0]);
        assert_eq!(buf.len(), 0);
    }

    #[test]
    fn overflow_shifts_tail_to_keep_most_recent_capacity_samples() {
        let mut buf = AudioRingBuffer::new(5);
        buf.push(&[1.0, 2.0, 3.0, 4.0]);
        buf.push(&[5.0, 6.0, 7.0]); // overflow by 2
        assert_eq!(buf.len(), 5);
        assert_eq!(buf.take(), vec![3.0, 4.0, 5.0, 6.0, 7.0]);
    }

    #[test]
    fn a_single_frame_larger_than_capacity_keeps_only_its_tail() {
        let mut buf = AudioRingBuffer::new(3);
        buf.push(&[1.0, 2.0, 3.0, 4.0, 5.0]);
        assert_eq!(buf.take(), vec![3.0, 4.0, 5.0]);
    }

    #[test]
    fn discard_resets_without_returning_samples() {
        let mut buf = AudioRingBuffer::new(5);
        buf.push(&[1.0, 2.0]);
        buf.discard();
        assert!(buf.is_empty());
    }
}
