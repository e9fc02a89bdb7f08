//! Frame buffer for STX/ETX delimited responses
//!
//! Serial reads arrive in arbitrary chunks. The buffer accumulates them and
//! hands out complete frames only.

use bytes::{Bytes, BytesMut};
use tracing::{trace, warn};

use crate::constants::{DEFAULT_BUFFER_CAPACITY, ETX, STX};

/// Accumulates raw bytes and extracts complete frames
///
/// # Frame Structure
///
/// ```text
/// ┌───────┬─────────┬──────┬──────────────────────┬───────┐
/// │  STX  │ Address │ Sign │        Value         │  ETX  │
/// │ 0x02  │ 1 byte  │ +/-  │ digits, '.', ' ', '_'│ 0x03  │
/// └───────┴─────────┴──────┴──────────────────────┴───────┘
/// ```
///
/// When an append pushes the buffer past its capacity, only the most recent
/// `capacity / 2` bytes are kept.
///
/// # Examples
///
/// ```
/// use forcelink_core::FrameBuffer;
///
/// let mut buffer = FrameBuffer::new();
/// buffer.append(b"\x021+");
/// assert!(buffer.try_extract_frame().is_none());
///
/// buffer.append(b"_7487\x03");
/// let frame = buffer.try_extract_frame().unwrap();
/// assert_eq!(frame.as_ref(), b"\x021+_7487\x03");
/// ```
#[derive(Debug, Clone)]
pub struct FrameBuffer {
    buf: BytesMut,
    max_capacity: usize,
}

impl FrameBuffer {
    /// Create a buffer with the default capacity
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_BUFFER_CAPACITY)
    }

    /// Create a buffer holding at most `max_capacity` bytes
    ///
    /// A capacity below 2 would truncate to nothing, so it is raised to 2.
    pub fn with_capacity(max_capacity: usize) -> Self {
        let max_capacity = max_capacity.max(2);
        Self {
            buf: BytesMut::with_capacity(max_capacity),
            max_capacity,
        }
    }

    /// Append incoming bytes
    pub fn append(&mut self, data: &[u8]) {
        if data.is_empty() {
            return;
        }

        self.buf.extend_from_slice(data);

        if self.buf.len() > self.max_capacity {
            let keep = self.max_capacity / 2;
            let dropped = self.buf.len() - keep;
            let _ = self.buf.split_to(dropped);

            warn!(
                dropped,
                kept = keep,
                capacity = self.max_capacity,
                "Frame buffer overflow, truncated"
            );
        }

        trace!("Buffered {} bytes (total: {})", data.len(), self.buf.len());
    }

    /// Extract the next complete frame, if any
    ///
    /// Bytes in front of the first STX are discarded. Without any STX the
    /// whole buffer is discarded. An incomplete frame stays buffered.
    pub fn try_extract_frame(&mut self) -> Option<Bytes> {
        let Some(start) = self.buf.iter().position(|&b| b == STX) else {
            if !self.buf.is_empty() {
                trace!("Discarding {} bytes without STX", self.buf.len());
            }
            self.buf.clear();
            return None;
        };

        if start > 0 {
            trace!("Dropping {} bytes of noise before STX", start);
            let _ = self.buf.split_to(start);
        }

        let end = self.buf[1..].iter().position(|&b| b == ETX)? + 1;
        let frame = self.buf.split_to(end + 1).freeze();

        trace!("Extracted frame: {}", hex::encode_upper(&frame));

        Some(frame)
    }

    /// Discard everything buffered
    pub fn clear(&mut self) {
        self.buf.clear();
    }

    /// Number of buffered bytes
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    /// Check if nothing is buffered
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Maximum number of buffered bytes
    pub fn capacity(&self) -> usize {
        self.max_capacity
    }

    /// Buffered bytes, for diagnostics
    pub fn as_bytes(&self) -> &[u8] {
        &self.buf
    }
}

impl Default for FrameBuffer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    const FRAME: &[u8] = b"\x021+_7.487\x03";

    #[test]
    fn test_extract_single_frame() {
        let mut buffer = FrameBuffer::new();
        buffer.append(FRAME);

        assert_eq!(buffer.try_extract_frame().unwrap().as_ref(), FRAME);
        assert!(buffer.is_empty());
    }

    #[test]
    fn test_split_frame_across_appends() {
        let mut buffer = FrameBuffer::new();

        buffer.append(b"\x021+");
        assert!(buffer.try_extract_frame().is_none());
        assert_eq!(buffer.len(), 3);

        buffer.append(b"_7487\x03");
        assert_eq!(
            buffer.try_extract_frame().unwrap().as_ref(),
            b"\x021+_7487\x03"
        );
        assert!(buffer.try_extract_frame().is_none());
    }

    #[test]
    fn test_noise_before_stx_is_dropped() {
        let mut buffer = FrameBuffer::new();
        buffer.append(b"\xFFgarbage");
        buffer.append(FRAME);

        assert_eq!(buffer.try_extract_frame().unwrap().as_ref(), FRAME);
    }

    #[test]
    fn test_garbage_without_stx_is_cleared() {
        let mut buffer = FrameBuffer::new();
        buffer.append(b"no frame here\x03");

        assert!(buffer.try_extract_frame().is_none());
        assert!(buffer.is_empty());
    }

    #[test]
    fn test_incomplete_frame_is_kept() {
        let mut buffer = FrameBuffer::new();
        buffer.append(b"xx\x022-_74");

        assert!(buffer.try_extract_frame().is_none());
        // noise dropped, partial frame retained
        assert_eq!(buffer.as_bytes(), b"\x022-_74");
    }

    #[test]
    fn test_multiple_frames_in_one_append() {
        let mut buffer = FrameBuffer::new();
        buffer.append(b"\x021+_7.487\x03\x022-_74.86\x03\x023+");

        assert_eq!(buffer.try_extract_frame().unwrap().as_ref(), b"\x021+_7.487\x03");
        assert_eq!(buffer.try_extract_frame().unwrap().as_ref(), b"\x022-_74.86\x03");
        assert!(buffer.try_extract_frame().is_none());
        assert_eq!(buffer.as_bytes(), b"\x023+");
    }

    #[test]
    fn test_short_frame_is_still_returned() {
        let mut buffer = FrameBuffer::new();
        buffer.append(b"\x02\x03");

        assert_eq!(buffer.try_extract_frame().unwrap().as_ref(), b"\x02\x03");
    }

    #[test]
    fn test_etx_at_start_is_not_an_end() {
        let mut buffer = FrameBuffer::new();
        buffer.append(b"\x02");
        assert!(buffer.try_extract_frame().is_none());
        assert_eq!(buffer.len(), 1);
    }

    #[test]
    fn test_overflow_truncates_to_half_capacity() {
        let mut buffer = FrameBuffer::with_capacity(1024);
        let data: Vec<u8> = std::iter::repeat(b'A').take(2000).collect();

        buffer.append(&data);
        assert_eq!(buffer.len(), 512);

        assert!(buffer.try_extract_frame().is_none());
    }

    #[test]
    fn test_overflow_keeps_most_recent_bytes() {
        let mut buffer = FrameBuffer::with_capacity(8);
        buffer.append(b"0123456");
        buffer.append(b"789");

        assert_eq!(buffer.as_bytes(), b"6789");
    }

    #[test]
    fn test_clear() {
        let mut buffer = FrameBuffer::new();
        buffer.append(b"\x021+");
        buffer.clear();
        assert!(buffer.is_empty());
        assert_eq!(buffer.capacity(), DEFAULT_BUFFER_CAPACITY);
    }

    proptest! {
        #[test]
        fn prop_fragmentation_yields_same_frame(
            cuts in proptest::collection::vec(0usize..FRAME.len(), 0..4)
        ) {
            let mut whole = FrameBuffer::new();
            whole.append(FRAME);
            let expected = whole.try_extract_frame();

            let mut cuts = cuts;
            cuts.sort_unstable();
            cuts.dedup();

            let mut split = FrameBuffer::new();
            let mut extracted = None;
            let mut last = 0;
            for cut in cuts.into_iter().chain(std::iter::once(FRAME.len())) {
                split.append(&FRAME[last..cut]);
                last = cut;
                if let Some(frame) = split.try_extract_frame() {
                    prop_assert!(extracted.is_none());
                    extracted = Some(frame);
                }
            }

            prop_assert_eq!(extracted, expected);
        }
    }
}
