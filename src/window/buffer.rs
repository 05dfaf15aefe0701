use super::{WindowConfig, WindowLength};
use crate::core::{Frame, Window, WindowId};
use crate::error::Result;
use log::debug;

/// Accumulates frames in arrival order and seals them into windows.
pub struct WindowBuffer {
    config: WindowConfig,
    open: Vec<Frame>,
    /// Leading frames of `open` that were carried over from the last window
    carried: usize,
    next_id: WindowId,
}

impl WindowBuffer {
    pub fn new(config: WindowConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            open: Vec::new(),
            carried: 0,
            next_id: WindowId(1),
        })
    }

    pub fn config(&self) -> &WindowConfig {
        &self.config
    }

    /// Append a frame, returning the sealed window if the threshold was reached
    pub fn push(&mut self, frame: Frame) -> Option<Window> {
        self.open.push(frame);
        if self.is_full() {
            Some(self.seal(true))
        } else {
            None
        }
    }

    /// Seal the partial window. Returns `None` when it holds nothing but
    /// carry-over, since those frames were already dispatched.
    pub fn flush(&mut self) -> Option<Window> {
        if self.fresh_pending() == 0 {
            self.open.clear();
            self.carried = 0;
            return None;
        }
        Some(self.seal(false))
    }

    /// Drop all buffered frames and restart the id sequence
    pub fn reset(&mut self) -> usize {
        let discarded = self.fresh_pending();
        self.open.clear();
        self.carried = 0;
        self.next_id = WindowId(1);
        discarded
    }

    /// Frames currently in the open window, carry-over included
    pub fn pending(&self) -> usize {
        self.open.len()
    }

    /// Frames in the open window that no sealed window contains yet
    pub fn fresh_pending(&self) -> usize {
        self.open.len() - self.carried
    }

    pub fn next_id(&self) -> WindowId {
        self.next_id
    }

    fn is_full(&self) -> bool {
        match self.config.length {
            WindowLength::Frames(n) => self.open.len() >= n,
            WindowLength::DurationMs(ms) => match (self.open.first(), self.open.last()) {
                (Some(first), Some(last)) => {
                    last.timestamp_us.saturating_sub(first.timestamp_us) >= ms.saturating_mul(1000)
                }
                _ => false,
            },
        }
    }

    fn seal(&mut self, carry_over: bool) -> Window {
        let frames = std::mem::take(&mut self.open);
        let window = Window::new(self.next_id, frames, self.carried);
        self.next_id = self.next_id.next();

        self.carried = if carry_over {
            self.config.carry_for(window.len())
        } else {
            0
        };
        let tail = window.len() - self.carried;
        self.open.extend_from_slice(&window.frames()[tail..]);

        debug!(
            "sealed window {} ({} frames, {} carried in, {} carried out)",
            window.id(),
            window.len(),
            window.carried(),
            self.carried
        );
        window
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::PixelFormat;
    use std::sync::Arc;

    fn frame(seq: u64) -> Frame {
        Frame::new(seq * 33_333, seq, 2, 2, PixelFormat::Gray8, vec![seq as u8; 4])
    }

    fn run(config: WindowConfig, n: u64) -> Vec<Window> {
        let mut buffer = WindowBuffer::new(config).unwrap();
        let mut windows: Vec<Window> = (0..n).filter_map(|i| buffer.push(frame(i))).collect();
        windows.extend(buffer.flush());
        windows
    }

    fn expected_count(len: usize, carry: usize, n: usize) -> usize {
        let step = len - carry;
        1 + (n.saturating_sub(len) + step - 1) / step
    }

    #[test]
    fn test_seals_at_frame_count() {
        let mut buffer = WindowBuffer::new(WindowConfig::frames(3)).unwrap();
        assert!(buffer.push(frame(0)).is_none());
        assert!(buffer.push(frame(1)).is_none());
        let window = buffer.push(frame(2)).unwrap();

        assert_eq!(window.id(), WindowId(1));
        assert_eq!(window.len(), 3);
        assert_eq!(window.start_timestamp_us(), 0);
        assert_eq!(buffer.pending(), 0);
        assert_eq!(buffer.next_id(), WindowId(2));
    }

    #[test]
    fn test_window_count_without_overlap() {
        for n in 1..=23u64 {
            let windows = run(WindowConfig::frames(5), n);
            assert_eq!(windows.len(), (n as usize + 4) / 5, "n = {}", n);
        }
    }

    #[test]
    fn test_window_count_with_overlap() {
        let config = WindowConfig::frames(5).with_overlap(0.4);
        for n in 1..=30usize {
            let windows = run(config, n as u64);
            assert_eq!(windows.len(), expected_count(5, 2, n), "n = {}", n);
        }
    }

    #[test]
    fn test_every_frame_is_covered_and_ids_increase() {
        let windows = run(WindowConfig::frames(7).with_overlap(0.3), 40);

        let mut seen: Vec<u64> = windows
            .iter()
            .flat_map(|w| w.fresh_frames().iter().map(|f| f.sequence))
            .collect();
        seen.sort_unstable();
        assert_eq!(seen, (0..40).collect::<Vec<_>>());

        for pair in windows.windows(2) {
            assert!(pair[1].id() > pair[0].id());
        }
    }

    #[test]
    fn test_only_overlap_frames_are_shared() {
        let windows = run(WindowConfig::frames(6).with_overlap(0.5), 20);
        for pair in windows.windows(2) {
            let shared: Vec<u64> = pair[1]
                .frames()
                .iter()
                .filter(|f| pair[0].frames().iter().any(|g| g.sequence == f.sequence))
                .map(|f| f.sequence)
                .collect();
            assert_eq!(shared.len(), pair[1].carried());
        }
    }

    #[test]
    fn test_carry_over_keeps_original_frames() {
        let mut buffer = WindowBuffer::new(WindowConfig::frames(4).with_overlap(0.5)).unwrap();
        let first = (0..4).filter_map(|i| buffer.push(frame(i))).next().unwrap();
        let second = (4..6).filter_map(|i| buffer.push(frame(i))).next().unwrap();

        assert_eq!(second.carried(), 2);
        assert_eq!(second.frames()[0].sequence, 2);
        assert_eq!(second.frames()[0].timestamp_us, first.frames()[2].timestamp_us);
        assert!(Arc::ptr_eq(&second.frames()[0].data, &first.frames()[2].data));
    }

    #[test]
    fn test_flush_partial_window() {
        let mut buffer = WindowBuffer::new(WindowConfig::frames(5)).unwrap();
        for i in 0..3 {
            assert!(buffer.push(frame(i)).is_none());
        }
        let window = buffer.flush().unwrap();
        assert_eq!(window.len(), 3);
        assert!(buffer.flush().is_none());
    }

    #[test]
    fn test_flush_discards_carry_only_window() {
        let mut buffer = WindowBuffer::new(WindowConfig::frames(4).with_overlap(0.5)).unwrap();
        for i in 0..4 {
            buffer.push(frame(i));
        }
        assert_eq!(buffer.pending(), 2);
        assert!(buffer.flush().is_none());
        assert_eq!(buffer.pending(), 0);
    }

    #[test]
    fn test_duration_window() {
        let mut buffer = WindowBuffer::new(WindowConfig::duration_ms(100)).unwrap();
        // 25 ms spacing: span reaches 100 ms at the fifth frame
        let sealed: Vec<Window> = (0..10u64)
            .filter_map(|i| {
                let f = Frame::new(i * 25_000, i, 2, 2, PixelFormat::Gray8, vec![0; 4]);
                buffer.push(f)
            })
            .collect();
        assert_eq!(sealed.len(), 2);
        assert_eq!(sealed[0].len(), 5);
        assert_eq!(sealed[1].frames()[0].sequence, 5);
        assert!(sealed[0].end_timestamp_us() - sealed[0].start_timestamp_us() >= 100_000);
    }

    #[test]
    fn test_longest_duration_window_does_not_overflow() {
        let config = WindowConfig::duration_ms(crate::window::config::MAX_DURATION_MS);
        let mut buffer = WindowBuffer::new(config).unwrap();
        assert!(buffer.push(frame(0)).is_none());
        assert!(buffer.push(frame(1)).is_none());

        let last = Frame::new(u64::MAX, 2, 2, 2, PixelFormat::Gray8, vec![0; 4]);
        let window = buffer.push(last).unwrap();
        assert_eq!(window.len(), 3);
    }

    #[test]
    fn test_reset_restarts_ids() {
        let mut buffer = WindowBuffer::new(WindowConfig::frames(2)).unwrap();
        buffer.push(frame(0));
        buffer.push(frame(1));
        buffer.push(frame(2));
        assert_eq!(buffer.reset(), 1);
        assert_eq!(buffer.next_id(), WindowId(1));
        assert_eq!(buffer.pending(), 0);
    }
}
