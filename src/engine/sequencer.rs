use crate::core::{ResultStatus, Window, WindowId, WindowResult};
use std::collections::BTreeMap;
use tokio::time::Instant;

enum Slot {
    Awaiting { header: WindowResult, deadline: Instant },
    Resolved(WindowResult),
}

/// Releases window results strictly in window-id order.
///
/// Every dispatched window is registered here; a result is held back until all
/// lower ids are resolved, either by a backend answer or by a placeholder.
pub struct ResultSequencer {
    session: u64,
    slots: BTreeMap<WindowId, Slot>,
    watermark: Option<WindowId>,
}

impl ResultSequencer {
    pub fn new(session: u64) -> Self {
        Self {
            session,
            slots: BTreeMap::new(),
            watermark: None,
        }
    }

    pub fn register(&mut self, window: &Window, deadline: Instant) {
        debug_assert!(self.watermark.map_or(true, |w| window.id() > w));
        let header = WindowResult::from_window(self.session, window, ResultStatus::TimedOut);
        self.slots
            .insert(window.id(), Slot::Awaiting { header, deadline });
    }

    /// Move the deadline of an awaiting window (new attempt)
    pub fn set_deadline(&mut self, id: WindowId, new_deadline: Instant) {
        if let Some(Slot::Awaiting { deadline, .. }) = self.slots.get_mut(&id) {
            *deadline = new_deadline;
        }
    }

    /// Resolve an awaiting window. Returns false for unknown or already
    /// resolved ids, i.e. a late answer.
    pub fn resolve(&mut self, id: WindowId, status: ResultStatus) -> bool {
        let Some(slot) = self.slots.get_mut(&id) else {
            return false;
        };
        let mut result = match slot {
            Slot::Awaiting { header, .. } => header.clone(),
            Slot::Resolved(_) => return false,
        };
        result.status = status;
        *slot = Slot::Resolved(result);
        true
    }

    /// Resolve every window whose deadline has passed as `TimedOut`
    pub fn expire(&mut self, now: Instant) -> Vec<WindowId> {
        let expired: Vec<WindowId> = self
            .slots
            .iter()
            .filter_map(|(id, slot)| match slot {
                Slot::Awaiting { deadline, .. } if *deadline <= now => Some(*id),
                _ => None,
            })
            .collect();
        for id in &expired {
            self.resolve(*id, ResultStatus::TimedOut);
        }
        expired
    }

    /// Resolve everything still awaiting with `status`
    pub fn resolve_all(&mut self, status: ResultStatus) -> Vec<WindowId> {
        let awaiting: Vec<WindowId> = self
            .slots
            .iter()
            .filter(|(_, slot)| matches!(slot, Slot::Awaiting { .. }))
            .map(|(id, _)| *id)
            .collect();
        for id in &awaiting {
            self.resolve(*id, status.clone());
        }
        awaiting
    }

    /// Pop the resolved prefix in id order
    pub fn release(&mut self) -> Vec<WindowResult> {
        let mut released = Vec::new();
        while let Some(entry) = self.slots.first_entry() {
            if !matches!(entry.get(), Slot::Resolved(_)) {
                break;
            }
            let (id, slot) = entry.remove_entry();
            if let Slot::Resolved(result) = slot {
                self.watermark = Some(id);
                released.push(result);
            }
        }
        released
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        self.slots
            .values()
            .filter_map(|slot| match slot {
                Slot::Awaiting { deadline, .. } => Some(*deadline),
                Slot::Resolved(_) => None,
            })
            .min()
    }

    /// Highest window id released to the consumer
    pub fn watermark(&self) -> Option<WindowId> {
        self.watermark
    }

    pub fn awaiting(&self) -> usize {
        self.slots
            .values()
            .filter(|slot| matches!(slot, Slot::Awaiting { .. }))
            .count()
    }

    /// Nothing left to release
    pub fn is_drained(&self) -> bool {
        self.slots.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{EstimationResult, Frame, PixelFormat};
    use std::time::Duration;

    fn window(id: u64) -> Window {
        let frame = Frame::new(id * 1_000, id, 1, 1, PixelFormat::Gray8, vec![0]);
        Window::new(WindowId(id), vec![frame], 0)
    }

    fn estimated(id: u64) -> ResultStatus {
        ResultStatus::Estimated(EstimationResult::empty(WindowId(id)))
    }

    fn ids(results: &[WindowResult]) -> Vec<u64> {
        results.iter().map(|r| r.window_id.value()).collect()
    }

    #[test]
    fn test_out_of_order_answers_release_in_order() {
        let deadline = Instant::now() + Duration::from_secs(10);
        let mut seq = ResultSequencer::new(1);
        for id in 1..=3 {
            seq.register(&window(id), deadline);
        }

        assert!(seq.resolve(WindowId(2), estimated(2)));
        assert!(seq.release().is_empty());
        assert!(seq.resolve(WindowId(3), estimated(3)));
        assert!(seq.release().is_empty());
        assert!(seq.resolve(WindowId(1), estimated(1)));

        assert_eq!(ids(&seq.release()), vec![1, 2, 3]);
        assert_eq!(seq.watermark(), Some(WindowId(3)));
        assert!(seq.is_drained());
    }

    #[test]
    fn test_late_answer_is_rejected() {
        let now = Instant::now();
        let mut seq = ResultSequencer::new(1);
        seq.register(&window(1), now);

        assert_eq!(seq.expire(now), vec![WindowId(1)]);
        assert!(!seq.resolve(WindowId(1), estimated(1)));

        let released = seq.release();
        assert_eq!(released[0].status, ResultStatus::TimedOut);
        assert!(!seq.resolve(WindowId(1), estimated(1)));
    }

    #[test]
    fn test_stuck_head_times_out() {
        let now = Instant::now();
        let mut seq = ResultSequencer::new(1);
        seq.register(&window(1), now + Duration::from_millis(100));
        seq.register(&window(2), now + Duration::from_millis(200));
        seq.resolve(WindowId(2), estimated(2));

        assert_eq!(seq.next_deadline(), Some(now + Duration::from_millis(100)));
        assert!(seq.expire(now).is_empty());
        seq.expire(now + Duration::from_millis(100));

        let released = seq.release();
        assert_eq!(ids(&released), vec![1, 2]);
        assert_eq!(released[0].status, ResultStatus::TimedOut);
        assert!(released[1].is_estimated());
    }

    #[test]
    fn test_resolve_all() {
        let deadline = Instant::now() + Duration::from_secs(1);
        let mut seq = ResultSequencer::new(4);
        seq.register(&window(1), deadline);
        seq.register(&window(2), deadline);
        seq.resolve(WindowId(2), estimated(2));

        assert_eq!(seq.resolve_all(ResultStatus::Abandoned), vec![WindowId(1)]);
        let released = seq.release();
        assert_eq!(released[0].status, ResultStatus::Abandoned);
        assert_eq!(released[0].session, 4);
        assert_eq!(seq.awaiting(), 0);
    }
}
