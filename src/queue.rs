//! Single-flight outbound queue
//!
//! The raw report protocol has no acknowledgment. Any inbound report counts
//! as "the device is ready for the next one", so at most one report is in
//! flight and the next is only released by a continue signal. This is a
//! known limitation of the protocol, not a delivery guarantee.
//!
//! The queue does no I/O itself: each method returns the report the caller
//! must write now, if any. The owning session serializes all calls.

use std::collections::VecDeque;

use crate::frame::Report;

#[derive(Debug, Default)]
pub struct OutboundQueue {
    pending: VecDeque<Report>,
    sending: bool,
}

impl OutboundQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a report. Returns the report to write if the queue was idle.
    #[must_use = "a returned report must be written"]
    pub fn enqueue(&mut self, report: Report) -> Option<Report> {
        self.pending.push_back(report);
        self.drain()
    }

    /// The device answered: release the next report, if any.
    #[must_use = "a returned report must be written"]
    pub fn on_continue(&mut self) -> Option<Report> {
        self.sending = false;
        self.drain()
    }

    /// A write failed: drop everything, nothing is retried.
    ///
    /// Returns how many queued reports were discarded.
    pub fn on_transport_error(&mut self) -> usize {
        let dropped = self.pending.len();
        self.reset();
        dropped
    }

    /// Clear pending reports and the in-flight mark
    pub fn reset(&mut self) {
        self.pending.clear();
        self.sending = false;
    }

    /// Reports waiting behind the one in flight
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    pub fn is_sending(&self) -> bool {
        self.sending
    }

    fn drain(&mut self) -> Option<Report> {
        if self.sending {
            return None;
        }
        let next = self.pending.pop_front()?;
        self.sending = true;
        Some(next)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report(tag: u8) -> Report {
        Report::padded(&[tag], 4).unwrap()
    }

    #[test]
    fn test_first_enqueue_sends_immediately() {
        let mut q = OutboundQueue::new();
        assert_eq!(q.enqueue(report(0xA)), Some(report(0xA)));
        assert!(q.is_sending());
        assert_eq!(q.enqueue(report(0xB)), None);
        assert_eq!(q.len(), 1);
    }

    #[test]
    fn test_continue_releases_in_order() {
        let mut q = OutboundQueue::new();
        let mut written = Vec::new();
        for tag in 1..=5 {
            written.extend(q.enqueue(report(tag)));
        }
        assert_eq!(written.len(), 1);
        for _ in 0..5 {
            written.extend(q.on_continue());
        }
        assert_eq!(written, (1..=5).map(report).collect::<Vec<_>>());
        assert!(!q.is_sending());
        assert!(q.is_empty());
    }

    #[test]
    fn test_continue_while_idle_is_harmless() {
        let mut q = OutboundQueue::new();
        assert_eq!(q.on_continue(), None);
        assert!(!q.is_sending());
    }

    #[test]
    fn test_transport_error_empties_queue() {
        let mut q = OutboundQueue::new();
        let _ = q.enqueue(report(1));
        let _ = q.enqueue(report(2));
        let _ = q.enqueue(report(3));
        assert_eq!(q.on_transport_error(), 2);
        assert!(!q.is_sending());
        assert_eq!(q.on_continue(), None);
        // New work flows again
        assert_eq!(q.enqueue(report(4)), Some(report(4)));
    }

    #[test]
    fn test_reset_clears_in_flight_mark() {
        let mut q = OutboundQueue::new();
        let _ = q.enqueue(report(1));
        let _ = q.enqueue(report(2));
        q.reset();
        assert!(q.is_empty());
        assert_eq!(q.enqueue(report(3)), Some(report(3)));
    }
}
