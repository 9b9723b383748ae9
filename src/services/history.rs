//! Sliding window of recent posture labels for one body region
//!
//! The window is a fixed-capacity ring: each push evicts the oldest label once
//! full, and nothing else ever removes entries. An alert is due when the
//! window is full of one identical non-upright label, so a single upright
//! frame anywhere in the window holds the alert back until it ages out.
//!
//! After an alert fires the gate stays closed until the whole window has been
//! replaced by fresh observations. A posture held for `k` windows therefore
//! alerts `k` times rather than on every frame.

use crate::domain::posture::{PostureLabel, Region};
use std::collections::VecDeque;

/// Number of observations needed to cover `alert_duration_secs` at `fps`.
///
/// Only about every other captured frame yields a usable detection, hence
/// the halving. Never less than 1.
pub fn window_capacity(alert_duration_secs: f64, fps: f64) -> usize {
    let frames = (alert_duration_secs * fps / 2.0).floor();
    if frames.is_finite() && frames >= 1.0 {
        frames as usize
    } else {
        1
    }
}

#[derive(Debug, Clone)]
pub struct RegionHistoryBuffer {
    region: Region,
    capacity: usize,
    labels: VecDeque<PostureLabel>,
    /// Pushes since the last alert (`None` until the first alert)
    since_alert: Option<usize>,
}

impl RegionHistoryBuffer {
    pub fn new(region: Region, capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self { region, capacity, labels: VecDeque::with_capacity(capacity), since_alert: None }
    }

    /// Append an observation, evicting the oldest when at capacity
    pub fn push(&mut self, label: PostureLabel) {
        if self.labels.len() == self.capacity {
            self.labels.pop_front();
        }
        self.labels.push_back(label);
        if let Some(count) = self.since_alert.as_mut() {
            *count = count.saturating_add(1);
        }
    }

    /// True when the window is full and every entry is the same non-upright
    /// label. Ignores the post-alert cooldown; see [`Self::take_alert`].
    pub fn alert_condition_met(&self) -> bool {
        self.is_full() && self.uniform_label().is_some_and(|label| !label.is_upright())
    }

    /// The label shared by every entry, if the window is non-empty and uniform
    pub fn uniform_label(&self) -> Option<PostureLabel> {
        let first = *self.labels.front()?;
        self.labels.iter().all(|&l| l == first).then_some(first)
    }

    /// Consume a pending alert.
    ///
    /// Returns the triggering label when the alert condition holds and the
    /// window has fully refreshed since the previous alert, then closes the
    /// gate for the next `capacity` pushes.
    pub fn take_alert(&mut self) -> Option<PostureLabel> {
        if !self.alert_condition_met() || !self.cooled_down() {
            return None;
        }
        self.since_alert = Some(0);
        self.uniform_label()
    }

    /// False while the window still holds observations from before the last alert
    pub fn cooled_down(&self) -> bool {
        self.since_alert.map_or(true, |count| count >= self.capacity)
    }

    /// Oldest label in the window, used for live display
    pub fn current_label(&self) -> Option<PostureLabel> {
        self.labels.front().copied()
    }

    pub fn region(&self) -> Region {
        self.region
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.labels.len() == self.capacity
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use PostureLabel::{ForwardLeaning, Reclined, Upright};

    fn filled(capacity: usize, labels: &[PostureLabel]) -> RegionHistoryBuffer {
        let mut buffer = RegionHistoryBuffer::new(Region::Back, capacity);
        for &label in labels {
            buffer.push(label);
        }
        buffer
    }

    #[test]
    fn test_window_capacity() {
        assert_eq!(window_capacity(10.0, 19.0), 95);
        assert_eq!(window_capacity(10.0, 30.0), 150);
        assert_eq!(window_capacity(1.0, 1.0), 1);
        assert_eq!(window_capacity(0.0, 30.0), 1);
        assert_eq!(window_capacity(f64::NAN, 30.0), 1);
    }

    #[test]
    fn test_full_window_of_same_incorrect_label_alerts() {
        let buffer = filled(5, &[ForwardLeaning; 5]);
        assert!(buffer.alert_condition_met());
        assert_eq!(buffer.uniform_label(), Some(ForwardLeaning));
    }

    #[test]
    fn test_partial_window_does_not_alert() {
        let buffer = filled(5, &[Reclined; 4]);
        assert!(!buffer.is_full());
        assert!(!buffer.alert_condition_met());
    }

    #[test]
    fn test_single_upright_blocks_alert() {
        let buffer = filled(5, &[Reclined, Reclined, Reclined, Reclined, Upright]);
        assert!(buffer.is_full());
        assert!(!buffer.alert_condition_met());
    }

    #[test]
    fn test_upright_window_never_alerts() {
        let buffer = filled(3, &[Upright; 3]);
        assert!(!buffer.alert_condition_met());
    }

    #[test]
    fn test_mixed_incorrect_labels_do_not_alert() {
        let buffer = filled(4, &[Reclined, ForwardLeaning, Reclined, Reclined]);
        assert!(!buffer.alert_condition_met());
    }

    #[test]
    fn test_upright_ages_out_by_capacity_only() {
        let mut buffer = filled(3, &[Upright, ForwardLeaning, ForwardLeaning]);
        assert!(!buffer.alert_condition_met());

        buffer.push(ForwardLeaning);
        assert!(buffer.alert_condition_met());
    }

    #[test]
    fn test_length_never_exceeds_capacity() {
        let mut buffer = RegionHistoryBuffer::new(Region::Neck, 7);
        for i in 0..100 {
            buffer.push(if i % 3 == 0 { Upright } else { ForwardLeaning });
            assert!(buffer.len() <= 7);
        }
        assert_eq!(buffer.len(), 7);
    }

    #[test]
    fn test_current_label_is_oldest_entry() {
        let mut buffer = RegionHistoryBuffer::new(Region::Back, 2);
        assert_eq!(buffer.current_label(), None);

        buffer.push(Upright);
        buffer.push(Reclined);
        assert_eq!(buffer.current_label(), Some(Upright));

        buffer.push(ForwardLeaning);
        assert_eq!(buffer.current_label(), Some(Reclined));
    }

    #[test]
    fn test_zero_capacity_is_clamped() {
        let buffer = RegionHistoryBuffer::new(Region::Back, 0);
        assert_eq!(buffer.capacity(), 1);
    }

    #[test]
    fn test_take_alert_waits_for_full_refresh() {
        let mut buffer = filled(3, &[ForwardLeaning; 3]);
        assert_eq!(buffer.take_alert(), Some(ForwardLeaning));

        // condition still holds but the window has not been replaced yet
        for _ in 0..2 {
            buffer.push(ForwardLeaning);
            assert!(buffer.alert_condition_met());
            assert_eq!(buffer.take_alert(), None);
        }

        buffer.push(ForwardLeaning);
        assert_eq!(buffer.take_alert(), Some(ForwardLeaning));
    }

    #[test]
    fn test_take_alert_reports_new_label_after_change() {
        let mut buffer = filled(2, &[ForwardLeaning; 2]);
        assert_eq!(buffer.take_alert(), Some(ForwardLeaning));

        buffer.push(Reclined);
        buffer.push(Reclined);
        assert_eq!(buffer.take_alert(), Some(Reclined));
    }
}
