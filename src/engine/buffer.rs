//! Fetch buffer
//!
//! Rows fetched but not yet delivered, plus the window bookkeeping. Rows
//! leave from the front as requests are served and arrive at the back one
//! whole window at a time.

use std::collections::VecDeque;

use crate::source::Row;

use super::request::Amount;

/// Buffered rows and window bookkeeping for one session
#[derive(Debug)]
pub struct FetchBuffer {
    rows: VecDeque<Row>,
    next_window_index: usize,
    exhausted: bool,
    window_size: usize,
}

impl FetchBuffer {
    pub fn new(window_size: usize) -> Self {
        Self {
            rows: VecDeque::new(),
            next_window_index: 0,
            exhausted: false,
            window_size,
        }
    }

    /// Rows buffered and not yet delivered
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Index of the window the next fetch must request
    pub fn next_window_index(&self) -> usize {
        self.next_window_index
    }

    /// True once a short window has been seen; nothing more will be fetched
    pub fn is_exhausted(&self) -> bool {
        self.exhausted
    }

    pub fn window_size(&self) -> usize {
        self.window_size
    }

    /// Whether a request for `amount` can be answered without fetching
    pub fn can_satisfy(&self, amount: Amount) -> bool {
        self.exhausted || amount.fits(self.rows.len())
    }

    /// Remove up to `amount` rows from the front
    pub fn take(&mut self, amount: Amount) -> Vec<Row> {
        let n = amount.clamp(self.rows.len());
        self.rows.drain(..n).collect()
    }

    /// Append the next window. Returns true if it exhausted the source.
    pub fn append_window(&mut self, rows: Vec<Row>) -> bool {
        let short = rows.is_empty() || rows.len() < self.window_size;
        self.rows.extend(rows);
        self.next_window_index += 1;
        if short {
            self.exhausted = true;
        }
        short
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn window(start: usize, len: usize) -> Vec<Row> {
        (start..start + len).map(|i| json!(i)).collect()
    }

    #[test]
    fn test_full_window_does_not_exhaust() {
        let mut buffer = FetchBuffer::new(4);
        assert!(!buffer.append_window(window(0, 4)));
        assert_eq!(buffer.len(), 4);
        assert_eq!(buffer.next_window_index(), 1);
        assert!(!buffer.is_exhausted());
    }

    #[test]
    fn test_short_window_exhausts() {
        let mut buffer = FetchBuffer::new(4);
        buffer.append_window(window(0, 4));
        assert!(buffer.append_window(window(4, 1)));
        assert!(buffer.is_exhausted());
        assert_eq!(buffer.next_window_index(), 2);
    }

    #[test]
    fn test_empty_window_exhausts() {
        let mut buffer = FetchBuffer::new(4);
        assert!(buffer.append_window(Vec::new()));
        assert!(buffer.is_empty());
        assert!(buffer.can_satisfy(Amount::Count(10)));
        assert!(buffer.can_satisfy(Amount::Unbounded));
    }

    #[test]
    fn test_zero_width_buffer_exhausts_on_first_window() {
        let mut buffer = FetchBuffer::new(0);
        assert!(buffer.append_window(Vec::new()));
        assert!(buffer.is_exhausted());
        assert!(buffer.can_satisfy(Amount::Unbounded));
    }

    #[test]
    fn test_take_removes_from_front_in_order() {
        let mut buffer = FetchBuffer::new(4);
        buffer.append_window(window(0, 4));

        assert_eq!(buffer.take(Amount::Count(3)), window(0, 3));
        assert_eq!(buffer.take(Amount::Count(3)), window(3, 1));
        assert!(buffer.take(Amount::Unbounded).is_empty());
    }

    #[test]
    fn test_can_satisfy_before_exhaustion() {
        let mut buffer = FetchBuffer::new(4);
        buffer.append_window(window(0, 4));

        assert!(buffer.can_satisfy(Amount::Count(4)));
        assert!(!buffer.can_satisfy(Amount::Count(5)));
        assert!(!buffer.can_satisfy(Amount::Unbounded));
        assert!(buffer.can_satisfy(Amount::Count(0)));
    }
}
