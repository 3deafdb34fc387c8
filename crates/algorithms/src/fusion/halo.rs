//! Rolling window of panchromatic row blocks for halo-aware convolution

use ndarray::{concatenate, Array2, ArrayView2, Axis};
use pansharp_core::{Error, Result};
use std::ops::Range;

/// Position of the current row block within the image
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum WindowState {
    /// Top block: no previous slot
    First,
    Middle,
    /// Bottom block: no next slot
    Last,
    /// The image is a single row block
    Single,
}

/// Three row-block slots with fixed roles: previous, current, next.
///
/// Advancing rotates the slots so the current block becomes the previous one
/// and the next block becomes current; the oldest block is dropped.
#[derive(Debug, Default)]
pub(crate) struct RowBlockRing {
    slots: [Option<Array2<f64>>; 3],
}

const PREV: usize = 0;
const CURRENT: usize = 1;
const NEXT: usize = 2;

impl RowBlockRing {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Start at the top of the image
    pub(crate) fn prime(&mut self, current: Array2<f64>, next: Option<Array2<f64>>) {
        self.slots = [None, Some(current), next];
    }

    /// Slide down by one row block; `next` is `None` past the bottom of the image
    pub(crate) fn advance(&mut self, next: Option<Array2<f64>>) {
        self.slots.rotate_left(1);
        self.slots[NEXT] = next;
    }

    pub(crate) fn state(&self) -> WindowState {
        match (self.slots[PREV].is_some(), self.slots[NEXT].is_some()) {
            (false, true) => WindowState::First,
            (true, true) => WindowState::Middle,
            (true, false) => WindowState::Last,
            (false, false) => WindowState::Single,
        }
    }

    /// Resident slots stacked vertically, with the rows of the current block
    pub(crate) fn stacked(&self) -> Result<(Array2<f64>, Range<usize>)> {
        let current = self.slots[CURRENT]
            .as_ref()
            .ok_or_else(|| Error::Other("row block window has no current block".into()))?;
        let offset = self.slots[PREV].as_ref().map_or(0, |p| p.nrows());
        let views: Vec<ArrayView2<f64>> = self.slots.iter().flatten().map(|s| s.view()).collect();
        let stacked = concatenate(Axis(0), &views).map_err(|e| Error::Other(e.to_string()))?;
        Ok((stacked, offset..offset + current.nrows()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn block(value: f64, rows: usize) -> Array2<f64> {
        Array2::from_elem((rows, 3), value)
    }

    #[test]
    fn test_window_states() {
        let mut ring = RowBlockRing::new();
        ring.prime(block(0.0, 2), Some(block(1.0, 2)));
        assert_eq!(ring.state(), WindowState::First);
        let (stack, roi) = ring.stacked().unwrap();
        assert_eq!(stack.nrows(), 4);
        assert_eq!(roi, 0..2);

        ring.advance(Some(block(2.0, 2)));
        assert_eq!(ring.state(), WindowState::Middle);
        let (stack, roi) = ring.stacked().unwrap();
        assert_eq!(stack.nrows(), 6);
        assert_eq!(roi, 2..4);
        assert_eq!(stack[[roi.start, 0]], 1.0);

        ring.advance(Some(block(3.0, 1)));
        ring.advance(None);
        assert_eq!(ring.state(), WindowState::Last);
        let (stack, roi) = ring.stacked().unwrap();
        assert_eq!(stack.nrows(), 3);
        assert_eq!(roi, 2..3);
        assert_eq!(stack[[2, 0]], 3.0);
    }

    #[test]
    fn test_single_block() {
        let mut ring = RowBlockRing::new();
        ring.prime(block(5.0, 4), None);
        assert_eq!(ring.state(), WindowState::Single);
        let (stack, roi) = ring.stacked().unwrap();
        assert_eq!(stack.nrows(), 4);
        assert_eq!(roi, 0..4);
    }

    #[test]
    fn test_empty_ring() {
        assert!(RowBlockRing::new().stacked().is_err());
    }
}
