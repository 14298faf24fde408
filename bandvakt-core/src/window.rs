//! Bounded FIFO of recent total throughput values.

use std::collections::VecDeque;

#[derive(Debug, Clone)]
pub struct MovingWindow {
    values: VecDeque<f64>,
    capacity: usize,
}

impl MovingWindow {
    /// Creates an empty window. A capacity of zero is treated as one.
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            values: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Appends a value, evicting the oldest once the window is full.
    pub fn push(&mut self, value: f64) {
        if self.values.len() >= self.capacity {
            self.values.pop_front();
        }
        self.values.push_back(value);
    }

    /// Mean of the current contents, recomputed from scratch. Zero when empty.
    pub fn average(&self) -> f64 {
        if self.values.is_empty() {
            return 0.0;
        }
        self.values.iter().sum::<f64>() / self.values.len() as f64
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Contents in arrival order, oldest first.
    pub fn values(&self) -> impl Iterator<Item = f64> + '_ {
        self.values.iter().copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn empty_average_is_zero() {
        assert_eq!(MovingWindow::with_capacity(4).average(), 0.0);
    }

    #[test]
    fn single_sample_average() {
        let mut window = MovingWindow::with_capacity(10);
        window.push(700.0);
        assert_eq!(window.average(), 700.0);
    }

    #[test]
    fn evicts_oldest() {
        let mut window = MovingWindow::with_capacity(3);
        for v in [1.0, 2.0, 3.0, 4.0] {
            window.push(v);
        }
        assert_eq!(window.values().collect::<Vec<_>>(), vec![2.0, 3.0, 4.0]);
        assert_eq!(window.average(), 3.0);
    }

    #[test]
    fn zero_capacity_holds_one() {
        let mut window = MovingWindow::with_capacity(0);
        window.push(1.0);
        window.push(2.0);
        assert_eq!(window.len(), 1);
        assert_eq!(window.average(), 2.0);
    }

    proptest! {
        #[test]
        fn keeps_last_capacity_values(
            capacity in 1usize..32,
            values in proptest::collection::vec(0.0f64..1e9, 0..128),
        ) {
            let mut window = MovingWindow::with_capacity(capacity);
            for v in &values {
                window.push(*v);
                prop_assert!(window.len() <= capacity);
            }
            let start = values.len().saturating_sub(capacity);
            prop_assert_eq!(window.values().collect::<Vec<_>>(), values[start..].to_vec());
        }
    }
}
