use std::collections::VecDeque;
use std::ops::{Add, Sub};

/// A point in image coordinates. Sub-pixel, since centroids are averages.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

impl Position {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn distance(&self, other: &Position) -> f64 {
        self.distance_squared(other).sqrt()
    }

    pub fn distance_squared(&self, other: &Position) -> f64 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        dx * dx + dy * dy
    }
}

impl From<(f64, f64)> for Position {
    fn from((x, y): (f64, f64)) -> Self {
        Self { x, y }
    }
}

impl Add for Position {
    type Output = Position;

    fn add(self, rhs: Position) -> Position {
        Position::new(self.x + rhs.x, self.y + rhs.y)
    }
}

impl Sub for Position {
    type Output = Position;

    fn sub(self, rhs: Position) -> Position {
        Position::new(self.x - rhs.x, self.y - rhs.y)
    }
}

/// Bounded history of a track's observed positions, oldest first.
#[derive(Debug, Clone)]
pub struct PositionHistory {
    positions: VecDeque<Position>,
    capacity: usize,
}

impl PositionHistory {
    /// `capacity` is raised to 2, the minimum a velocity estimate needs.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(2);
        Self {
            positions: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn push(&mut self, position: Position) {
        if self.positions.len() == self.capacity {
            self.positions.pop_front();
        }
        self.positions.push_back(position);
    }

    pub fn last(&self) -> Option<Position> {
        self.positions.back().copied()
    }

    /// The observation before the last one.
    pub fn previous(&self) -> Option<Position> {
        self.positions
            .len()
            .checked_sub(2)
            .and_then(|i| self.positions.get(i).copied())
    }

    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Displacement between the last two observations, zero with fewer than two.
    pub fn velocity(&self) -> Position {
        match (self.last(), self.previous()) {
            (Some(last), Some(previous)) => last - previous,
            _ => Position::default(),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &Position> {
        self.positions.iter()
    }
}

/// Predicts where a track will be in the next frame.
pub trait Extrapolator {
    /// `None` only when the history holds no observation at all.
    fn predict(&self, history: &PositionHistory) -> Option<Position>;
}

/// Constant-velocity prediction from the last two observations.
#[derive(Debug, Clone, Copy, Default)]
pub struct LinearExtrapolator;

impl Extrapolator for LinearExtrapolator {
    fn predict(&self, history: &PositionHistory) -> Option<Position> {
        history.last().map(|last| last + history.velocity())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn empty_history_predicts_nothing() {
        let history = PositionHistory::new(4);
        assert_eq!(LinearExtrapolator.predict(&history), None);
    }

    #[test]
    fn single_observation_stays_put() {
        let mut history = PositionHistory::new(4);
        history.push(Position::new(3.0, 4.0));
        assert_eq!(LinearExtrapolator.predict(&history), Some(Position::new(3.0, 4.0)));
    }

    #[test]
    fn constant_velocity_is_continued() {
        let mut history = PositionHistory::new(4);
        history.push(Position::new(1.0, 1.0));
        history.push(Position::new(2.5, 0.0));
        let predicted = LinearExtrapolator.predict(&history).unwrap();
        assert_abs_diff_eq!(predicted.x, 4.0);
        assert_abs_diff_eq!(predicted.y, -1.0);
    }

    #[test]
    fn history_drops_oldest_beyond_capacity() {
        let mut history = PositionHistory::new(0);
        assert_eq!(history.capacity(), 2);
        for i in 0..5 {
            history.push(Position::new(i as f64, 0.0));
        }
        assert_eq!(history.len(), 2);
        assert_eq!(history.previous(), Some(Position::new(3.0, 0.0)));
        assert_eq!(history.last(), Some(Position::new(4.0, 0.0)));
    }

    #[test]
    fn distance_is_euclidean() {
        let a = Position::from((0.0, 0.0));
        let b = Position::from((3.0, 4.0));
        assert_abs_diff_eq!(a.distance(&b), 5.0);
        assert_abs_diff_eq!(b.distance_squared(&a), 25.0);
    }
}
