// THEORY:
// The `tracker` module adds "object permanence" on top of the stateless per-frame
// region sets. It takes the centroids found in one frame and associates them with
// the tracks it was following in previous frames.
//
// This module solves the "data association problem."
//
// Key architectural principles:
// 1.  **Object Persistence**: A `Track` is one object's existence *over time*. It is
//     distinct from a `Region`, which is a snapshot in a single frame.
// 2.  **Global Association**: Every live track is projected one frame ahead by the
//     `Extrapolator`, and the whole track/detection cost matrix is handed to the
//     Hungarian solver. The total distance over all pairs is minimised at once, so
//     one greedy early match can never steal another track's detection.
// 3.  **Gating**: Pairs whose values differ, or that are farther apart than the
//     configured `max_match_distance`, are priced above any real assignment. The
//     solver only picks them when nothing else is left, and they are then
//     reported as unmatched on both sides.
// 4.  **Lifecycle Management**:
//     - **Birth**: An unmatched detection starts a new track with a fresh id.
//     - **Tracking**: A matched track records the position and resets its miss count.
//     - **Death**: A track missed more than `max_missed_frames` frames in a row is
//       removed. Ids are never handed out twice.

use crate::core_modules::error::BlobError;
use crate::core_modules::extrapolator::{Extrapolator, LinearExtrapolator, Position, PositionHistory};
use crate::core_modules::hungarian::{self, CostMatrix};
use log::{debug, trace};
use std::collections::BTreeMap;
use std::fmt;

const POSITION_HISTORY_SIZE: usize = 10;
const MAX_MISSED_FRAMES: u32 = 5; // How many frames an object can be lost before it's deleted.

/// A unique and persistent track identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TrackId(pub u64);

impl fmt::Display for TrackId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Distance between a predicted track position and a detection.
pub type DistanceFn = fn(&Position, &Position) -> f64;

fn euclidean(a: &Position, b: &Position) -> f64 {
    a.distance(b)
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TrackerConfig {
    /// A track missed for more than this many consecutive frames dies.
    pub max_missed_frames: u32,
    /// Positions kept per track for prediction. At least 2 are always kept.
    pub history_len: usize,
    /// Detections farther than this from a prediction never continue the track.
    pub max_match_distance: Option<f64>,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            max_missed_frames: MAX_MISSED_FRAMES,
            history_len: POSITION_HISTORY_SIZE,
            max_match_distance: None,
        }
    }
}

/// An object followed across frames.
#[derive(Debug, Clone)]
pub struct Track {
    pub id: TrackId,
    /// Last observed position.
    pub position: Position,
    /// Displacement per frame between the last two observations.
    pub velocity: Position,
    /// Consecutive frames without a matching detection.
    pub missed_frames: u32,
    /// Frames in which this track was observed.
    pub age: u32,
    /// Value of the last matched detection, when values are supplied.
    pub value: Option<u8>,
    history: PositionHistory,
}

impl Track {
    fn new(id: TrackId, position: Position, value: Option<u8>, history_len: usize) -> Self {
        let mut history = PositionHistory::new(history_len);
        history.push(position);
        Self {
            id,
            position,
            velocity: Position::default(),
            missed_frames: 0,
            age: 1,
            value,
            history,
        }
    }

    fn observe(&mut self, position: Position, value: Option<u8>) {
        self.history.push(position);
        self.position = position;
        self.velocity = self.history.velocity();
        self.missed_frames = 0;
        self.age += 1;
        if value.is_some() {
            self.value = value;
        }
    }

    pub fn history(&self) -> &PositionHistory {
        &self.history
    }
}

/// Result of one `push_data` call.
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TrackingUpdate {
    /// Every live track and its last observed position.
    pub positions: BTreeMap<TrackId, Position>,
    /// Tracks started this frame, in detection order.
    pub born: Vec<TrackId>,
    /// Tracks removed this frame.
    pub died: Vec<TrackId>,
}

/// Owns the live tracks and updates them frame by frame.
pub struct PositionTracker<E: Extrapolator = LinearExtrapolator> {
    config: TrackerConfig,
    /// The objects currently being tracked.
    tracks: Vec<Track>,
    /// A counter to ensure each new object gets a unique ID.
    next_id: u64,
    extrapolator: E,
    distance: DistanceFn,
}

impl PositionTracker {
    pub fn new(config: TrackerConfig) -> Self {
        Self::with_extrapolator(config, LinearExtrapolator)
    }
}

impl Default for PositionTracker {
    fn default() -> Self {
        Self::new(TrackerConfig::default())
    }
}

impl<E: Extrapolator> PositionTracker<E> {
    pub fn with_extrapolator(config: TrackerConfig, extrapolator: E) -> Self {
        Self {
            config,
            tracks: Vec::new(),
            next_id: 0,
            extrapolator,
            distance: euclidean,
        }
    }

    /// Replaces the default Euclidean distance.
    pub fn with_distance(mut self, distance: DistanceFn) -> Self {
        self.distance = distance;
        self
    }

    pub fn config(&self) -> &TrackerConfig {
        &self.config
    }

    pub fn tracks(&self) -> &[Track] {
        &self.tracks
    }

    pub fn track(&self, id: TrackId) -> Option<&Track> {
        self.tracks.iter().find(|track| track.id == id)
    }

    /// Drops every track. Ids keep counting up.
    pub fn clear(&mut self) {
        self.tracks.clear();
    }

    /// Feeds one frame of detections. `values`, when given, runs parallel to
    /// `positions`; a track only continues with a detection of the same value.
    pub fn push_data(
        &mut self,
        positions: &[Position],
        values: Option<&[u8]>,
    ) -> Result<TrackingUpdate, BlobError> {
        if let Some(values) = values {
            if values.len() != positions.len() {
                return Err(BlobError::LengthMismatch {
                    positions: positions.len(),
                    values: values.len(),
                });
            }
        }
        let value_of = |j: usize| values.map(|v| v[j]);

        // --- 1. Prediction ---
        let predicted: Vec<Position> = self
            .tracks
            .iter()
            .map(|track| {
                self.extrapolator
                    .predict(&track.history)
                    .unwrap_or(track.position)
            })
            .collect();

        // --- 2. Costs and gating ---
        let cols = positions.len();
        let mut raw = Vec::with_capacity(predicted.len() * cols);
        let mut allowed = Vec::with_capacity(predicted.len() * cols);
        for (track, prediction) in self.tracks.iter().zip(&predicted) {
            for (j, detection) in positions.iter().enumerate() {
                let cost = (self.distance)(prediction, detection);
                let same_value = match (track.value, value_of(j)) {
                    (Some(a), Some(b)) => a == b,
                    _ => true,
                };
                let in_range = self.config.max_match_distance.is_none_or(|max| cost <= max);
                raw.push(cost);
                allowed.push(same_value && in_range);
            }
        }
        let gated_cost = raw
            .iter()
            .zip(&allowed)
            .filter(|(_, ok)| **ok)
            .map(|(cost, _)| *cost)
            .sum::<f64>()
            + 1.0;
        let costs = raw
            .iter()
            .zip(&allowed)
            .map(|(&cost, &ok)| if ok { cost } else { gated_cost })
            .collect();
        let matrix = CostMatrix::new(self.tracks.len(), cols, costs)?;

        // --- 3. Assignment ---
        let assignment = hungarian::solve(&matrix);
        let mut detection_used = vec![false; cols];
        let mut track_matched = vec![false; self.tracks.len()];
        for &(i, j) in &assignment.pairs {
            if !allowed[i * cols + j] {
                continue;
            }
            trace!("track {} matched detection {}", self.tracks[i].id, j);
            self.tracks[i].observe(positions[j], value_of(j));
            track_matched[i] = true;
            detection_used[j] = true;
        }

        // --- 4. Misses and deaths ---
        let mut update = TrackingUpdate::default();
        let max_missed = self.config.max_missed_frames;
        let mut index = 0;
        self.tracks.retain_mut(|track| {
            let matched = track_matched[index];
            index += 1;
            if matched {
                return true;
            }
            track.missed_frames += 1;
            if track.missed_frames > max_missed {
                update.died.push(track.id);
                return false;
            }
            true
        });

        // --- 5. Births ---
        for (j, position) in positions.iter().enumerate() {
            if detection_used[j] {
                continue;
            }
            let id = TrackId(self.next_id);
            self.next_id += 1;
            self.tracks
                .push(Track::new(id, *position, value_of(j), self.config.history_len));
            update.born.push(id);
        }

        if !update.born.is_empty() || !update.died.is_empty() {
            debug!(
                "tracker: {} born, {} died, {} live",
                update.born.len(),
                update.died.len(),
                self.tracks.len()
            );
        }

        update.positions = self
            .tracks
            .iter()
            .map(|track| (track.id, track.position))
            .collect();
        Ok(update)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn p(x: f64, y: f64) -> Position {
        Position::new(x, y)
    }

    #[test]
    fn static_detections_keep_their_ids() {
        let mut tracker = PositionTracker::default();
        let frame = [p(0.0, 0.0), p(50.0, 10.0), p(20.0, 80.0)];
        let first = tracker.push_data(&frame, None).unwrap();
        assert_eq!(first.born, vec![TrackId(0), TrackId(1), TrackId(2)]);

        for _ in 0..3 {
            let update = tracker.push_data(&frame, None).unwrap();
            assert!(update.born.is_empty());
            assert!(update.died.is_empty());
            assert_eq!(update.positions, first.positions);
        }
    }

    #[test]
    fn prediction_beats_last_position() {
        let mut tracker = PositionTracker::default();
        tracker.push_data(&[p(0.0, 0.0)], None).unwrap();
        tracker.push_data(&[p(10.0, 0.0)], None).unwrap();

        // (9, 0) is nearer the last position, (20, 0) is where the track should be.
        let update = tracker.push_data(&[p(9.0, 0.0), p(20.0, 0.0)], None).unwrap();
        assert_eq!(update.positions[&TrackId(0)], p(20.0, 0.0));
        assert_eq!(update.born, vec![TrackId(1)]);
        let track = tracker.track(TrackId(0)).unwrap();
        assert_eq!(track.velocity, p(10.0, 0.0));
        assert_eq!(track.age, 3);
    }

    #[test]
    fn track_dies_after_too_many_misses_and_id_is_not_reused() {
        let config = TrackerConfig {
            max_missed_frames: 2,
            ..TrackerConfig::default()
        };
        let mut tracker = PositionTracker::new(config);
        tracker.push_data(&[p(5.0, 5.0)], None).unwrap();

        for missed in 1..=2 {
            let update = tracker.push_data(&[], None).unwrap();
            assert!(update.died.is_empty());
            assert_eq!(tracker.tracks()[0].missed_frames, missed);
        }
        let update = tracker.push_data(&[], None).unwrap();
        assert_eq!(update.died, vec![TrackId(0)]);
        assert!(tracker.tracks().is_empty());

        let update = tracker.push_data(&[p(5.0, 5.0)], None).unwrap();
        assert_eq!(update.born, vec![TrackId(1)]);
    }

    #[test]
    fn missed_track_is_recovered() {
        let mut tracker = PositionTracker::default();
        tracker.push_data(&[p(1.0, 1.0)], None).unwrap();
        tracker.push_data(&[], None).unwrap();
        let update = tracker.push_data(&[p(1.0, 2.0)], None).unwrap();
        assert!(update.born.is_empty());
        assert_eq!(tracker.tracks()[0].missed_frames, 0);
    }

    #[test]
    fn length_mismatch_is_rejected_without_side_effects() {
        let mut tracker = PositionTracker::default();
        tracker.push_data(&[p(0.0, 0.0)], None).unwrap();
        let err = tracker
            .push_data(&[p(0.0, 0.0), p(1.0, 1.0)], Some(&[1]))
            .unwrap_err();
        assert_eq!(
            err,
            BlobError::LengthMismatch {
                positions: 2,
                values: 1
            }
        );
        assert_eq!(tracker.tracks().len(), 1);
        assert_eq!(tracker.tracks()[0].missed_frames, 0);
    }

    #[test]
    fn different_values_never_match() {
        let mut tracker = PositionTracker::default();
        tracker.push_data(&[p(0.0, 0.0)], Some(&[1])).unwrap();
        let update = tracker.push_data(&[p(0.0, 0.0)], Some(&[2])).unwrap();
        assert_eq!(update.born, vec![TrackId(1)]);
        assert_eq!(tracker.track(TrackId(0)).unwrap().missed_frames, 1);
        assert_eq!(tracker.track(TrackId(1)).unwrap().value, Some(2));
    }

    #[test]
    fn distance_gate_splits_tracks() {
        let config = TrackerConfig {
            max_match_distance: Some(5.0),
            ..TrackerConfig::default()
        };
        let mut tracker = PositionTracker::new(config);
        tracker.push_data(&[p(0.0, 0.0)], None).unwrap();
        let update = tracker.push_data(&[p(30.0, 0.0)], None).unwrap();
        assert_eq!(update.born, vec![TrackId(1)]);
        assert_eq!(update.positions[&TrackId(0)], p(0.0, 0.0));
    }

    #[test]
    fn custom_distance_is_used() {
        fn horizontal(a: &Position, b: &Position) -> f64 {
            (a.x - b.x).abs()
        }
        let config = TrackerConfig {
            max_match_distance: Some(1.0),
            ..TrackerConfig::default()
        };
        let mut tracker = PositionTracker::new(config).with_distance(horizontal);
        tracker.push_data(&[p(0.0, 0.0)], None).unwrap();
        let update = tracker.push_data(&[p(0.5, 100.0)], None).unwrap();
        assert!(update.born.is_empty());
    }
}
