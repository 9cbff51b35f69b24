use approx::assert_abs_diff_eq;
use blob_vision::core_modules::hungarian::solve;
use blob_vision::{CostMatrix, Position, PositionTracker, TrackId, TrackerConfig};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Cheapest assignment covering min(rows, cols) pairs, by exhaustive search.
fn brute_force(matrix: &CostMatrix) -> f64 {
    fn search(
        matrix: &CostMatrix,
        row: usize,
        used: &mut Vec<bool>,
        transposed: bool,
    ) -> f64 {
        let (rows, cols) = if transposed {
            (matrix.cols(), matrix.rows())
        } else {
            (matrix.rows(), matrix.cols())
        };
        if row == rows {
            return 0.0;
        }
        let mut best = f64::INFINITY;
        for col in 0..cols {
            if used[col] {
                continue;
            }
            used[col] = true;
            let cost = if transposed {
                matrix.get(col, row)
            } else {
                matrix.get(row, col)
            };
            best = best.min(cost + search(matrix, row + 1, used, transposed));
            used[col] = false;
        }
        best
    }

    if matrix.is_empty() {
        return 0.0;
    }
    let transposed = matrix.rows() > matrix.cols();
    let cols = if transposed { matrix.rows() } else { matrix.cols() };
    search(matrix, 0, &mut vec![false; cols], transposed)
}

#[test]
fn assignment_is_optimal_against_brute_force() {
    let mut rng = StdRng::seed_from_u64(42);
    for _ in 0..200 {
        let rows = rng.random_range(0..=6);
        let cols = rng.random_range(0..=6);
        let matrix =
            CostMatrix::from_fn(rows, cols, |_, _| rng.random_range(0..50) as f64).unwrap();
        let assignment = solve(&matrix);

        assert_eq!(assignment.pairs.len(), rows.min(cols));
        assert_eq!(assignment.unmatched_rows.len(), rows - rows.min(cols));
        assert_eq!(assignment.unmatched_cols.len(), cols - rows.min(cols));

        let mut seen_cols = vec![false; cols];
        for &(_, col) in &assignment.pairs {
            assert!(!seen_cols[col], "column assigned twice");
            seen_cols[col] = true;
        }
        let recomputed: f64 = assignment
            .pairs
            .iter()
            .map(|&(r, c)| matrix.get(r, c))
            .sum();
        assert_abs_diff_eq!(recomputed, assignment.total_cost, epsilon = 1e-9);
        assert_abs_diff_eq!(assignment.total_cost, brute_force(&matrix), epsilon = 1e-9);
    }
}

#[test]
fn static_scene_keeps_ids() {
    let mut rng = StdRng::seed_from_u64(5);
    let positions: Vec<Position> = (0..8)
        .map(|_| Position::new(rng.random_range(0.0..500.0), rng.random_range(0.0..500.0)))
        .collect();

    let mut tracker = PositionTracker::default();
    let first = tracker.push_data(&positions, None).unwrap();
    assert_eq!(first.born.len(), 8);

    for _ in 0..5 {
        let update = tracker.push_data(&positions, None).unwrap();
        assert_eq!(update.positions, first.positions);
        assert!(update.born.is_empty());
    }
}

#[test]
fn crossing_targets_follow_their_motion() {
    let mut tracker = PositionTracker::default();
    // Two targets approach each other along x, on nearby rows, and pass.
    let mut ids = Vec::new();
    for step in 0..8 {
        let t = step as f64;
        let frame = [
            Position::new(t * 10.0, 100.0),
            Position::new(70.0 - t * 10.0, 102.0),
        ];
        let update = tracker.push_data(&frame, None).unwrap();
        if step == 0 {
            ids = update.born.clone();
        } else {
            assert!(update.born.is_empty(), "identity lost at step {step}");
        }
        assert_eq!(update.positions[&ids[0]], frame[0]);
        assert_eq!(update.positions[&ids[1]], frame[1]);
    }
}

#[test]
fn dead_track_id_never_returns() {
    let k = 3;
    let config = TrackerConfig {
        max_missed_frames: k,
        ..TrackerConfig::default()
    };
    let mut tracker = PositionTracker::new(config);
    let spot = [Position::new(10.0, 10.0)];
    tracker.push_data(&spot, None).unwrap();

    let mut died = Vec::new();
    for _ in 0..=k {
        died.extend(tracker.push_data(&[], None).unwrap().died);
    }
    assert_eq!(died, vec![TrackId(0)]);

    let update = tracker.push_data(&spot, None).unwrap();
    assert_eq!(update.born, vec![TrackId(1)]);
    assert!(!update.positions.contains_key(&TrackId(0)));
}
