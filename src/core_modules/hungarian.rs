// THEORY:
// Minimum-cost one-to-one assignment between the rows (tracks) and the columns
// (detections) of a cost matrix. Kuhn-Munkres in its shortest-augmenting-path
// form: one row is added per phase and the row/column potentials keep every
// reduced cost non-negative, giving O(n^3) overall.
//
// Key architectural principles:
// 1.  **Square Core**: The solver proper only handles n x n. Rectangular input is
//     padded with a constant cost; since every full matching uses exactly the
//     same number of padding cells, the constant never changes which real pairs
//     are chosen.
// 2.  **Explicit Leftovers**: Rows or columns matched to padding are reported in
//     `unmatched_rows`/`unmatched_cols` instead of disappearing.
// 3.  **Validated Input**: Costs are checked once in `CostMatrix::new`, so the
//     solver can assume finite, non-negative values.

use crate::core_modules::error::BlobError;

/// Row-major `rows x cols` matrix of finite, non-negative costs.
#[derive(Debug, Clone, PartialEq)]
pub struct CostMatrix {
    rows: usize,
    cols: usize,
    costs: Vec<f64>,
}

impl CostMatrix {
    pub fn new(rows: usize, cols: usize, costs: Vec<f64>) -> Result<Self, BlobError> {
        if costs.len() != rows * cols {
            return Err(BlobError::CostMatrixSize {
                rows,
                cols,
                actual: costs.len(),
            });
        }
        if let Some((idx, &cost)) = costs
            .iter()
            .enumerate()
            .find(|(_, cost)| !cost.is_finite() || **cost < 0.0)
        {
            return Err(BlobError::InvalidCost {
                row: idx / cols,
                col: idx % cols,
                cost,
            });
        }
        Ok(Self { rows, cols, costs })
    }

    /// Fills the matrix with `cost(row, col)`.
    pub fn from_fn<F>(rows: usize, cols: usize, mut cost: F) -> Result<Self, BlobError>
    where
        F: FnMut(usize, usize) -> f64,
    {
        let mut costs = Vec::with_capacity(rows * cols);
        for row in 0..rows {
            for col in 0..cols {
                costs.push(cost(row, col));
            }
        }
        Self::new(rows, cols, costs)
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn is_empty(&self) -> bool {
        self.rows == 0 || self.cols == 0
    }

    #[inline]
    pub fn get(&self, row: usize, col: usize) -> f64 {
        self.costs[row * self.cols + col]
    }

    fn max_cost(&self) -> f64 {
        self.costs.iter().copied().fold(0.0, f64::max)
    }
}

/// Result of [`solve`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Assignment {
    /// `(row, col)` pairs, sorted by row. Exactly `min(rows, cols)` of them.
    pub pairs: Vec<(usize, usize)>,
    pub unmatched_rows: Vec<usize>,
    pub unmatched_cols: Vec<usize>,
    /// Sum of the costs of `pairs`.
    pub total_cost: f64,
}

impl Assignment {
    /// The column assigned to `row`, if any.
    pub fn col_for(&self, row: usize) -> Option<usize> {
        self.pairs.iter().find(|(r, _)| *r == row).map(|(_, c)| *c)
    }
}

/// Minimum-total-cost assignment of `matrix`.
pub fn solve(matrix: &CostMatrix) -> Assignment {
    if matrix.is_empty() {
        return Assignment {
            pairs: Vec::new(),
            unmatched_rows: (0..matrix.rows).collect(),
            unmatched_cols: (0..matrix.cols).collect(),
            total_cost: 0.0,
        };
    }

    let n = matrix.rows.max(matrix.cols);
    let padding = matrix.max_cost();
    let mut square = vec![padding; n * n];
    for row in 0..matrix.rows {
        let src = &matrix.costs[row * matrix.cols..(row + 1) * matrix.cols];
        square[row * n..row * n + matrix.cols].copy_from_slice(src);
    }

    let col_of_row = augment(&square, n);

    let mut assignment = Assignment::default();
    let mut col_taken = vec![false; matrix.cols];
    for (row, &col) in col_of_row.iter().enumerate().take(matrix.rows) {
        if col < matrix.cols {
            assignment.pairs.push((row, col));
            assignment.total_cost += matrix.get(row, col);
            col_taken[col] = true;
        } else {
            assignment.unmatched_rows.push(row);
        }
    }
    assignment.unmatched_cols = (0..matrix.cols).filter(|&c| !col_taken[c]).collect();
    assignment
}

/// Square Kuhn-Munkres. Returns the column of every row.
fn augment(cost: &[f64], n: usize) -> Vec<usize> {
    // 1-based internally; index 0 is the virtual source column.
    let mut row_potential = vec![0.0f64; n + 1];
    let mut col_potential = vec![0.0f64; n + 1];
    let mut row_of_col = vec![0usize; n + 1];
    let mut came_from = vec![0usize; n + 1];
    let mut slack = vec![f64::INFINITY; n + 1];
    let mut visited = vec![false; n + 1];

    for row in 1..=n {
        row_of_col[0] = row;
        let mut col = 0usize;
        slack.fill(f64::INFINITY);
        visited.fill(false);

        loop {
            visited[col] = true;
            let current = row_of_col[col];
            let mut delta = f64::INFINITY;
            let mut next = 0usize;

            for j in 1..=n {
                if visited[j] {
                    continue;
                }
                let reduced =
                    cost[(current - 1) * n + (j - 1)] - row_potential[current] - col_potential[j];
                if reduced < slack[j] {
                    slack[j] = reduced;
                    came_from[j] = col;
                }
                if slack[j] < delta {
                    delta = slack[j];
                    next = j;
                }
            }

            for j in 0..=n {
                if visited[j] {
                    row_potential[row_of_col[j]] += delta;
                    col_potential[j] -= delta;
                } else {
                    slack[j] -= delta;
                }
            }

            col = next;
            if row_of_col[col] == 0 {
                break;
            }
        }

        while col != 0 {
            let prev = came_from[col];
            row_of_col[col] = row_of_col[prev];
            col = prev;
        }
    }

    let mut col_of_row = vec![0usize; n];
    for j in 1..=n {
        if row_of_col[j] != 0 {
            col_of_row[row_of_col[j] - 1] = j - 1;
        }
    }
    col_of_row
}
