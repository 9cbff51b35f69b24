use thiserror::Error;

/// Errors raised by the detection and tracking kernel.
///
/// Every variant describes input the caller handed us that we refuse to
/// process. Nothing here is fatal: the caller can skip the frame and continue.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum BlobError {
    #[error("image has no pixels ({width}x{height})")]
    EmptyImage { width: u32, height: u32 },

    #[error("pixel buffer holds {actual} values, expected {expected}")]
    BufferSize { expected: usize, actual: usize },

    #[error("value band [{min}, {max}] is empty")]
    InvalidBand { min: u8, max: u8 },

    #[error("got {positions} positions but {values} values")]
    LengthMismatch { positions: usize, values: usize },

    #[error("cost buffer holds {actual} entries, expected {rows}x{cols}")]
    CostMatrixSize {
        rows: usize,
        cols: usize,
        actual: usize,
    },

    #[error("cost at ({row}, {col}) is {cost}, costs must be finite and non-negative")]
    InvalidCost { row: usize, col: usize, cost: f64 },
}

impl BlobError {
    /// All kernel errors are invalid-input conditions.
    pub fn is_invalid_input(&self) -> bool {
        true
    }
}
