//! Errors raised by the admission gate and its overflow buffer.

/// Gate construction and bookkeeping errors.
#[derive(Debug, thiserror::Error)]
pub enum GateError {
    /// The gate was built with zero slots.
    #[error("queue capacity must be at least 1 (got {0})")]
    InvalidCapacity(usize),
    /// Popped an empty overflow buffer; a bookkeeping bug if it ever surfaces.
    #[error("overflow buffer is empty")]
    EmptyBuffer,
    /// The executor could not start a worker. The slot has already been released.
    #[error("could not start worker: {0}")]
    Spawn(#[from] std::io::Error),
}
