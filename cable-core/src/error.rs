use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum CableError {
    // Configuration errors: reported at construction, nothing runs
    #[error("invalid geometry: length {length} um, diameter {diameter} um")]
    InvalidGeometry { length: f64, diameter: f64 },
    #[error("invalid delay: {0} ms (must be > 0)")]
    InvalidDelay(f64),
    #[error("degenerate synapse: {0}")]
    DegenerateSynapse(&'static str),
    #[error("invalid topology: {0}")]
    InvalidTopology(&'static str),
    #[error("invalid position: {0} (must be in [0, 1])")]
    InvalidPosition(f64),
    #[error("invalid parameter: {0}")]
    InvalidParameter(&'static str),
    #[error("unknown cell {0}")]
    UnknownCell(u32),
    #[error("unknown section {0}")]
    UnknownSection(usize),
    #[error("no section named '{0}'")]
    UnknownSectionName(String),
    #[error("unknown synapse {0}")]
    UnknownSynapse(usize),

    // Run-time: aborts the current run
    #[error("numerical divergence in cell {cell} at t = {time} ms")]
    NumericalDivergence { cell: u32, time: f64 },

    // Internal invariant violation
    #[error("event targets removed synapse {synapse} on cell {cell}")]
    DanglingTarget { cell: u32, synapse: usize },
}

impl CableError {
    /// Configuration errors are raised before a run starts; the rest are fatal run-time failures.
    pub fn is_configuration(&self) -> bool {
        !matches!(
            self,
            CableError::NumericalDivergence { .. } | CableError::DanglingTarget { .. }
        )
    }
}

pub type Result<T, E = CableError> = core::result::Result<T, E>;
