use thiserror::Error;

/// Error type for invalid operations.
///
/// Physically inapplicable quantities, zero discharge, missing neighbours and
/// excluded basins are not errors; they are represented with missing values.
/// The variants here cover inputs that violate the contract of the core.
#[derive(Error, Debug)]
pub enum RivCO2Error {
    #[error("{0}")]
    Error(String),
    #[error("Unknown waterbody tag {0:?}. Expected \"River\" or \"Lake/Reservoir\"")]
    UnknownWaterbody(String),
    #[error("Invalid basin code {0:?}. Expected a 4-digit HUC4 code with an optional letter suffix")]
    InvalidBasinCode(String),
    #[error("Basin {0} is not present in the basin lookup")]
    UnknownBasin(String),
    #[error("Basin graph contains a cycle through basin {0}")]
    CyclicBasinGraph(String),
    #[error("Column {column} has {actual} values but the reach table has {expected} reaches")]
    LengthMismatch {
        column: String,
        expected: usize,
        actual: usize,
    },
    #[error("Transport solver returned {actual} concentrations for basin {basin} with {expected} reaches")]
    SolverOutput {
        basin: String,
        expected: usize,
        actual: usize,
    },
    #[error("Could not parse configuration: {0}")]
    Config(#[from] toml::de::Error),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Convenience type for `Result<T, RivCO2Error>`.
pub type RivCO2Result<T> = Result<T, RivCO2Error>;
