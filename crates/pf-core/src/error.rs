//! Numbered error taxonomy for the whole engine.
//!
//! Every fatal condition carries a numeric code in one of five ranges:
//! system failures (100s), input syntax problems (200s), network semantic
//! problems (220s), file access problems (300s), and runtime solver
//! failures. The code is what the top-level API returns; the message is
//! what lands in the project's status log.

use thiserror::Error;

pub type EngineResult<T> = Result<T, EngineError>;

/// Unrecoverable failures of the engine itself.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SystemError {
    #[error("System Error 101: insufficient memory available")]
    OutOfMemory,
    #[error("System Error 102: no network data to analyze")]
    NoNetworkData,
    #[error("System Error 103: could not create head loss model")]
    HeadLossModelNotOpened,
    #[error("System Error 104: could not create demand model")]
    DemandModelNotOpened,
    #[error("System Error 105: could not create leakage model")]
    LeakageModelNotOpened,
    #[error("System Error 106: could not create water quality model")]
    QualityModelNotOpened,
    #[error("System Error 107: could not create matrix solver")]
    MatrixSolverNotOpened,
    #[error("System Error 108: could not create hydraulic solver")]
    HydraulicSolverNotOpened,
    #[error("System Error 109: could not create water quality solver")]
    QualitySolverNotOpened,
    #[error("System Error 110: hydraulic solver failed to converge")]
    HydraulicsSolverFailure,
    #[error("System Error 111: water quality solver failed")]
    QualitySolverFailure,
    #[error("System Error 112: solver was not initialized")]
    SolverNotInitialized,
}

impl SystemError {
    pub fn code(&self) -> i32 {
        match self {
            SystemError::OutOfMemory => 101,
            SystemError::NoNetworkData => 102,
            SystemError::HeadLossModelNotOpened => 103,
            SystemError::DemandModelNotOpened => 104,
            SystemError::LeakageModelNotOpened => 105,
            SystemError::QualityModelNotOpened => 106,
            SystemError::MatrixSolverNotOpened => 107,
            SystemError::HydraulicSolverNotOpened => 108,
            SystemError::QualitySolverNotOpened => 109,
            SystemError::HydraulicsSolverFailure => 110,
            SystemError::QualitySolverFailure => 111,
            SystemError::SolverNotInitialized => 112,
        }
    }
}

/// Syntax problems found while reading an input file.
///
/// These are logged per line and counted; the load fails once the count
/// passes the reader's limit or if any remain at end of parse.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum InputError {
    #[error("Input Error 200: one or more errors in input file")]
    ErrorsInInputData,
    #[error("Input Error 201: could not create {0}")]
    CannotCreateObject(String),
    #[error("Input Error 202: too few input items")]
    TooFewItems,
    #[error("Input Error 203: invalid keyword \"{0}\"")]
    InvalidKeyword(String),
    #[error("Input Error 204: duplicate ID name \"{0}\"")]
    DuplicateId(String),
    #[error("Input Error 205: undefined object \"{0}\"")]
    UndefinedObject(String),
    #[error("Input Error 206: invalid number \"{0}\"")]
    InvalidNumber(String),
    #[error("Input Error 207: invalid time \"{0}\"")]
    InvalidTime(String),
}

impl InputError {
    pub fn code(&self) -> i32 {
        match self {
            InputError::ErrorsInInputData => 200,
            InputError::CannotCreateObject(_) => 201,
            InputError::TooFewItems => 202,
            InputError::InvalidKeyword(_) => 203,
            InputError::DuplicateId(_) => 204,
            InputError::UndefinedObject(_) => 205,
            InputError::InvalidNumber(_) => 206,
            InputError::InvalidTime(_) => 207,
        }
    }
}

/// Semantic problems discovered during network validation.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum NetworkError {
    #[error("Network Error 220: illegal valve connection for valve {0}")]
    IllegalValveConnection(String),
    #[error("Network Error 223: not enough nodes in network")]
    TooFewNodes,
    #[error("Network Error 224: no fixed grade nodes in network")]
    NoFixedGradeNodes,
    #[error("Network Error 225: invalid lower/upper levels for tank {0}")]
    InvalidTankLevels(String),
    #[error("Network Error 226: no head curve supplied for pump {0}")]
    NoPumpCurve(String),
    #[error("Network Error 227: invalid head curve for pump {0}")]
    InvalidPumpCurve(String),
    #[error("Network Error 230: invalid data for curve {0}")]
    InvalidCurveData(String),
    #[error("Network Error 231: invalid volume curve for tank {0}")]
    InvalidVolumeCurve(String),
    #[error("Network Error 233: no links connected to node {0}")]
    UnconnectedNode(String),
}

impl NetworkError {
    pub fn code(&self) -> i32 {
        match self {
            NetworkError::IllegalValveConnection(_) => 220,
            NetworkError::TooFewNodes => 223,
            NetworkError::NoFixedGradeNodes => 224,
            NetworkError::InvalidTankLevels(_) => 225,
            NetworkError::NoPumpCurve(_) => 226,
            NetworkError::InvalidPumpCurve(_) => 227,
            NetworkError::InvalidCurveData(_) => 230,
            NetworkError::InvalidVolumeCurve(_) => 231,
            NetworkError::UnconnectedNode(_) => 233,
        }
    }
}

/// File access problems.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FileError {
    #[error("File Error 301: identical file names")]
    DuplicateFileNames,
    #[error("File Error 302: cannot open input file {0}")]
    CannotOpenInputFile(String),
    #[error("File Error 303: cannot open report file {0}")]
    CannotOpenReportFile(String),
    #[error("File Error 304: cannot open binary output file {0}")]
    CannotOpenOutputFile(String),
    #[error("File Error 308: cannot write to binary output file")]
    CannotWriteToOutputFile,
    #[error("File Error 309: cannot write to report file")]
    CannotWriteToReportFile,
    #[error("File Error 310: no results saved to report")]
    NoResultsSavedToReport,
}

impl FileError {
    pub fn code(&self) -> i32 {
        match self {
            FileError::DuplicateFileNames => 301,
            FileError::CannotOpenInputFile(_) => 302,
            FileError::CannotOpenReportFile(_) => 303,
            FileError::CannotOpenOutputFile(_) => 304,
            FileError::CannotWriteToOutputFile => 308,
            FileError::CannotWriteToReportFile => 309,
            FileError::NoResultsSavedToReport => 310,
        }
    }
}

/// Umbrella error returned by the top-level API.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EngineError {
    #[error(transparent)]
    System(#[from] SystemError),
    #[error(transparent)]
    Input(#[from] InputError),
    #[error(transparent)]
    Network(#[from] NetworkError),
    #[error(transparent)]
    File(#[from] FileError),
}

impl EngineError {
    pub fn code(&self) -> i32 {
        match self {
            EngineError::System(e) => e.code(),
            EngineError::Input(e) => e.code(),
            EngineError::Network(e) => e.code(),
            EngineError::File(e) => e.code(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_fall_in_documented_ranges() {
        assert_eq!(SystemError::OutOfMemory.code(), 101);
        assert_eq!(InputError::DuplicateId("J1".into()).code(), 204);
        assert_eq!(NetworkError::NoFixedGradeNodes.code(), 224);
        assert_eq!(FileError::DuplicateFileNames.code(), 301);
    }

    #[test]
    fn umbrella_preserves_code_and_message() {
        let err: EngineError = NetworkError::InvalidTankLevels("T1".into()).into();
        assert_eq!(err.code(), 225);
        assert!(format!("{err}").contains("tank T1"));
    }
}
