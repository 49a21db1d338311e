use std::path::PathBuf;
use thiserror::Error;

/// Errors that stop the server before it accepts any connection.
#[derive(Debug, Error)]
pub enum StartupError {
    /// Trailing substitution arguments must come in `key value` pairs
    #[error("substitution arguments must be given as key/value pairs, got {0} arguments")]
    OddSubstitutions(usize),

    #[error("unable to read fallback document {0:?}: {1}")]
    TemplateRead(PathBuf, std::io::Error),

    #[error("unable to write fallback document {0:?}: {1}")]
    TemplateWrite(PathBuf, std::io::Error),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("{0}\ncaused by: {1}")]
    Io(String, std::io::Error),
}

impl StartupError {
    /// Process exit code for this failure.
    pub fn exit_code(&self) -> i32 {
        match self {
            StartupError::OddSubstitutions(_) => 1,
            StartupError::TemplateRead(..) => 2,
            StartupError::TemplateWrite(..) => 3,
            StartupError::InvalidConfig(_) => 4,
            StartupError::Io(..) => 5,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exit_codes_are_distinct() {
        let io = || std::io::Error::other("x");
        let codes = [
            StartupError::OddSubstitutions(1).exit_code(),
            StartupError::TemplateRead(PathBuf::new(), io()).exit_code(),
            StartupError::TemplateWrite(PathBuf::new(), io()).exit_code(),
            StartupError::InvalidConfig(String::new()).exit_code(),
            StartupError::Io(String::new(), io()).exit_code(),
        ];
        let mut unique = codes.to_vec();
        unique.dedup();
        assert_eq!(unique.len(), codes.len());
        assert!(codes.iter().all(|&c| c != 0));
    }
}
