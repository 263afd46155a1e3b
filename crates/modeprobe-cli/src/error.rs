// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Au-Zone Technologies

use std::fmt;
use std::process::ExitCode;

/// CLI-specific error type with exit code mapping
#[derive(Debug)]
pub enum CliError {
    /// Invalid command-line arguments or scenario contents
    InvalidArgs(String),
    /// No capture device or scenario available
    DeviceNotFound(String),
    /// Device cannot detect its input format
    Unsupported(String),
    /// No format detected in time, or the input carried no signal
    Timeout(String),
    /// Any other failure
    General(String),
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CliError::InvalidArgs(msg) => write!(f, "Invalid arguments: {}", msg),
            CliError::DeviceNotFound(msg) => write!(f, "Device not found: {}", msg),
            CliError::Unsupported(msg) => write!(f, "Unsupported device: {}", msg),
            CliError::Timeout(msg) => write!(f, "Timeout: {}", msg),
            CliError::General(msg) => write!(f, "Error: {}", msg),
        }
    }
}

impl std::error::Error for CliError {}

impl CliError {
    /// Get the exit code for this error
    pub fn exit_code(&self) -> ExitCode {
        ExitCode::from(self.code())
    }

    fn code(&self) -> u8 {
        match self {
            CliError::InvalidArgs(_) => 2,
            CliError::DeviceNotFound(_) => 3,
            CliError::Unsupported(_) => 4,
            CliError::Timeout(_) => 6,
            CliError::General(_) => 1,
        }
    }

    /// Prefix the message, keeping the error class.
    pub fn context(self, prefix: &str) -> CliError {
        match self {
            CliError::InvalidArgs(msg) => CliError::InvalidArgs(format!("{}: {}", prefix, msg)),
            CliError::DeviceNotFound(msg) => {
                CliError::DeviceNotFound(format!("{}: {}", prefix, msg))
            }
            CliError::Unsupported(msg) => CliError::Unsupported(format!("{}: {}", prefix, msg)),
            CliError::Timeout(msg) => CliError::Timeout(format!("{}: {}", prefix, msg)),
            CliError::General(msg) => CliError::General(format!("{}: {}", prefix, msg)),
        }
    }
}

/// Map modeprobe::Error to CliError with appropriate exit codes
impl From<modeprobe::Error> for CliError {
    fn from(err: modeprobe::Error) -> Self {
        use modeprobe::Error;

        match err {
            Error::UnsupportedDevice(_) => CliError::Unsupported(err.to_string()),
            Error::TimedOut(_) | Error::NoSignal => CliError::Timeout(err.to_string()),
            Error::DriverNotLoaded(_) => CliError::DeviceNotFound(err.to_string()),
            Error::Configuration { .. }
            | Error::NoModesAvailable
            | Error::StreamStart(_)
            | Error::StreamStop(_)
            | Error::UnknownMode(_)
            | Error::Device(_) => CliError::General(err.to_string()),
        }
    }
}

/// Helper function to convert result to exit code
pub fn result_to_exit_code<T>(result: Result<T, CliError>) -> ExitCode {
    match result {
        Ok(_) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{}", e);
            e.exit_code()
        }
    }
}
