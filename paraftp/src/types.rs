//! # Types
//!
//! Errors, replies and the values exchanged with the server

use std::collections::HashMap;
use std::fmt;

use thiserror::Error;

use super::Status;

/// A shorthand for a Result whose error type is always an FtpError.
pub type FtpResult<T> = std::result::Result<T, FtpError>;

/// `FtpError` is a library-global error type to describe the different kinds of
/// errors that might occur while using FTP.
#[derive(Debug, Error)]
pub enum FtpError {
    /// Failed to reach the server, or the control connection broke
    #[error("Connection error: {0}")]
    ConnectionError(std::io::Error),
    /// There was an error while setting up or using TLS on the control channel
    #[error("Secure error: {0}")]
    SecureError(String),
    /// The server replied with a status the command did not expect.
    /// Contains the response data.
    #[error("Invalid response: {0}")]
    UnexpectedResponse(Response),
    /// The reply could not be decoded (bad PASV/EPSV/PWD/FEAT payload or malformed line)
    #[error("Response contains an invalid syntax: {0}")]
    BadResponse(String),
    /// The server refused the credentials
    #[error("Login rejected: {0}")]
    LoginRejected(String),
    /// Failed to establish or secure a data connection
    #[error("Data connection error: {0}")]
    DataConnection(String),
    /// The address provided was invalid
    #[error("Invalid address: {0}")]
    InvalidAddress(String),
    /// A command argument would break the line framing of the control channel
    #[error("Invalid command: {0}")]
    InvalidCommand(String),
    /// Failed to read or write the local side of a transfer
    #[error("Local I/O error: {0}")]
    LocalIo(std::io::Error),
    /// One or more tasks of a parallel transfer failed
    #[error("{0}")]
    TransferFailed(TransferErrors),
}

/// Defines a response from the ftp server
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Response {
    pub status: Status,
    /// Raw reply code; kept because codes unknown to [`Status`] collapse to [`Status::Unknown`]
    pub code: u32,
    /// Reply lines, without line terminators
    pub lines: Vec<String>,
}

/// Text Format Control used in `TYPE` command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormatControl {
    /// Default text format control (is NonPrint)
    Default,
    /// Non-print (not destined for printing)
    NonPrint,
}

/// File Type used in `TYPE` command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileType {
    /// ASCII text (the argument is the text format control)
    Ascii(FormatControl),
    /// Binary (image) transfer
    Binary,
}

/// Features returned by FEAT command (name, maybe description)
pub type Features = HashMap<String, Option<String>>;

/// Failures collected by a parallel transfer, one message per failed task
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransferErrors {
    failures: Vec<String>,
}

impl Response {
    /// Instantiates a new `Response`
    pub fn new(code: u32, lines: Vec<String>) -> Self {
        Self {
            status: Status::from(code),
            code,
            lines,
        }
    }

    /// Reply text without the status prefixes; lines of a multi-line reply are joined by `\n`
    pub fn message(&self) -> String {
        let prefix_dash = format!("{}-", self.code);
        let prefix_space = format!("{} ", self.code);
        self.lines
            .iter()
            .map(|line| {
                line.strip_prefix(&prefix_dash)
                    .or_else(|| line.strip_prefix(&prefix_space))
                    .unwrap_or(line)
            })
            .collect::<Vec<&str>>()
            .join("\n")
            .trim_end()
            .to_string()
    }
}

impl fmt::Display for Response {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code, self.message())
    }
}

impl TransferErrors {
    /// Record the failure message of one task
    pub fn push(&mut self, message: impl ToString) {
        self.failures.push(message.to_string());
    }

    pub fn is_empty(&self) -> bool {
        self.failures.is_empty()
    }

    pub fn len(&self) -> usize {
        self.failures.len()
    }

    /// Failure messages in the order they were collected
    pub fn failures(&self) -> &[String] {
        &self.failures
    }
}

impl fmt::Display for TransferErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.failures.join("\n"))
    }
}

impl fmt::Display for FormatControl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FormatControl::Default | FormatControl::NonPrint => write!(f, "N"),
        }
    }
}

impl fmt::Display for FileType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FileType::Ascii(fc) => write!(f, "A {fc}"),
            FileType::Binary => write!(f, "I"),
        }
    }
}
