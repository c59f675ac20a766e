//! # Status
//!
//! Reply codes a client meets while driving a session, as defined by RFC 959, RFC 2228 and RFC 2428

use thiserror::Error;

/// Reply status parsed from the first three digits of a server reply.
///
/// Codes not listed here map to [`Status::Unknown`]; the raw code is still kept in [`crate::types::Response`].
#[derive(Debug, Copy, Clone, Error, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u32)]
pub enum Status {
    // 1xx
    #[error("data connection already open; transfer starting")]
    AlreadyOpen = 125,
    #[error("file status okay; about to open data connection")]
    AboutToSend = 150,
    // 2xx
    #[error("command okay")]
    CommandOk = 200,
    #[error("command not implemented, superfluous at this site")]
    CommandNotImplemented = 202,
    #[error("system status")]
    System = 211,
    #[error("file status")]
    File = 213,
    #[error("service ready for new user")]
    Ready = 220,
    #[error("service closing control connection")]
    Closing = 221,
    #[error("closing data connection")]
    ClosingDataConnection = 226,
    #[error("entering passive mode")]
    PassiveMode = 227,
    #[error("entering extended passive mode")]
    ExtendedPassiveMode = 229,
    #[error("user logged in, proceed")]
    LoggedIn = 230,
    #[error("security data exchange complete")]
    AuthOk = 234,
    #[error("requested file action okay, completed")]
    RequestedFileActionOk = 250,
    #[error("pathname created")]
    PathCreated = 257,
    // 3xx
    #[error("user name okay, need password")]
    NeedPassword = 331,
    #[error("requested file action pending further information")]
    RequestFilePending = 350,
    // 4xx
    #[error("service not available, closing control connection")]
    NotAvailable = 421,
    #[error("can't open data connection")]
    CannotOpenDataConnection = 425,
    #[error("connection closed; transfer aborted")]
    TransferAborted = 426,
    #[error("requested file action not taken")]
    RequestFileActionIgnored = 450,
    // 5xx
    #[error("syntax error, command unrecognized")]
    BadCommand = 500,
    #[error("syntax error in parameters or arguments")]
    BadArguments = 501,
    #[error("command not implemented")]
    NotImplemented = 502,
    #[error("bad sequence of commands")]
    BadSequence = 503,
    #[error("not logged in")]
    NotLoggedIn = 530,
    #[error("requested action not taken; file unavailable")]
    FileUnavailable = 550,
    #[error("requested action not taken; file name not allowed")]
    BadFilename = 553,
    #[error("unknown status code")]
    Unknown = 0,
}

impl Status {
    /// Get status code
    pub fn code(&self) -> u32 {
        *self as u32
    }

    /// Get status description
    pub fn desc(&self) -> String {
        self.to_string()
    }
}

impl From<u32> for Status {
    fn from(code: u32) -> Self {
        match code {
            125 => Self::AlreadyOpen,
            150 => Self::AboutToSend,
            200 => Self::CommandOk,
            202 => Self::CommandNotImplemented,
            211 => Self::System,
            213 => Self::File,
            220 => Self::Ready,
            221 => Self::Closing,
            226 => Self::ClosingDataConnection,
            227 => Self::PassiveMode,
            229 => Self::ExtendedPassiveMode,
            230 => Self::LoggedIn,
            234 => Self::AuthOk,
            250 => Self::RequestedFileActionOk,
            257 => Self::PathCreated,
            331 => Self::NeedPassword,
            350 => Self::RequestFilePending,
            421 => Self::NotAvailable,
            425 => Self::CannotOpenDataConnection,
            426 => Self::TransferAborted,
            450 => Self::RequestFileActionIgnored,
            500 => Self::BadCommand,
            501 => Self::BadArguments,
            502 => Self::NotImplemented,
            503 => Self::BadSequence,
            530 => Self::NotLoggedIn,
            550 => Self::FileUnavailable,
            553 => Self::BadFilename,
            _ => Self::Unknown,
        }
    }
}
