//! # Command
//!
//! The set of FTP commands issued by a session

pub mod feat;

use std::fmt;

use crate::types::FileType;

/// Ftp commands with their arguments
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Ask the server to secure the control channel with TLS
    Auth,
    /// Change directory to parent directory
    Cdup,
    /// Change working directory
    Cwd(String),
    /// Any command line, sent as is
    Custom(String),
    /// Remove file at specified path
    Dele(String),
    /// Extended passive mode <https://www.rfc-editor.org/rfc/rfc2428#section-3>
    Epsv,
    /// List extended features supported by the server <https://www.rfc-editor.org/rfc/rfc2389>
    Feat,
    /// List entries at specified path. If path is not provided list entries at current working directory
    List(Option<String>),
    /// Make directory
    Mkd(String),
    /// Get the list of file names at specified path. If path is not provided list entries at current working directory
    Nlst(Option<String>),
    /// Ping server
    Noop,
    /// Provide login password
    Pass(String),
    /// Passive mode
    Pasv,
    /// Protection buffer size
    Pbsz(usize),
    /// Set the data channel protection level to Private
    ProtPrivate,
    /// Print working directory
    Pwd,
    /// Quit
    Quit,
    /// Reinitialize the session, logging the user out
    Rein,
    /// Select file to rename
    RenameFrom(String),
    /// Rename selected file to
    RenameTo(String),
    /// Restart the next transfer at offset
    Rest(u64),
    /// Retrieve file
    Retr(String),
    /// Remove directory
    Rmd(String),
    /// Put file at specified path
    Store(String),
    /// Set transfer type
    Type(FileType),
    /// Provide user to login as
    User(String),
}

impl Command {
    /// Line to write to the log in place of the wire form; hides secrets
    pub fn redacted(&self) -> String {
        match self {
            Self::Pass(_) => "PASS ********".to_string(),
            cmd => cmd.to_string(),
        }
    }

    /// Wire form of the command, terminated by CRLF
    pub fn to_line(&self) -> String {
        format!("{self}\r\n")
    }
}

// -- stringify

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Auth => write!(f, "AUTH TLS"),
            Self::Cdup => write!(f, "CDUP"),
            Self::Cwd(d) => write!(f, "CWD {d}"),
            Self::Custom(c) => write!(f, "{c}"),
            Self::Dele(p) => write!(f, "DELE {p}"),
            Self::Epsv => write!(f, "EPSV"),
            Self::Feat => write!(f, "FEAT"),
            Self::List(Some(p)) => write!(f, "LIST {p}"),
            Self::List(None) => write!(f, "LIST"),
            Self::Mkd(p) => write!(f, "MKD {p}"),
            Self::Nlst(Some(p)) => write!(f, "NLST {p}"),
            Self::Nlst(None) => write!(f, "NLST"),
            Self::Noop => write!(f, "NOOP"),
            Self::Pass(p) => write!(f, "PASS {p}"),
            Self::Pasv => write!(f, "PASV"),
            Self::Pbsz(sz) => write!(f, "PBSZ {sz}"),
            Self::ProtPrivate => write!(f, "PROT P"),
            Self::Pwd => write!(f, "PWD"),
            Self::Quit => write!(f, "QUIT"),
            Self::Rein => write!(f, "REIN"),
            Self::RenameFrom(p) => write!(f, "RNFR {p}"),
            Self::RenameTo(p) => write!(f, "RNTO {p}"),
            Self::Rest(offset) => write!(f, "REST {offset}"),
            Self::Retr(p) => write!(f, "RETR {p}"),
            Self::Rmd(p) => write!(f, "RMD {p}"),
            Self::Store(p) => write!(f, "STOR {p}"),
            Self::Type(t) => write!(f, "TYPE {t}"),
            Self::User(u) => write!(f, "USER {u}"),
        }
    }
}
