#![crate_name = "paraftp"]
#![crate_type = "lib"]

//! # paraftp
//!
//! paraftp is a blocking FTP client library with explicit FTPS support and parallel
//! multi-file transfers.
//!
//! - a control session ([`FtpSession`]) speaking the classic FTP verbs, optionally upgraded to
//!   TLS with `AUTH TLS` before login
//! - passive data connections (`EPSV` when advertised, otherwise `PASV`), restartable with `REST`
//! - streaming and buffered retrievals, uploads, `NLST` and `LIST` (decoded by a chain of
//!   MLSx, POSIX `ls` and DOS listing parsers)
//! - [`FtpSession::multiple_transfer`], which spreads a batch of uploads and downloads over a set
//!   of sessions cloned from the current one
//!
//! ## Usage
//!
//! ```rust,no_run
//! use paraftp::{FtpSession, TransferTask};
//!
//! let mut session = FtpSession::connect("127.0.0.1:2121").unwrap();
//! session.login("test", "test").unwrap();
//! session.cwd("/upload").unwrap();
//! let tasks = vec![
//!     TransferTask::store("a.bin", "a.bin"),
//!     TransferTask::store("b.bin", "b.bin"),
//! ];
//! session.multiple_transfer(tasks, Some(2)).unwrap();
//! assert!(session.quit().is_ok());
//! ```
//!
//! ## FTPS
//!
//! Sessions are secured in explicit mode: dial as usual, providing the trust material, then
//! switch to TLS before authenticating.
//!
//! ```rust,no_run
//! use std::time::Duration;
//! use paraftp::{FtpSession, TrustMaterial};
//!
//! let trust = TrustMaterial::from_pem_file("/etc/ssl/ftp-ca.pem").unwrap();
//! let mut session =
//!     FtpSession::dial("ftp.example.com:21", Some(Duration::from_secs(30)), Some(trust)).unwrap();
//! session.auth_tls().unwrap();
//! session.login("demo", "password").unwrap();
//! assert!(session.quit().is_ok());
//! ```
//!

#![doc(html_playground_url = "https://play.rust-lang.org")]

// -- common deps
#[macro_use]
extern crate lazy_regex;
#[macro_use]
extern crate log;

// -- private
mod codec;
pub(crate) mod command;
mod regex;
mod session;
mod status;
#[cfg(test)]
mod test_container;
#[cfg(test)]
mod test_server;

// -- public
pub mod list;
pub mod parallel;
pub mod types;

// -- secure deps
pub extern crate rustls_crate as rustls;

// -- export
pub use list::{DirectoryEntry, EntryType, ListParser, ListParserChain};
pub use parallel::{TransferDirection, TransferTask};
pub use session::{DataStream, FtpSession, PassiveStreamBuilder, RetrStream, TlsStream, TrustMaterial};
pub use status::Status;
pub use types::{FileType, FormatControl, FtpError, FtpResult, Response, TransferErrors};

// -- test logging
#[cfg(test)]
pub fn log_init() {
    let _ = env_logger::builder().is_test(true).try_init();
}
