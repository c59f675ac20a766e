//! # FTP Regex
//!
//! Regular expressions to parse FTP response

use lazy_regex::{Lazy, Regex};

/// This regex extracts IP and Port details from PASV command response.
/// The regex looks for the pattern (h1,h2,h3,h4,p1,p2).
pub static PASV_PORT_RE: Lazy<Regex> =
    lazy_regex!(r"\((\d{1,3}),(\d{1,3}),(\d{1,3}),(\d{1,3}),(\d{1,3}),(\d{1,3})\)");

/// This regex extract the port number from EPSV command response.
/// The regex looks for the pattern |||port_number|
pub static EPSV_PORT_RE: Lazy<Regex> = lazy_regex!(r"\|\|\|(\d{1,5})\|");
