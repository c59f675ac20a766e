//! # List
//!
//! This module exposes the decoders for the lines of a LIST output.
//!
//! There's no specification regarding the LIST command output, so it basically depends on the
//! implementation of the remote FTP server. Three formats are recognized, tried in this order:
//!
//! 1. MLSx facts (`type=file;size=12;modify=20200101120000; name`, RFC 3659)
//! 2. POSIX `ls -l` style
//! 3. DOS `DIR` style
//!
//! Each decoder tells whether a line is not in its format, so the next one can be tried, or
//! whether the line is in its format but broken. Only the former falls through.
//!
//! ```rust,ignore
//! use paraftp::list::{DirectoryEntry, EntryType};
//!
//! let entry: DirectoryEntry = "-rw-rw-r-- 1 0  1  8192 Nov 5 2018 omar.txt".parse().unwrap();
//! assert_eq!(entry.entry_type(), EntryType::File);
//! ```

use std::fmt;
use std::str::FromStr;
use std::time::{Duration, SystemTime};

use chrono::prelude::{DateTime, NaiveDate, NaiveDateTime, Utc};
use chrono::Datelike;
use lazy_regex::{Lazy, Regex};
use thiserror::Error;

// -- Regex

/// POSIX system regex to parse list output
static POSIX_LS_RE: Lazy<Regex> = lazy_regex!(
    r#"^([\-ld])([\-rwxsStT]{9})\s+(\d+)\s+([^ ]+)\s+([^ ]+)\s+(\d+)\s+([^ ]+\s+\d{1,2}\s+(?:\d{1,2}:\d{1,2}|\d{4}))\s+(.+)$"#
);
/// DOS system regex to parse list output
static DOS_LS_RE: Lazy<Regex> = lazy_regex!(
    r#"^(\d{2}\-\d{2}\-\d{2}\s+\d{2}:\d{2}\s*[AP]M|\d{4}\-\d{2}\-\d{2}\s+\d{2}:\d{2})\s+(<DIR>|[\d,]+)\s+(.+)$"#
);

// -- entry

/// Describes an entry of a remote directory
#[derive(Debug, Clone, Eq, PartialEq, Hash)]
pub struct DirectoryEntry {
    name: String,
    entry_type: EntryType,
    /// Size in bytes; only meaningful for files
    size: u64,
    modified: SystemTime,
}

/// Kind of directory entry
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash)]
pub enum EntryType {
    File,
    Folder,
    Link,
}

#[derive(Debug, Error, Eq, PartialEq)]
pub enum ParseError {
    #[error("Syntax error: invalid line")]
    SyntaxError,
    #[error("Invalid date")]
    InvalidDate,
    #[error("Bad file size")]
    BadSize,
    #[error("Unsupported listing format")]
    UnsupportedFormat,
}

impl DirectoryEntry {
    pub fn name(&self) -> &str {
        self.name.as_str()
    }

    pub fn entry_type(&self) -> EntryType {
        self.entry_type
    }

    pub fn size(&self) -> u64 {
        self.size
    }

    /// Returns the last time the entry was modified
    pub fn modified(&self) -> SystemTime {
        self.modified
    }
}

impl fmt::Display for DirectoryEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match self.entry_type {
            EntryType::File => '-',
            EntryType::Folder => 'd',
            EntryType::Link => 'l',
        };
        let modified: DateTime<Utc> = self.modified.into();
        write!(
            f,
            "{kind} {:>12} {} {}",
            self.size,
            modified.format("%Y-%m-%d %H:%M"),
            self.name
        )
    }
}

impl FromStr for DirectoryEntry {
    type Err = ParseError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        ListParserChain::default().parse(line)
    }
}

// -- parsers

/// What a decoder made of a line
#[derive(Debug, Eq, PartialEq)]
pub enum ParseOutcome {
    Parsed(DirectoryEntry),
    /// The line is not in the format of the decoder
    Unsupported,
    /// The line is in the format of the decoder, but invalid
    Malformed(ParseError),
}

impl From<Result<DirectoryEntry, ParseError>> for ParseOutcome {
    fn from(result: Result<DirectoryEntry, ParseError>) -> Self {
        match result {
            Ok(entry) => Self::Parsed(entry),
            Err(err) => Self::Malformed(err),
        }
    }
}

/// A decoder for one listing format. Decoders are pure.
pub trait ListParser: Send + Sync {
    fn parse(&self, line: &str) -> ParseOutcome;
}

/// Decoders tried in order until one recognizes the line
pub struct ListParserChain {
    parsers: Vec<Box<dyn ListParser>>,
}

impl Default for ListParserChain {
    fn default() -> Self {
        Self::new(vec![
            Box::new(MlsxParser),
            Box::new(PosixParser),
            Box::new(DosParser),
        ])
    }
}

impl ListParserChain {
    pub fn new(parsers: Vec<Box<dyn ListParser>>) -> Self {
        Self { parsers }
    }

    /// Decode `line` with the first decoder recognizing its format
    pub fn parse(&self, line: &str) -> Result<DirectoryEntry, ParseError> {
        for parser in self.parsers.iter() {
            match parser.parse(line) {
                ParseOutcome::Parsed(entry) => return Ok(entry),
                ParseOutcome::Malformed(err) => return Err(err),
                ParseOutcome::Unsupported => continue,
            }
        }
        Err(ParseError::UnsupportedFormat)
    }

    /// Like [`ListParserChain::parse`], but lines which can't be decoded are only logged
    pub fn parse_line(&self, line: &str) -> Option<DirectoryEntry> {
        match self.parse(line) {
            Ok(entry) => Some(entry),
            Err(err) => {
                debug!("skipping listing line {line:?}: {err}");
                None
            }
        }
    }
}

/// Decoder for MLSD/MLST facts lines
pub struct MlsxParser;

impl ListParser for MlsxParser {
    fn parse(&self, line: &str) -> ParseOutcome {
        // facts are separated from the name by the first space, and there is at least one fact
        let Some((facts, name)) = line.split_once(' ') else {
            return ParseOutcome::Unsupported;
        };
        if !facts.contains(';') {
            return ParseOutcome::Unsupported;
        }
        trace!("Parsing MLSx line {line}");
        Self::parse_facts(facts, name).into()
    }
}

impl MlsxParser {
    fn parse_facts(facts: &str, name: &str) -> Result<DirectoryEntry, ParseError> {
        let mut entry = DirectoryEntry {
            name: name.to_string(),
            entry_type: EntryType::File,
            size: 0,
            modified: SystemTime::UNIX_EPOCH,
        };
        for fact in facts.trim_end_matches(';').split(';') {
            let (key, value) = match fact.split_once('=') {
                Some((key, value)) if !key.is_empty() => (key, value),
                _ => return Err(ParseError::SyntaxError),
            };
            match key.to_lowercase().as_str() {
                "type" => {
                    let value = value.to_lowercase();
                    entry.entry_type = match value.as_str() {
                        "dir" | "cdir" | "pdir" => EntryType::Folder,
                        _ if value.contains("slink") || value.contains("symlink") => {
                            EntryType::Link
                        }
                        _ => EntryType::File,
                    };
                }
                "size" => {
                    entry.size = value.parse::<u64>().map_err(|_| ParseError::BadSize)?;
                }
                "modify" => {
                    entry.modified = parse_mlsx_time(value)?;
                }
                _ => continue,
            }
        }
        Ok(entry)
    }
}

/// Decoder for `ls -l` style lines
pub struct PosixParser;

impl ListParser for PosixParser {
    fn parse(&self, line: &str) -> ParseOutcome {
        if let Some(metadata) = POSIX_LS_RE.captures(line) {
            trace!("Parsed POSIX line {line}");
            // NOTE: metadata fmt: (regex, file_type, permissions, link_count, uid, gid, filesize, mtime, filename)
            let entry_type = match &metadata[1] {
                "d" => EntryType::Folder,
                "l" => EntryType::Link,
                _ => EntryType::File,
            };
            return Self::entry(
                entry_type,
                &metadata[6],
                metadata[7].trim(),
                &metadata[8],
            )
            .into();
        }
        // servers which don't print owner and group
        let fields: Vec<&str> = line.split_whitespace().collect();
        if fields.len() >= 7 && fields[1] == "folder" && fields[2] == "0" {
            return Self::entry(
                EntryType::Folder,
                "0",
                &fields[3..6].join(" "),
                &fields[6..].join(" "),
            )
            .into();
        }
        if fields.len() >= 8 && fields[1] == "0" {
            return Self::entry(
                EntryType::File,
                fields[2],
                &fields[4..7].join(" "),
                &fields[7..].join(" "),
            )
            .into();
        }
        ParseOutcome::Unsupported
    }
}

impl PosixParser {
    fn entry(
        entry_type: EntryType,
        size: &str,
        modified: &str,
        name: &str,
    ) -> Result<DirectoryEntry, ParseError> {
        let size = match entry_type {
            EntryType::File => size.parse::<u64>().map_err(|_| ParseError::BadSize)?,
            EntryType::Folder | EntryType::Link => 0,
        };
        let modified = parse_lstime(modified, "%b %d %Y", "%b %d %H:%M")?;
        // the name of a symlink is followed by its target
        let name = match entry_type {
            EntryType::Link => name.split(" -> ").next().unwrap_or(name),
            EntryType::File | EntryType::Folder => name,
        };
        trace!("Found entry with name {name}, type: {entry_type:?}, size: {size}");
        Ok(DirectoryEntry {
            name: name.to_string(),
            entry_type,
            size,
            modified,
        })
    }
}

/// Decoder for DOS `DIR` style lines.
///
/// ```text
/// {DATE} {TIME} {<DIR> | SIZE} {FILENAME}
/// 10-19-20  03:19PM <DIR> pub
/// 2014-04-08  15:09       403 readme.txt
/// ```
pub struct DosParser;

impl ListParser for DosParser {
    fn parse(&self, line: &str) -> ParseOutcome {
        let Some(metadata) = DOS_LS_RE.captures(line) else {
            return ParseOutcome::Unsupported;
        };
        trace!("Parsed DOS line {line}");
        let result = parse_dostime(&metadata[1]).and_then(|modified| {
            let (entry_type, size) = match &metadata[2] {
                "<DIR>" => (EntryType::Folder, 0),
                size => (
                    EntryType::File,
                    size.replace(',', "")
                        .parse::<u64>()
                        .map_err(|_| ParseError::BadSize)?,
                ),
            };
            Ok(DirectoryEntry {
                name: metadata[3].to_string(),
                entry_type,
                size,
                modified,
            })
        });
        result.into()
    }
}

// -- time

fn to_system_time(datetime: NaiveDateTime) -> SystemTime {
    u64::try_from(datetime.and_utc().timestamp())
        .ok()
        .and_then(|secs| SystemTime::UNIX_EPOCH.checked_add(Duration::from_secs(secs)))
        .unwrap_or(SystemTime::UNIX_EPOCH)
}

/// Convert MLSD time to System Time; fractions of seconds are ignored
fn parse_mlsx_time(tm: &str) -> Result<SystemTime, ParseError> {
    let tm = tm.split('.').next().unwrap_or(tm);
    NaiveDateTime::parse_from_str(tm, "%Y%m%d%H%M%S")
        .map(to_system_time)
        .map_err(|_| ParseError::InvalidDate)
}

/// Convert ls syntax time to System Time
/// ls time has two possible syntax:
/// 1. if year is current: %b %d %H:%M (e.g. Nov 5 13:46)
/// 2. else: %b %d %Y (e.g. Nov 5 2019)
fn parse_lstime(tm: &str, fmt_year: &str, fmt_hours: &str) -> Result<SystemTime, ParseError> {
    let tm = tm.split_whitespace().collect::<Vec<&str>>().join(" ");
    let datetime = match NaiveDate::parse_from_str(&tm, fmt_year) {
        Ok(date) => date
            .and_hms_opt(0, 0, 0)
            .ok_or(ParseError::InvalidDate)?,
        Err(_) => {
            // We need to add Current Year at the end of the string
            let this_year = Utc::now().year();
            NaiveDateTime::parse_from_str(
                &format!("{tm} {this_year}"),
                &format!("{fmt_hours} %Y"),
            )
            .map_err(|_| ParseError::InvalidDate)?
        }
    };
    Ok(to_system_time(datetime))
}

/// Parse date time string in DOS representation ("%m-%d-%y %I:%M%p" or "%Y-%m-%d %H:%M")
fn parse_dostime(tm: &str) -> Result<SystemTime, ParseError> {
    let tm = tm
        .split_whitespace()
        .collect::<Vec<&str>>()
        .join(" ")
        .replace(" AM", "AM")
        .replace(" PM", "PM");
    NaiveDateTime::parse_from_str(&tm, "%m-%d-%y %I:%M%p")
        .or_else(|_| NaiveDateTime::parse_from_str(&tm, "%Y-%m-%d %H:%M"))
        .map(to_system_time)
        .map_err(|_| ParseError::InvalidDate)
}
