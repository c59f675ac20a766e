//! # Codec
//!
//! Framing of commands and replies on the control channel.
//!
//! A command is one CRLF-terminated line. A reply is either a single `NNN text` line or a
//! multi-line block opened by `NNN-text` and closed by the first line starting with `NNN `.

use std::io::{BufRead, ErrorKind, Write};

use crate::command::Command;
use crate::types::{FtpError, FtpResult, Response};
use crate::Status;

/// Write `command` as one line and flush it.
///
/// Arguments carrying CR or LF are rejected before anything is written.
pub fn send_command<W: Write>(writer: &mut W, command: &Command) -> FtpResult<()> {
    let line = command.to_line();
    let body = line.strip_suffix("\r\n").unwrap_or(&line);
    if body.contains(['\r', '\n']) {
        return Err(FtpError::InvalidCommand(format!(
            "{:?} contains a line break",
            command.redacted()
        )));
    }
    trace!("CC OUT: {}", command.redacted());
    writer
        .write_all(line.as_bytes())
        .and_then(|_| writer.flush())
        .map_err(FtpError::ConnectionError)
}

/// Read one complete reply, whatever its status
pub fn read_reply<R: BufRead>(reader: &mut R) -> FtpResult<Response> {
    let first = read_line(reader)?;
    trace!("CC IN: {:?}", first);
    let (code, multiline) = parse_status_line(&first)?;
    let mut lines = vec![first];
    if multiline {
        let terminator = format!("{code} ");
        let bare = code.to_string();
        loop {
            let line = read_line(reader)?;
            trace!("CC IN: {:?}", line);
            let last = line.starts_with(&terminator) || line == bare;
            lines.push(line);
            if last {
                break;
            }
        }
    }
    Ok(Response::new(code, lines))
}

/// Read one reply and fail with [`FtpError::UnexpectedResponse`] unless its status is in `expected`
pub fn read_response_in<R: BufRead>(reader: &mut R, expected: &[Status]) -> FtpResult<Response> {
    let response = read_reply(reader)?;
    check_status(response, expected)
}

/// Accept `response` only if its status is one of `expected`
pub fn check_status(response: Response, expected: &[Status]) -> FtpResult<Response> {
    if expected.contains(&response.status) {
        Ok(response)
    } else {
        Err(FtpError::UnexpectedResponse(response))
    }
}

/// Parse the status code of the first line of a reply, and whether a multi-line block follows
fn parse_status_line(line: &str) -> FtpResult<(u32, bool)> {
    let bytes = line.as_bytes();
    if bytes.len() < 3 || !bytes[..3].iter().all(u8::is_ascii_digit) {
        return Err(FtpError::BadResponse(format!("invalid reply line {line:?}")));
    }
    let code = line[..3]
        .parse::<u32>()
        .map_err(|_| FtpError::BadResponse(format!("invalid reply code in {line:?}")))?;
    match bytes.get(3) {
        None | Some(b' ') => Ok((code, false)),
        Some(b'-') => Ok((code, true)),
        Some(_) => Err(FtpError::BadResponse(format!("invalid reply line {line:?}"))),
    }
}

/// Read bytes until LF; the line is returned without its terminator
fn read_line<R: BufRead>(reader: &mut R) -> FtpResult<String> {
    let mut buf = Vec::new();
    let read = reader
        .read_until(b'\n', &mut buf)
        .map_err(FtpError::ConnectionError)?;
    if read == 0 {
        return Err(FtpError::ConnectionError(
            ErrorKind::UnexpectedEof.into(),
        ));
    }
    let mut line = String::from_utf8_lossy(&buf).to_string();
    while line.ends_with('\n') || line.ends_with('\r') {
        line.pop();
    }
    Ok(line)
}
