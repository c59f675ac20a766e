//! # Transfer
//!
//! Single file transfers and directory listings

use std::io::{self, BufRead, BufReader, Cursor, ErrorKind, Read, Write};

use super::{DataStream, FtpSession};
use crate::command::Command;
use crate::list::{DirectoryEntry, ListParserChain};
use crate::types::{FtpError, FtpResult};
use crate::Status;

/// A file being retrieved.
///
/// The stream borrows the session: no other command can be issued until it has been
/// finalized. Call [`RetrStream::finalize`] to learn the outcome of the transfer; dropping the
/// stream finalizes it too, logging any error.
pub struct RetrStream<'a> {
    session: &'a mut FtpSession,
    stream: Option<DataStream>,
}

impl<'a> RetrStream<'a> {
    fn new(session: &'a mut FtpSession, stream: DataStream) -> Self {
        Self {
            session,
            stream: Some(stream),
        }
    }

    /// Close the data connection and read the transfer outcome from the control channel.
    ///
    /// If both fail, the control channel error is returned.
    pub fn finalize(mut self) -> FtpResult<()> {
        self.close()
    }

    fn close(&mut self) -> FtpResult<()> {
        let Some(stream) = self.stream.take() else {
            return Ok(());
        };
        debug!("Finalizing retr stream");
        let closed = stream.close();
        self.session
            .read_response_in(&[Status::ClosingDataConnection, Status::RequestedFileActionOk])?;
        closed.map_err(|e| FtpError::DataConnection(e.to_string()))
    }
}

impl Read for RetrStream<'_> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self.stream.as_mut() {
            Some(stream) => stream.read(buf),
            None => Ok(0),
        }
    }
}

impl Drop for RetrStream<'_> {
    fn drop(&mut self) {
        if let Err(err) = self.close() {
            error!("failed to finalize retr stream: {err}");
        }
    }
}

impl FtpSession {
    /// Retrieve `file_name` starting at byte `offset`, as a readable stream
    pub fn retr_as_stream_from(&mut self, file_name: &str, offset: u64) -> FtpResult<RetrStream<'_>> {
        debug!("Retrieving '{file_name}' from {offset}");
        let stream = self.cmd_data_conn_from(offset, Command::Retr(file_name.to_string()))?;
        Ok(RetrStream::new(self, stream))
    }

    /// Retrieve `file_name` as a readable stream
    pub fn retr_as_stream(&mut self, file_name: &str) -> FtpResult<RetrStream<'_>> {
        self.retr_as_stream_from(file_name, 0)
    }

    /// The implementation of `RETR` command where `file_name` is the name of the file
    /// to download and `reader` is the function which operates with the
    /// data stream opened.
    ///
    /// The transfer is finalized whatever `reader` returns; the error of the finalization wins
    /// over the one of `reader`.
    pub fn retr<F, D>(&mut self, file_name: &str, mut reader: F) -> FtpResult<D>
    where
        F: FnMut(&mut dyn Read) -> FtpResult<D>,
    {
        let mut stream = self.retr_as_stream(file_name)?;
        let result = reader(&mut stream);
        stream.finalize()?;
        result
    }

    /// Simple way to retr a file from the server. This stores the file in a buffer in memory.
    pub fn retr_as_buffer(&mut self, file_name: &str) -> FtpResult<Cursor<Vec<u8>>> {
        self.retr(file_name, |reader| {
            let mut buffer = Vec::new();
            reader
                .read_to_end(&mut buffer)
                .map(|_| buffer)
                .map_err(|e| FtpError::DataConnection(e.to_string()))
        })
        .map(Cursor::new)
    }

    /// Store `source` as `filename`, writing from byte `offset` of the remote file.
    ///
    /// Returns the amount of bytes written. The transfer outcome is always read from the
    /// control channel, even if the copy failed; its error wins over the one of the copy.
    pub fn put_file_from<R: Read>(
        &mut self,
        filename: &str,
        source: &mut R,
        offset: u64,
    ) -> FtpResult<u64> {
        debug!("Storing '{filename}' from {offset}");
        let mut stream = self.cmd_data_conn_from(offset, Command::Store(filename.to_string()))?;
        let copied = copy_to_data_stream(source, &mut stream);
        let closed = stream.close();
        self.read_response_in(&[Status::ClosingDataConnection, Status::RequestedFileActionOk])?;
        let copied = copied?;
        closed.map_err(|e| FtpError::DataConnection(e.to_string()))?;
        trace!("Stored {copied} bytes");
        Ok(copied)
    }

    /// Store `source` as `filename`. Returns the amount of bytes written.
    pub fn put_file<R: Read>(&mut self, filename: &str, source: &mut R) -> FtpResult<u64> {
        self.put_file_from(filename, source, 0)
    }

    /// Execute `LIST` command which returns the detailed file listing of `pathname`.
    ///
    /// Lines which no listing format recognizes are skipped.
    pub fn list(&mut self, pathname: Option<&str>) -> FtpResult<Vec<DirectoryEntry>> {
        debug!("Reading {:?} directory content", pathname.unwrap_or(""));
        let lines = self.stream_lines(Command::List(pathname.map(|x| x.to_string())))?;
        let parsers = ListParserChain::default();
        Ok(lines
            .iter()
            .filter_map(|line| parsers.parse_line(line))
            .collect())
    }

    /// Execute `NLST` command which returns the names of the entries of `pathname`
    pub fn nlst(&mut self, pathname: Option<&str>) -> FtpResult<Vec<String>> {
        debug!("Getting file names for {:?}", pathname.unwrap_or(""));
        self.stream_lines(Command::Nlst(pathname.map(|x| x.to_string())))
    }

    /// Execute a command which returns list of strings in a separate stream
    fn stream_lines(&mut self, command: Command) -> FtpResult<Vec<String>> {
        let stream = self.cmd_data_conn_from(0, command)?;
        let mut stream = RetrStream::new(self, stream);
        let lines = read_lines(&mut stream);
        stream.finalize()?;
        lines
    }
}

/// Copy `source` into the data connection, telling local failures from remote ones
fn copy_to_data_stream<R: Read>(source: &mut R, sink: &mut DataStream) -> FtpResult<u64> {
    let mut buffer = [0u8; 8192];
    let mut copied = 0u64;
    loop {
        let read = match source.read(&mut buffer) {
            Ok(0) => break,
            Ok(read) => read,
            Err(err) if err.kind() == ErrorKind::Interrupted => continue,
            Err(err) => return Err(FtpError::LocalIo(err)),
        };
        sink.write_all(&buffer[..read])
            .map_err(|e| FtpError::DataConnection(e.to_string()))?;
        copied += read as u64;
    }
    Ok(copied)
}

/// Read the data connection line by line; empty lines are dropped
fn read_lines<R: Read>(stream: &mut R) -> FtpResult<Vec<String>> {
    let mut reader = BufReader::new(stream);
    let mut lines = Vec::new();
    let mut line = Vec::new();
    loop {
        line.clear();
        let read = reader
            .read_until(b'\n', &mut line)
            .map_err(|e| FtpError::DataConnection(e.to_string()))?;
        if read == 0 {
            break;
        }
        let text = String::from_utf8_lossy(&line);
        let text = text.trim_end_matches(['\r', '\n']);
        if !text.is_empty() {
            lines.push(text.to_string());
        }
    }
    Ok(lines)
}
