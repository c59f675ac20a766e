//! # Data Stream
//!
//! This module exposes the stream where bytes must be written to/read from, for both the
//! control channel and the data connections

use std::io::{ErrorKind, Read, Result, Write};
use std::net::{Shutdown, TcpStream};

use rustls::StreamOwned;

use super::tls::TlsStream;

/// Data Stream used for communications. It can be both of type Tcp in case of plain communication or Ssl in case of FTPS
#[derive(Debug)]
pub enum DataStream {
    Tcp(TcpStream),
    Ssl(Box<TlsStream>),
}

impl DataStream {
    /// Unwrap the stream into TcpStream, dropping the TLS session if any.
    pub fn into_tcp_stream(self) -> TcpStream {
        match self {
            DataStream::Tcp(stream) => stream,
            DataStream::Ssl(stream) => {
                let StreamOwned { sock, .. } = *stream;
                sock
            }
        }
    }

    /// Returns a reference to the underlying TcpStream.
    pub fn get_ref(&self) -> &TcpStream {
        match self {
            DataStream::Tcp(ref stream) => stream,
            DataStream::Ssl(ref stream) => stream.get_ref(),
        }
    }

    /// Whether bytes on this stream are encrypted
    pub fn is_secure(&self) -> bool {
        matches!(self, DataStream::Ssl(_))
    }

    /// Flush, send close_notify if secured, then shutdown the socket.
    ///
    /// A peer which already closed its side is not an error.
    pub fn close(mut self) -> Result<()> {
        self.flush()?;
        if let DataStream::Ssl(ref mut stream) = self {
            stream.conn.send_close_notify();
            while stream.conn.wants_write() {
                match stream.conn.write_tls(&mut stream.sock) {
                    Ok(_) => {}
                    Err(err)
                        if matches!(
                            err.kind(),
                            ErrorKind::BrokenPipe | ErrorKind::ConnectionReset
                        ) =>
                    {
                        break
                    }
                    Err(err) => return Err(err),
                }
            }
        }
        match self.get_ref().shutdown(Shutdown::Both) {
            Err(err) if err.kind() != ErrorKind::NotConnected => Err(err),
            _ => {
                trace!("data stream closed");
                Ok(())
            }
        }
    }
}

// -- sync

impl Read for DataStream {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        match self {
            DataStream::Tcp(ref mut stream) => stream.read(buf),
            DataStream::Ssl(ref mut stream) => match stream.read(buf) {
                // servers often drop the data socket without close_notify once done
                Err(err) if err.kind() == ErrorKind::UnexpectedEof => Ok(0),
                other => other,
            },
        }
    }
}

impl Write for DataStream {
    fn write(&mut self, buf: &[u8]) -> Result<usize> {
        match self {
            DataStream::Tcp(ref mut stream) => stream.write(buf),
            DataStream::Ssl(ref mut stream) => stream.write(buf),
        }
    }

    fn flush(&mut self) -> Result<()> {
        match self {
            DataStream::Tcp(ref mut stream) => stream.flush(),
            DataStream::Ssl(ref mut stream) => stream.flush(),
        }
    }
}
