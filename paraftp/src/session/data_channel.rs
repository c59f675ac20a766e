//! # Data channel
//!
//! Passive mode negotiation and the two-phase opening of data connections

use std::io::ErrorKind;
use std::net::Shutdown;

use super::{DataStream, FtpSession};
use crate::command::Command;
use crate::regex::{EPSV_PORT_RE, PASV_PORT_RE};
use crate::types::{FtpError, FtpResult, Response};
use crate::Status;

impl FtpSession {
    /// Open a data connection to the port announced by the server.
    ///
    /// `EPSV` is used when the server advertises it (or `nat6`); otherwise `PASV` is tried
    /// first and `EPSV` is the fallback. The host is always the one of the control connection.
    pub(crate) fn open_data_connection(&mut self) -> FtpResult<DataStream> {
        let port = if self.features.contains_key("EPSV") || self.features.contains_key("nat6") {
            self.epsv()?
        } else {
            match self.pasv() {
                Ok(port) => port,
                Err(err) => {
                    debug!("PASV failed ({err}); trying EPSV");
                    self.epsv()?
                }
            }
        };
        let mut addr = self
            .get_ref()
            .peer_addr()
            .map_err(FtpError::ConnectionError)?;
        addr.set_port(port);
        trace!("Data connection address is {addr}");
        let stream = (self.passive_stream_builder)(addr)
            .map_err(|e| FtpError::DataConnection(format!("cannot connect to {addr}: {e}")))?;
        if !self.data_secured {
            return Ok(DataStream::Tcp(stream));
        }
        let trust = self.trust.as_ref().ok_or_else(|| {
            FtpError::DataConnection("data protection without trust material".to_string())
        })?;
        // the server starts TLS only once it accepted the transfer command
        trust
            .wrap(&self.host, stream)
            .map(|stream| DataStream::Ssl(Box::new(stream)))
            .map_err(|e| FtpError::DataConnection(format!("cannot secure {addr}: {e}")))
    }

    /// Open a data connection, then run `command` on it, restarting at `offset` when non-zero.
    ///
    /// The connection is returned once the server confirmed it is about to use it.
    pub(crate) fn cmd_data_conn_from(
        &mut self,
        offset: u64,
        command: Command,
    ) -> FtpResult<DataStream> {
        let data_stream = self.open_data_connection()?;
        if offset != 0 {
            debug!("Restarting transfer at {offset}");
            if let Err(err) = self
                .perform(Command::Rest(offset))
                .and_then(|_| self.read_response(Status::RequestFilePending))
            {
                discard(data_stream);
                return Err(err);
            }
        }
        if let Err(err) = self.perform(command) {
            discard(data_stream);
            return Err(err);
        }
        match self.read_reply() {
            Ok(response)
                if matches!(response.status, Status::AlreadyOpen | Status::AboutToSend) =>
            {
                Ok(data_stream)
            }
            Ok(response) => {
                discard(data_stream);
                Err(FtpError::UnexpectedResponse(response))
            }
            Err(err) => {
                discard(data_stream);
                Err(err)
            }
        }
    }

    /// Runs the EPSV to enter Extended passive mode.
    fn epsv(&mut self) -> FtpResult<u16> {
        debug!("EPSV command");
        self.perform(Command::Epsv)?;
        // EPSV response format : 229 Entering Extended Passive Mode (|||PORT|)
        let response = self.read_response(Status::ExtendedPassiveMode)?;
        let port = parse_epsv_port(&response)?;
        trace!("Got port number from EPSV: {port}");
        Ok(port)
    }

    /// Runs the PASV command to enter passive mode.
    fn pasv(&mut self) -> FtpResult<u16> {
        debug!("PASV command");
        self.perform(Command::Pasv)?;
        // PASV response format : 227 Entering Passive Mode (h1,h2,h3,h4,p1,p2).
        let response = self.read_response(Status::PassiveMode)?;
        let port = parse_pasv_port(&response)?;
        trace!("Got port number from PASV: {port}");
        Ok(port)
    }
}

/// Drop a data connection which won't be used.
///
/// No TLS record is exchanged: the server never started its side.
fn discard(data_stream: DataStream) {
    match data_stream.into_tcp_stream().shutdown(Shutdown::Both) {
        Err(err) if err.kind() != ErrorKind::NotConnected => {
            warn!("failed to close data connection: {err}");
        }
        _ => trace!("unused data connection closed"),
    }
}

/// Port announced by a PASV reply; the address is ignored
pub(crate) fn parse_pasv_port(response: &Response) -> FtpResult<u16> {
    let message = response.message();
    let caps = PASV_PORT_RE
        .captures(&message)
        .ok_or_else(|| FtpError::BadResponse(format!("no address in PASV reply {message:?}")))?;
    let byte = |index: usize| {
        caps[index]
            .parse::<u8>()
            .map_err(|_| FtpError::BadResponse(format!("bad address in PASV reply {message:?}")))
    };
    let (msb, lsb) = (byte(5)?, byte(6)?);
    Ok((u16::from(msb) << 8) | u16::from(lsb))
}

/// Port announced by an EPSV reply
pub(crate) fn parse_epsv_port(response: &Response) -> FtpResult<u16> {
    let message = response.message();
    EPSV_PORT_RE
        .captures(&message)
        .and_then(|caps| caps[1].parse::<u16>().ok())
        .ok_or_else(|| FtpError::BadResponse(format!("no port in EPSV reply {message:?}")))
}
