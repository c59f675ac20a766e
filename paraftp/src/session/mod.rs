//! # Session
//!
//! The control session: one command/response connection to the server, with its negotiated
//! TLS state, the server features and the credentials needed to open sibling sessions.

mod data_channel;
mod data_stream;
mod tls;
mod transfer;

use std::io::{BufReader, ErrorKind};
use std::net::{Shutdown, SocketAddr, TcpStream, ToSocketAddrs};
use std::sync::Arc;
use std::time::Duration;

pub use data_stream::DataStream;
pub use tls::{TlsStream, TrustMaterial};
pub use transfer::RetrStream;

use crate::codec;
use crate::command::feat::parse_features;
use crate::command::Command;
use crate::types::{Features, FileType, FtpError, FtpResult, Response};
use crate::Status;

/// A function that creates a new stream for the data connection in passive mode.
///
/// It takes a [`SocketAddr`] and returns a [`TcpStream`].
pub type PassiveStreamBuilder = dyn Fn(SocketAddr) -> FtpResult<TcpStream> + Send + Sync;

/// A control session with an FTP server.
///
/// A session serves one command at a time; concurrency is achieved by opening more sessions
/// with [`FtpSession::clone_session`], never by sharing one.
pub struct FtpSession {
    reader: BufReader<DataStream>,
    host: String,
    port: u16,
    timeout: Option<Duration>,
    trust: Option<TrustMaterial>,
    control_secured: bool,
    data_secured: bool,
    credentials: Option<(String, String)>,
    features: Features,
    welcome_msg: Option<String>,
    passive_stream_builder: Arc<PassiveStreamBuilder>,
    closed: bool,
}

/// Everything needed to open a sibling of a logged in session, from any thread
#[derive(Clone)]
pub(crate) struct SessionTemplate {
    host: String,
    port: u16,
    timeout: Option<Duration>,
    trust: Option<TrustMaterial>,
    secured: bool,
    credentials: (String, String),
    passive_stream_builder: Arc<PassiveStreamBuilder>,
    directory: String,
}

impl FtpSession {
    /// Connect to `addr` (`host:port`), read the greeting and probe the server features.
    ///
    /// `timeout` bounds the establishment of the control connection and of every data
    /// connection opened later on; `trust` is required to secure the session with
    /// [`FtpSession::auth_tls`].
    pub fn dial(
        addr: &str,
        timeout: Option<Duration>,
        trust: Option<TrustMaterial>,
    ) -> FtpResult<Self> {
        let (host, port) = split_address(addr)?;
        Self::dial_endpoint(host, port, timeout, trust)
    }

    /// Connect to `addr` without timeout nor trust material
    pub fn connect(addr: &str) -> FtpResult<Self> {
        Self::dial(addr, None, None)
    }

    fn dial_endpoint(
        host: String,
        port: u16,
        timeout: Option<Duration>,
        trust: Option<TrustMaterial>,
    ) -> FtpResult<Self> {
        debug!("Connecting to server {host}:{port}");
        let stream = connect_tcp(&host, port, timeout).map_err(FtpError::ConnectionError)?;
        debug!("Established connection with server");
        let mut session = Self {
            reader: BufReader::new(DataStream::Tcp(stream)),
            host,
            port,
            timeout,
            trust,
            control_secured: false,
            data_secured: false,
            credentials: None,
            features: Features::new(),
            welcome_msg: None,
            passive_stream_builder: default_passive_stream_builder(timeout),
            closed: false,
        };
        debug!("Reading server response...");
        let response = session.read_response(Status::Ready)?;
        let welcome_msg = response.message();
        debug!("Server READY; response: {welcome_msg:?}");
        session.welcome_msg = Some(welcome_msg);
        session.probe_features()?;
        Ok(session)
    }

    /// Set a custom [`PassiveStreamBuilder`] for passive mode.
    ///
    /// The stream builder is a function that takes a `SocketAddr` and returns a `TcpStream` and it's used
    /// to create the [`TcpStream`] for the data connection in passive mode.
    /// Sessions cloned from this one use the same builder.
    pub fn passive_stream_builder<F>(mut self, stream_builder: F) -> Self
    where
        F: Fn(SocketAddr) -> FtpResult<TcpStream> + Send + Sync + 'static,
    {
        self.passive_stream_builder = Arc::new(stream_builder);
        self
    }

    /// Secure the control channel with TLS (`AUTH TLS`), then protect the data channel
    /// (`PBSZ 0`, `PROT P`).
    ///
    /// On failure the session is left in an unspecified state and must be discarded.
    pub fn auth_tls(&mut self) -> FtpResult<()> {
        let trust = self
            .trust
            .clone()
            .ok_or_else(|| FtpError::SecureError("no trust material configured".to_string()))?;
        if self.control_secured {
            debug!("control channel is already secured");
            return Ok(());
        }
        debug!("Initializing TLS auth");
        self.perform(Command::Auth)?;
        self.read_response(Status::AuthOk)?;
        debug!("TLS OK; initializing ssl stream");
        let socket = self
            .get_ref()
            .try_clone()
            .map_err(FtpError::ConnectionError)?;
        let stream = trust
            .handshake(&self.host, socket)
            .map_err(FtpError::SecureError)?;
        self.reader = BufReader::new(DataStream::Ssl(Box::new(stream)));
        self.control_secured = true;
        debug!("TLS Stream OK");
        // Set protection buffer size
        self.perform(Command::Pbsz(0))?;
        self.read_response(Status::CommandOk)?;
        // Change the level of data protection to Private
        self.perform(Command::ProtPrivate)?;
        self.read_response(Status::CommandOk)?;
        self.data_secured = true;
        Ok(())
    }

    /// Log in to the FTP server.
    ///
    /// On success the transfer type is switched to binary and the features are probed again.
    /// The credentials are kept for [`FtpSession::clone_session`] only once the session is
    /// fully usable.
    pub fn login(&mut self, user: &str, password: &str) -> FtpResult<()> {
        debug!("Signin in with user '{user}'");
        self.perform(Command::User(user.to_string()))?;
        let response = self.read_reply()?;
        match response.status {
            Status::LoggedIn => debug!("No password required"),
            Status::NeedPassword => {
                debug!("Password is required");
                self.perform(Command::Pass(password.to_string()))?;
                let response = self.read_reply()?;
                if response.status != Status::LoggedIn {
                    return Err(FtpError::LoginRejected(response.message()));
                }
            }
            _ => return Err(FtpError::LoginRejected(response.message())),
        }
        debug!("Login OK");
        self.transfer_type(FileType::Binary)?;
        self.credentials = Some((user.to_string(), password.to_string()));
        self.probe_features()
    }

    /// Query the server features (`FEAT`), replacing the known ones.
    ///
    /// A server which doesn't support `FEAT` has no extended feature.
    pub fn probe_features(&mut self) -> FtpResult<()> {
        debug!("Getting server features");
        self.perform(Command::Feat)?;
        let response = self.read_reply()?;
        self.features = if response.status == Status::System {
            parse_features(&response)
        } else {
            warn!("FEAT is not supported: {response}");
            Features::new()
        };
        Ok(())
    }

    /// Set the file type to be used for file transfers
    pub fn transfer_type(&mut self, file_type: FileType) -> FtpResult<()> {
        debug!("Setting transfer type {}", file_type);
        self.perform(Command::Type(file_type))?;
        self.read_response(Status::CommandOk).map(|_| ())
    }

    /// Change the current directory to the path specified
    pub fn cwd(&mut self, path: &str) -> FtpResult<()> {
        debug!("Changing working directory to {path}");
        self.perform(Command::Cwd(path.to_string()))?;
        self.read_response(Status::RequestedFileActionOk)
            .map(|_| ())
    }

    /// Move the current directory to the parent directory
    pub fn cdup(&mut self) -> FtpResult<()> {
        debug!("Going to parent directory");
        self.perform(Command::Cdup)?;
        self.read_response_in(&[Status::CommandOk, Status::RequestedFileActionOk])
            .map(|_| ())
    }

    /// Get the current directory of the session
    pub fn pwd(&mut self) -> FtpResult<String> {
        debug!("Getting working directory");
        self.perform(Command::Pwd)?;
        let response = self.read_response(Status::PathCreated)?;
        let message = response.message();
        match (message.find('"'), message.rfind('"')) {
            (Some(begin), Some(end)) if begin < end => {
                let path = message[begin + 1..end].to_string();
                debug!("Working directory is {path}");
                Ok(path)
            }
            _ => Err(FtpError::BadResponse(format!(
                "no quoted path in PWD reply {message:?}"
            ))),
        }
    }

    /// Rename `from_name` to `to_name`
    pub fn rename(&mut self, from_name: &str, to_name: &str) -> FtpResult<()> {
        debug!("Renaming '{from_name}' to '{to_name}'");
        self.perform(Command::RenameFrom(from_name.to_string()))?;
        self.read_response(Status::RequestFilePending)?;
        self.perform(Command::RenameTo(to_name.to_string()))?;
        self.read_response(Status::RequestedFileActionOk)
            .map(|_| ())
    }

    /// Remove the remote file
    pub fn rm(&mut self, filename: &str) -> FtpResult<()> {
        debug!("Removing file {filename}");
        self.perform(Command::Dele(filename.to_string()))?;
        self.read_response(Status::RequestedFileActionOk)
            .map(|_| ())
    }

    /// Create a new directory on the server
    pub fn mkdir(&mut self, pathname: &str) -> FtpResult<()> {
        debug!("Creating directory at {pathname}");
        self.perform(Command::Mkd(pathname.to_string()))?;
        self.read_response(Status::PathCreated).map(|_| ())
    }

    /// Remove the remote directory; it must be empty
    pub fn rmdir(&mut self, pathname: &str) -> FtpResult<()> {
        debug!("Removing directory {pathname}");
        self.perform(Command::Rmd(pathname.to_string()))?;
        self.read_response(Status::RequestedFileActionOk)
            .map(|_| ())
    }

    /// This does nothing. This is usually just used to keep the connection open.
    pub fn noop(&mut self) -> FtpResult<()> {
        debug!("Pinging server");
        self.perform(Command::Noop)?;
        self.read_response(Status::CommandOk).map(|_| ())
    }

    /// Log out (`REIN`); the connection stays open and a new login is possible
    pub fn logout(&mut self) -> FtpResult<()> {
        debug!("Reinitializing session");
        self.perform(Command::Rein)?;
        self.read_response(Status::Ready)?;
        self.credentials = None;
        Ok(())
    }

    /// Quit the current FTP session and close the connection.
    ///
    /// The connection is closed even when `QUIT` fails; the outcome of `QUIT` is returned.
    pub fn quit(&mut self) -> FtpResult<()> {
        debug!("Quitting stream");
        let result = self
            .perform(Command::Quit)
            .and_then(|_| self.read_response(Status::Closing))
            .map(|_| ());
        self.close_transport();
        result
    }

    /// Run a raw command line and read its reply, which must have one of the `expected` status.
    pub fn exec(&mut self, command: &str, expected: &[Status]) -> FtpResult<Response> {
        debug!("Executing custom command {command}");
        self.perform(Command::Custom(command.to_string()))?;
        self.read_response_in(expected)
    }

    /// Open a new session on the same server, logged in with the same credentials, secured
    /// if this one is, and whose current directory is `dir`.
    pub fn clone_session(&self, dir: &str) -> FtpResult<FtpSession> {
        self.template(dir)?.open()
    }

    pub(crate) fn template(&self, dir: &str) -> FtpResult<SessionTemplate> {
        let credentials = self.credentials.clone().ok_or_else(|| {
            FtpError::LoginRejected("the session is not logged in".to_string())
        })?;
        Ok(SessionTemplate {
            host: self.host.clone(),
            port: self.port,
            timeout: self.timeout,
            trust: self.trust.clone(),
            secured: self.control_secured,
            credentials,
            passive_stream_builder: Arc::clone(&self.passive_stream_builder),
            directory: dir.to_string(),
        })
    }

    /// Returns welcome message retrieved from server (if available)
    pub fn welcome_msg(&self) -> Option<&str> {
        self.welcome_msg.as_deref()
    }

    /// Features probed at the last `FEAT`
    pub fn features(&self) -> &Features {
        &self.features
    }

    /// Whether the control channel is secured
    pub fn is_secure(&self) -> bool {
        self.control_secured
    }

    /// Whether [`FtpSession::quit`] has been called
    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Returns a reference to the underlying [`TcpStream`].
    ///
    /// Can be used to apply a response timeout:
    /// ```rust,ignore
    /// session.get_ref().set_read_timeout(Some(Duration::from_secs(10)))?;
    /// ```
    pub fn get_ref(&self) -> &TcpStream {
        self.reader.get_ref().get_ref()
    }

    // -- private

    /// Write command to the control channel
    fn perform(&mut self, command: Command) -> FtpResult<()> {
        if self.closed {
            return Err(FtpError::ConnectionError(ErrorKind::NotConnected.into()));
        }
        codec::send_command(self.reader.get_mut(), &command)
    }

    /// Read the next reply, whatever its status
    fn read_reply(&mut self) -> FtpResult<Response> {
        codec::read_reply(&mut self.reader)
    }

    fn read_response(&mut self, expected_code: Status) -> FtpResult<Response> {
        self.read_response_in(&[expected_code])
    }

    fn read_response_in(&mut self, expected_code: &[Status]) -> FtpResult<Response> {
        codec::read_response_in(&mut self.reader, expected_code)
    }

    fn close_transport(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        match self.get_ref().shutdown(Shutdown::Both) {
            Err(err) if err.kind() != ErrorKind::NotConnected => {
                warn!("failed to close control connection: {err}");
            }
            _ => trace!("control connection closed"),
        }
    }
}

impl SessionTemplate {
    /// Dial, secure, login and move into the template directory.
    ///
    /// A session which fails after dial is quit before returning the error.
    pub(crate) fn open(&self) -> FtpResult<FtpSession> {
        let mut session = FtpSession::dial_endpoint(
            self.host.clone(),
            self.port,
            self.timeout,
            self.trust.clone(),
        )?;
        session.passive_stream_builder = Arc::clone(&self.passive_stream_builder);
        if let Err(err) = self.prepare(&mut session) {
            if let Err(quit_err) = session.quit() {
                warn!("failed to quit unusable session: {quit_err}");
            }
            return Err(err);
        }
        Ok(session)
    }

    fn prepare(&self, session: &mut FtpSession) -> FtpResult<()> {
        if self.secured {
            session.auth_tls()?;
        }
        let (user, password) = &self.credentials;
        session.login(user, password)?;
        session.cwd(&self.directory)
    }
}

/// Split `host:port`; IPv6 hosts are enclosed in brackets
fn split_address(addr: &str) -> FtpResult<(String, u16)> {
    let (host, port) = addr
        .rsplit_once(':')
        .ok_or_else(|| FtpError::InvalidAddress(format!("{addr}: missing port")))?;
    let port = port
        .parse::<u16>()
        .map_err(|_| FtpError::InvalidAddress(format!("{addr}: bad port")))?;
    let host = host.trim_start_matches('[').trim_end_matches(']');
    if host.is_empty() {
        return Err(FtpError::InvalidAddress(format!("{addr}: missing host")));
    }
    Ok((host.to_string(), port))
}

/// Connect to the first reachable address `host` resolves to
fn connect_tcp(host: &str, port: u16, timeout: Option<Duration>) -> std::io::Result<TcpStream> {
    let mut last_err = None;
    for addr in (host, port).to_socket_addrs()? {
        let stream = match timeout {
            Some(timeout) => TcpStream::connect_timeout(&addr, timeout),
            None => TcpStream::connect(addr),
        };
        match stream {
            Ok(stream) => return Ok(stream),
            Err(err) => {
                debug!("cannot connect to {addr}: {err}");
                last_err = Some(err);
            }
        }
    }
    Err(last_err.unwrap_or_else(|| {
        std::io::Error::new(ErrorKind::NotFound, format!("{host} has no address"))
    }))
}

/// Default stream builder
fn default_passive_stream_builder(timeout: Option<Duration>) -> Arc<PassiveStreamBuilder> {
    Arc::new(move |addr| {
        match timeout {
            Some(timeout) => TcpStream::connect_timeout(&addr, timeout),
            None => TcpStream::connect(addr),
        }
        .map_err(FtpError::ConnectionError)
    })
}
