//! # Test server
//!
//! A scripted FTP server running in process, with an in-memory file tree.
//!
//! It speaks just enough of the protocol to exercise sessions: login (`test`/`test`, or
//! `anonymous` without password), directory verbs, `FEAT`, `PASV`/`EPSV`, `REST` and the
//! `RETR`/`STOR`/`LIST`/`NLST` transfers. Every command received is logged, `PASS` redacted.
//!
//! With [`ServerConfig::tls`] set, it also accepts `AUTH TLS`, `PBSZ` and `PROT`, using a
//! self-signed certificate for `localhost`. Protected data connections start TLS after `150`.

use std::collections::{BTreeMap, BTreeSet};
use std::io::{BufRead, BufReader, Read, Write};
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use rustls::crypto::ring;
use rustls::{ServerConnection, StreamOwned};
use rustls_pki_types::{CertificateDer, PrivateKeyDer, PrivatePkcs8KeyDer};

use crate::{FtpSession, TrustMaterial};

/// Behaviour of a [`TestServer`]
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Features listed by `FEAT`; `None` if `FEAT` is not supported
    pub features: Option<Vec<String>>,
    pub pasv: bool,
    pub epsv: bool,
    /// Amount of successful logins accepted over the lifetime of the server
    pub login_budget: Option<usize>,
    /// Accept `AUTH TLS`
    pub tls: bool,
    /// Verbs answered with `502`
    pub refuse: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            features: Some(vec![String::from("UTF8"), String::from("REST STREAM")]),
            pasv: true,
            epsv: true,
            login_budget: None,
            tls: false,
            refuse: Vec::new(),
        }
    }
}

#[derive(Default)]
struct State {
    files: BTreeMap<String, Vec<u8>>,
    dirs: BTreeSet<String>,
    commands: Vec<String>,
    logins: usize,
}

pub struct TestServer {
    addr: SocketAddr,
    state: Arc<Mutex<State>>,
    certificate: Option<CertificateDer<'static>>,
}

/// Self-signed identity for `localhost` and `127.0.0.1`
fn tls_identity() -> (Arc<rustls::ServerConfig>, CertificateDer<'static>) {
    let names = vec![String::from("localhost"), String::from("127.0.0.1")];
    let cert = rcgen::generate_simple_self_signed(names).expect("failed to generate certificate");
    let der = CertificateDer::from(cert.serialize_der().expect("failed to serialize certificate"));
    let key = PrivateKeyDer::Pkcs8(PrivatePkcs8KeyDer::from(cert.serialize_private_key_der()));
    let mut config = rustls::ServerConfig::builder_with_provider(Arc::new(ring::default_provider()))
        .with_safe_default_protocol_versions()
        .expect("no protocol version")
        .with_no_client_auth()
        .with_single_cert(vec![der.clone()], key)
        .expect("bad server identity");
    // nothing is left unread on data connections the client only writes to
    config.send_tls13_tickets = 0;
    (Arc::new(config), der)
}

impl TestServer {
    pub fn start() -> Self {
        Self::with_config(ServerConfig::default())
    }

    pub fn with_config(config: ServerConfig) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").expect("failed to bind test server");
        let addr = listener.local_addr().expect("no local address");
        let mut state = State::default();
        state.dirs.insert(String::from("/"));
        let state = Arc::new(Mutex::new(state));
        let shared = Arc::clone(&state);
        let (tls, certificate) = match config.tls {
            true => {
                let (tls, certificate) = tls_identity();
                (Some(tls), Some(certificate))
            }
            false => (None, None),
        };
        std::thread::spawn(move || {
            for stream in listener.incoming() {
                let Ok(stream) = stream else {
                    break;
                };
                let connection =
                    Connection::new(stream, Arc::clone(&shared), config.clone(), tls.clone());
                std::thread::spawn(move || connection.serve());
            }
        });
        Self {
            addr,
            state,
            certificate,
        }
    }

    pub fn address(&self) -> String {
        self.addr.to_string()
    }

    pub fn port(&self) -> u16 {
        self.addr.port()
    }

    /// A session logged in as `test`
    pub fn session(&self) -> FtpSession {
        let mut session = FtpSession::dial(&self.address(), Some(Duration::from_secs(5)), None)
            .expect("failed to dial test server");
        session.login("test", "test").expect("failed to login");
        session
    }

    /// Trust material accepting only the certificate of this server
    pub fn trust(&self) -> TrustMaterial {
        let mut roots = rustls::RootCertStore::empty();
        roots
            .add(self.certificate.clone().expect("TLS is not enabled"))
            .expect("bad certificate");
        TrustMaterial::from_root_store(roots).expect("failed to build trust material")
    }

    /// A session dialed through `localhost`, secured with `AUTH TLS`, then logged in as `test`
    pub fn secure_session(&self) -> FtpSession {
        let address = format!("localhost:{}", self.port());
        let mut session =
            FtpSession::dial(&address, Some(Duration::from_secs(5)), Some(self.trust()))
                .expect("failed to dial test server");
        session.auth_tls().expect("failed to secure session");
        session.login("test", "test").expect("failed to login");
        session
    }

    /// Create `path` and its parents
    pub fn mkdir(&self, path: &str) {
        let mut state = self.state.lock().unwrap();
        let mut current = String::new();
        for part in resolve("/", path).split('/').filter(|p| !p.is_empty()) {
            current = format!("{current}/{part}");
            state.dirs.insert(current.clone());
        }
    }

    /// Write a file, creating its directory
    pub fn put(&self, path: &str, content: &[u8]) {
        let path = resolve("/", path);
        self.mkdir(&parent(&path));
        self.state
            .lock()
            .unwrap()
            .files
            .insert(path, content.to_vec());
    }

    pub fn file(&self, path: &str) -> Option<Vec<u8>> {
        self.state
            .lock()
            .unwrap()
            .files
            .get(&resolve("/", path))
            .cloned()
    }

    pub fn is_dir(&self, path: &str) -> bool {
        self.state
            .lock()
            .unwrap()
            .dirs
            .contains(&resolve("/", path))
    }

    /// Commands received so far, from all connections
    pub fn commands(&self) -> Vec<String> {
        self.state.lock().unwrap().commands.clone()
    }

    pub fn logins(&self) -> usize {
        self.state.lock().unwrap().logins
    }
}

/// Absolute, normalized form of `path` seen from `cwd`
fn resolve(cwd: &str, path: &str) -> String {
    let joined = if path.starts_with('/') {
        path.to_string()
    } else {
        format!("{cwd}/{path}")
    };
    let mut parts: Vec<&str> = Vec::new();
    for part in joined.split('/') {
        match part {
            "" | "." => {}
            ".." => {
                parts.pop();
            }
            part => parts.push(part),
        }
    }
    format!("/{}", parts.join("/"))
}

fn parent(path: &str) -> String {
    resolve(path, "..")
}

fn file_name(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}

/// A socket of the server, plain or secured
enum Socket {
    Plain(TcpStream),
    Tls(Box<StreamOwned<ServerConnection, TcpStream>>),
}

impl Socket {
    fn secure(stream: TcpStream, tls: Arc<rustls::ServerConfig>) -> std::io::Result<Self> {
        let connection = ServerConnection::new(tls).map_err(std::io::Error::other)?;
        Ok(Self::Tls(Box::new(StreamOwned::new(connection, stream))))
    }

    fn tcp(&self) -> &TcpStream {
        match self {
            Self::Plain(stream) => stream,
            Self::Tls(stream) => stream.get_ref(),
        }
    }

    /// End of a data transfer: a secured socket sends close_notify and waits for the client
    /// to close its side
    fn finish(self) {
        if let Self::Tls(mut stream) = self {
            // an empty transfer must still complete the handshake
            if stream.flush().is_err() {
                return;
            }
            stream.conn.send_close_notify();
            if stream.flush().is_err() {
                return;
            }
            let mut sink = [0u8; 256];
            while matches!(stream.read(&mut sink), Ok(n) if n > 0) {}
        }
    }
}

impl Read for Socket {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        match self {
            Self::Plain(stream) => stream.read(buf),
            Self::Tls(stream) => stream.read(buf),
        }
    }
}

impl Write for Socket {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        match self {
            Self::Plain(stream) => stream.write(buf),
            Self::Tls(stream) => stream.write(buf),
        }
    }

    fn flush(&mut self) -> std::io::Result<()> {
        match self {
            Self::Plain(stream) => stream.flush(),
            Self::Tls(stream) => stream.flush(),
        }
    }
}

struct Connection {
    control: BufReader<Socket>,
    state: Arc<Mutex<State>>,
    config: ServerConfig,
    tls: Option<Arc<rustls::ServerConfig>>,
    /// `PROT P` is in effect
    protected: bool,
    cwd: String,
    user: Option<String>,
    logged_in: bool,
    passive: Option<TcpListener>,
    offset: u64,
    rename_from: Option<String>,
}

impl Connection {
    fn new(
        stream: TcpStream,
        state: Arc<Mutex<State>>,
        config: ServerConfig,
        tls: Option<Arc<rustls::ServerConfig>>,
    ) -> Self {
        Self {
            control: BufReader::new(Socket::Plain(stream)),
            state,
            config,
            tls,
            protected: false,
            cwd: String::from("/"),
            user: None,
            logged_in: false,
            passive: None,
            offset: 0,
            rename_from: None,
        }
    }

    fn serve(mut self) {
        if self.reply("220 paraftp test server ready").is_err() {
            return;
        }
        let mut buffer = String::new();
        loop {
            buffer.clear();
            match self.control.read_line(&mut buffer) {
                Ok(0) | Err(_) => break,
                Ok(_) => {}
            }
            let line = buffer.trim_end();
            let (verb, arg) = match line.split_once(' ') {
                Some((verb, arg)) => (verb.to_uppercase(), arg.to_string()),
                None => (line.to_uppercase(), String::new()),
            };
            self.log(&verb, &arg);
            if self.handle(&verb, &arg).is_err() || verb == "QUIT" {
                break;
            }
        }
    }

    fn log(&self, verb: &str, arg: &str) {
        let entry = match (verb, arg.is_empty()) {
            ("PASS", _) => String::from("PASS ********"),
            (verb, true) => verb.to_string(),
            (verb, false) => format!("{verb} {arg}"),
        };
        self.state.lock().unwrap().commands.push(entry);
    }

    fn reply(&mut self, text: &str) -> std::io::Result<()> {
        let socket = self.control.get_mut();
        socket.write_all(format!("{text}\r\n").as_bytes())?;
        socket.flush()
    }

    /// Reply 234 then run TLS on the control socket; the client speaks first
    fn auth(&mut self, tls: Arc<rustls::ServerConfig>) -> std::io::Result<()> {
        self.reply("234 AUTH TLS successful")?;
        let stream = self.control.get_ref().tcp().try_clone()?;
        self.control = BufReader::new(Socket::secure(stream, tls)?);
        Ok(())
    }

    fn handle(&mut self, verb: &str, arg: &str) -> std::io::Result<()> {
        if self.config.refuse.iter().any(|refused| refused == verb) {
            return self.reply("502 Command not implemented");
        }
        match verb {
            "USER" if arg == "anonymous" => {
                self.logged_in = true;
                self.reply("230 Anonymous access granted")
            }
            "USER" => {
                self.user = Some(arg.to_string());
                self.logged_in = false;
                self.reply("331 User name okay, need password")
            }
            "PASS" => self.login(arg),
            "AUTH" => match self.tls.clone() {
                Some(tls) if arg.eq_ignore_ascii_case("TLS") => self.auth(tls),
                _ => self.reply("502 TLS is not available"),
            },
            "PBSZ" if self.tls.is_some() => self.reply("200 PBSZ=0"),
            "PROT" if self.tls.is_some() => match arg {
                "P" => {
                    self.protected = true;
                    self.reply("200 Protection level set to P")
                }
                "C" => {
                    self.protected = false;
                    self.reply("200 Protection level set to C")
                }
                _ => self.reply("504 Unsupported protection level"),
            },
            "FEAT" => self.feat(),
            "NOOP" => self.reply("200 NOOP ok"),
            "QUIT" => self.reply("221 Goodbye"),
            _ if !self.logged_in => self.reply("530 Please login with USER and PASS"),
            "TYPE" => self.reply("200 Type set"),
            "REIN" => {
                self.logged_in = false;
                self.user = None;
                self.reply("220 Service ready for new user")
            }
            "PWD" => {
                let reply = format!("257 \"{}\" is the current directory", self.cwd);
                self.reply(&reply)
            }
            "CWD" => {
                let path = resolve(&self.cwd, arg);
                self.change_dir(path)
            }
            "CDUP" => {
                let path = parent(&self.cwd);
                self.change_dir(path)
            }
            "MKD" => self.make_dir(arg),
            "RMD" => self.remove_dir(arg),
            "DELE" => {
                let path = resolve(&self.cwd, arg);
                let removed = self.state.lock().unwrap().files.remove(&path).is_some();
                match removed {
                    true => self.reply("250 File deleted"),
                    false => self.reply("550 No such file"),
                }
            }
            "RNFR" => {
                let path = resolve(&self.cwd, arg);
                if self.state.lock().unwrap().files.contains_key(&path) {
                    self.rename_from = Some(path);
                    self.reply("350 Ready for destination name")
                } else {
                    self.reply("550 No such file")
                }
            }
            "RNTO" => {
                let Some(from) = self.rename_from.take() else {
                    return self.reply("503 Bad sequence of commands");
                };
                let to = resolve(&self.cwd, arg);
                let mut state = self.state.lock().unwrap();
                if let Some(content) = state.files.remove(&from) {
                    state.files.insert(to, content);
                }
                drop(state);
                self.reply("250 File renamed")
            }
            "PASV" if self.config.pasv => {
                let port = self.listen()?;
                let reply = format!(
                    "227 Entering Passive Mode (127,0,0,1,{},{})",
                    port / 256,
                    port % 256
                );
                self.reply(&reply)
            }
            "EPSV" if self.config.epsv => {
                let port = self.listen()?;
                let reply = format!("229 Entering Extended Passive Mode (|||{port}|)");
                self.reply(&reply)
            }
            "REST" => match arg.parse::<u64>() {
                Ok(offset) => {
                    self.offset = offset;
                    let reply = format!("350 Restarting at {offset}");
                    self.reply(&reply)
                }
                Err(_) => self.reply("501 Bad offset"),
            },
            "RETR" => self.retrieve(arg),
            "STOR" => self.store(arg),
            "LIST" | "NLST" => self.list(verb == "LIST", arg),
            _ => self.reply("502 Command not implemented"),
        }
    }

    fn login(&mut self, password: &str) -> std::io::Result<()> {
        let accepted = {
            let mut state = self.state.lock().unwrap();
            let allowed = self
                .config
                .login_budget
                .map_or(true, |budget| state.logins < budget);
            let accepted = allowed && self.user.as_deref() == Some("test") && password == "test";
            if accepted {
                state.logins += 1;
            }
            accepted
        };
        if accepted {
            self.logged_in = true;
            self.reply("230 User logged in")
        } else {
            self.reply("530 Login incorrect.")
        }
    }

    fn feat(&mut self) -> std::io::Result<()> {
        match self.config.features.clone() {
            Some(features) => {
                let mut lines = vec![String::from("211-Features:")];
                lines.extend(features.iter().map(|f| format!(" {f}")));
                lines.push(String::from("211 End"));
                self.reply(&lines.join("\r\n"))
            }
            None => self.reply("500 FEAT not understood"),
        }
    }

    fn change_dir(&mut self, path: String) -> std::io::Result<()> {
        if self.state.lock().unwrap().dirs.contains(&path) {
            self.cwd = path;
            self.reply("250 Directory changed")
        } else {
            self.reply("550 No such directory")
        }
    }

    fn make_dir(&mut self, arg: &str) -> std::io::Result<()> {
        let path = resolve(&self.cwd, arg);
        let created = {
            let mut state = self.state.lock().unwrap();
            let free = !state.dirs.contains(&path) && !state.files.contains_key(&path);
            free && state.dirs.contains(&parent(&path)) && state.dirs.insert(path.clone())
        };
        if created {
            let reply = format!("257 \"{path}\" created");
            self.reply(&reply)
        } else {
            self.reply("550 Cannot create directory")
        }
    }

    fn remove_dir(&mut self, arg: &str) -> std::io::Result<()> {
        let path = resolve(&self.cwd, arg);
        let removed = {
            let mut state = self.state.lock().unwrap();
            let prefix = format!("{path}/");
            let empty = !state.files.keys().any(|f| f.starts_with(&prefix))
                && !state.dirs.iter().any(|d| d.starts_with(&prefix));
            path != "/" && empty && state.dirs.remove(&path)
        };
        if removed {
            self.reply("250 Directory removed")
        } else {
            self.reply("550 Cannot remove directory")
        }
    }

    /// Open a passive listener, replacing the previous one
    fn listen(&mut self) -> std::io::Result<u16> {
        let listener = TcpListener::bind("127.0.0.1:0")?;
        let port = listener.local_addr()?.port();
        self.passive = Some(listener);
        Ok(port)
    }

    /// Reply 150 and accept the data connection, secured when `PROT P` is in effect
    fn accept(&mut self) -> std::io::Result<Option<Socket>> {
        let Some(listener) = self.passive.take() else {
            self.reply("425 Use PASV or EPSV first")?;
            return Ok(None);
        };
        self.reply("150 Opening data connection")?;
        let (stream, _) = listener.accept()?;
        match (self.protected, self.tls.clone()) {
            (true, Some(tls)) => Socket::secure(stream, tls).map(Some),
            _ => Ok(Some(Socket::Plain(stream))),
        }
    }

    fn retrieve(&mut self, arg: &str) -> std::io::Result<()> {
        let path = resolve(&self.cwd, arg);
        let offset = std::mem::take(&mut self.offset) as usize;
        let content = self.state.lock().unwrap().files.get(&path).cloned();
        let Some(content) = content else {
            self.passive = None;
            return self.reply("550 No such file");
        };
        let Some(mut stream) = self.accept()? else {
            return Ok(());
        };
        let _ = stream.write_all(&content[offset.min(content.len())..]);
        stream.finish();
        self.reply("226 Transfer complete")
    }

    fn store(&mut self, arg: &str) -> std::io::Result<()> {
        let path = resolve(&self.cwd, arg);
        let offset = std::mem::take(&mut self.offset) as usize;
        let Some(mut stream) = self.accept()? else {
            return Ok(());
        };
        let mut data = Vec::new();
        let _ = stream.read_to_end(&mut data);
        stream.finish();
        {
            let mut state = self.state.lock().unwrap();
            let mut content = match offset {
                0 => Vec::new(),
                offset => {
                    let mut existing = state.files.get(&path).cloned().unwrap_or_default();
                    existing.truncate(offset);
                    existing
                }
            };
            content.extend(data);
            state.files.insert(path, content);
        }
        self.reply("226 Transfer complete")
    }

    fn list(&mut self, detailed: bool, arg: &str) -> std::io::Result<()> {
        let dir = match arg {
            "" => self.cwd.clone(),
            arg if arg.starts_with('-') => self.cwd.clone(),
            arg => resolve(&self.cwd, arg),
        };
        let lines = {
            let state = self.state.lock().unwrap();
            if !state.dirs.contains(&dir) {
                None
            } else {
                let dirs = state
                    .dirs
                    .iter()
                    .filter(|d| d.as_str() != "/" && parent(d) == dir);
                let files = state.files.iter().filter(|(f, _)| parent(f) == dir);
                let mut lines = Vec::new();
                if detailed {
                    lines.push(String::from("total 0"));
                }
                for d in dirs {
                    lines.push(match detailed {
                        true => format!(
                            "drwxr-xr-x 2 test test 4096 Jan 01 12:00 {}",
                            file_name(d)
                        ),
                        false => file_name(d).to_string(),
                    });
                }
                for (f, content) in files {
                    lines.push(match detailed {
                        true => format!(
                            "-rw-r--r-- 1 test test {} Jan 01 12:00 {}",
                            content.len(),
                            file_name(f)
                        ),
                        false => file_name(f).to_string(),
                    });
                }
                Some(lines)
            }
        };
        let Some(lines) = lines else {
            self.passive = None;
            return self.reply("550 No such directory");
        };
        let Some(mut stream) = self.accept()? else {
            return Ok(());
        };
        for line in lines {
            let _ = stream.write_all(format!("{line}\r\n").as_bytes());
        }
        stream.finish();
        self.reply("226 Transfer complete")
    }
}
