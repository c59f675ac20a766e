//! Pure-FTPd running in docker, for end to end tests against a real server

use std::borrow::Cow;
use std::collections::HashMap;

use testcontainers::core::{CmdWaitFor, ExecCommand, WaitFor};
use testcontainers::runners::SyncRunner;
use testcontainers::{Container, Image};

/// Passive ports exposed by the image
const PASSIVE_PORTS: std::ops::RangeInclusive<u16> = 30000..=30009;

#[derive(Debug, Default, Clone)]
struct PureFtpImage {
    _priv: (),
}

impl Image for PureFtpImage {
    fn name(&self) -> &str {
        "stilliard/pure-ftpd"
    }

    fn tag(&self) -> &str {
        "latest"
    }

    fn ready_conditions(&self) -> Vec<WaitFor> {
        vec![WaitFor::message_on_stdout("Starting Pure-FTPd")]
    }

    fn env_vars(
        &self,
    ) -> impl IntoIterator<Item = (impl Into<Cow<'_, str>>, impl Into<Cow<'_, str>>)> {
        vec![
            ("PUBLICHOST", "localhost"),
            ("FTP_USER_NAME", "test"),
            ("FTP_USER_PASS", "test"),
            ("FTP_USER_HOME", "/home/test"),
        ]
    }
}

pub struct PureFtpRunner {
    container: Container<PureFtpImage>,
}

impl PureFtpRunner {
    pub fn start() -> Self {
        let container = PureFtpImage::default()
            .start()
            .expect("Failed to start container");
        let resp = container
            .exec(
                ExecCommand::new(["/bin/mkdir", "-p", "/home/test/parallel"])
                    .with_cmd_ready_condition(CmdWaitFor::Exit { code: Some(0) }),
            )
            .expect("Failed to create directory");
        assert_eq!(
            resp.exit_code()
                .expect("failed to get exit code for mkdir")
                .expect("no exit code for mkdir"),
            0
        );
        let resp = container
            .exec(
                ExecCommand::new(["/bin/chown", "-R", "ftpuser:ftpgroup", "/home/test"])
                    .with_cmd_ready_condition(CmdWaitFor::Exit { code: Some(0) }),
            )
            .expect("Failed to chown home");
        assert_eq!(
            resp.exit_code()
                .expect("failed to get exit code for chown")
                .expect("no exit code for chown"),
            0
        );
        Self { container }
    }

    pub fn get_ftp_port(&self) -> u16 {
        self.container.get_host_port_ipv4(21).unwrap()
    }

    /// Host ports of the passive ports announced by the server
    pub fn passive_port_map(&self) -> HashMap<u16, u16> {
        PASSIVE_PORTS
            .map(|port| (port, self.container.get_host_port_ipv4(port).unwrap()))
            .collect()
    }
}

#[cfg(test)]
mod test {

    use std::fs;
    use std::net::TcpStream;

    use pretty_assertions::assert_eq;
    use rand::distr::Alphanumeric;
    use rand::{rng, Rng};

    use super::*;
    use crate::{FtpError, FtpSession, TransferTask};

    #[test]
    #[ignore = "requires docker"]
    fn should_transfer_in_parallel_with_pure_ftpd() {
        crate::log_init();
        let runner = PureFtpRunner::start();
        let ports = runner.passive_port_map();
        let mut session = FtpSession::connect(&format!("127.0.0.1:{}", runner.get_ftp_port()))
            .unwrap()
            .passive_stream_builder(move |mut addr| {
                if let Some(port) = ports.get(&addr.port()) {
                    addr.set_port(*port);
                }
                TcpStream::connect(addr).map_err(FtpError::ConnectionError)
            });
        session.login("test", "test").unwrap();
        session.cwd("parallel").unwrap();

        let upload = tempfile::tempdir().unwrap();
        let download = tempfile::tempdir().unwrap();
        let mut names = Vec::new();
        let mut stores = Vec::new();
        let mut retrieves = Vec::new();
        for i in 0..6 {
            let name = format!("file-{i}.txt");
            let content: String = rng()
                .sample_iter(&Alphanumeric)
                .take(1024 + i)
                .map(char::from)
                .collect();
            fs::write(upload.path().join(&name), content).unwrap();
            stores.push(TransferTask::store(upload.path().join(&name), &name));
            retrieves.push(TransferTask::retrieve(download.path().join(&name), &name));
            names.push(name);
        }
        assert!(session.multiple_transfer(stores, Some(3)).is_ok());
        let mut listed = session.nlst(None).unwrap();
        listed.sort();
        assert_eq!(listed, names);

        assert!(session.multiple_transfer(retrieves, Some(3)).is_ok());
        for name in names.iter() {
            assert_eq!(
                fs::read(download.path().join(name)).unwrap(),
                fs::read(upload.path().join(name)).unwrap()
            );
            assert!(session.rm(name).is_ok());
        }
        assert!(session.quit().is_ok());
    }
}
