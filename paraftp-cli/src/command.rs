use std::path::PathBuf;
use std::str::FromStr;

use paraftp::TransferTask;

#[derive(Debug, PartialEq, Eq)]
pub enum Command {
    AuthTls,
    Cdup,
    Cld(PathBuf),
    Cwd(String),
    Dele(String),
    Feat,
    Help,
    List(Option<String>),
    Login(Option<String>, Option<String>),
    Logout,
    Mkd(String),
    /// Parallel connections (`None` for one per task) and the tasks
    Mtran(Option<usize>, Vec<TransferTask>),
    Nlst(Option<String>),
    Noop,
    Pwd,
    Quit,
    Rename(String, String),
    Retr(PathBuf, String),
    Rmd(String),
    Stor(PathBuf, String),
}

impl FromStr for Command {
    type Err = &'static str;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut args = s.split_ascii_whitespace();
        let Some(cmd) = args.next() else {
            return Err("Unknown command");
        };
        let params: Vec<&str> = args.collect();
        match (cmd.to_ascii_uppercase().as_str(), params.as_slice()) {
            ("AUTH", [method]) if method.eq_ignore_ascii_case("TLS") => Ok(Self::AuthTls),
            ("AUTH", [_]) => Err("Just TLS authentication is supported"),
            ("AUTH", _) => Err("Usage: AUTH TLS"),
            ("CDUP", []) => Ok(Self::Cdup),
            ("CLD", [dir]) => Ok(Self::Cld(PathBuf::from(dir))),
            ("CLD", _) => Err("Missing `dir` field"),
            ("CWD", [dir]) => Ok(Self::Cwd(dir.to_string())),
            ("CWD", _) => Err("Missing `dir` field"),
            ("DELE", [file]) => Ok(Self::Dele(file.to_string())),
            ("DELE", _) => Err("Missing `file` field"),
            ("FEAT", []) => Ok(Self::Feat),
            ("HELP", []) => Ok(Self::Help),
            ("LIST", []) => Ok(Self::List(None)),
            ("LIST", [dir]) => Ok(Self::List(Some(dir.to_string()))),
            ("LOGIN", []) => Ok(Self::Login(None, None)),
            ("LOGIN", [user]) => Ok(Self::Login(Some(user.to_string()), None)),
            ("LOGIN", [user, password]) => Ok(Self::Login(
                Some(user.to_string()),
                Some(password.to_string()),
            )),
            ("LOGOUT", []) => Ok(Self::Logout),
            ("MKD", [dir]) => Ok(Self::Mkd(dir.to_string())),
            ("MKD", _) => Err("Missing `dir` field"),
            ("MTRAN", [parallel, transfers @ ..])
                if !transfers.is_empty() && transfers.len() % 3 == 0 =>
            {
                parse_mtran(parallel, transfers)
            }
            ("MTRAN", _) => Err("Usage: MTRAN <parallel> (<|>) <local> <remote> ..."),
            ("NLST", []) => Ok(Self::Nlst(None)),
            ("NLST", [dir]) => Ok(Self::Nlst(Some(dir.to_string()))),
            ("NOOP", []) => Ok(Self::Noop),
            ("PWD", []) => Ok(Self::Pwd),
            ("QUIT", []) => Ok(Self::Quit),
            ("RENAME", [src, dest]) => Ok(Self::Rename(src.to_string(), dest.to_string())),
            ("RENAME", _) => Err("Missing `source` or `dest` field"),
            ("RETR", [local, remote]) => Ok(Self::Retr(PathBuf::from(local), remote.to_string())),
            ("RETR", _) => Err("Missing `local` or `remote` field"),
            ("RMD", [dir]) => Ok(Self::Rmd(dir.to_string())),
            ("RMD", _) => Err("Missing `dir` field"),
            ("STOR", [local, remote]) => Ok(Self::Stor(PathBuf::from(local), remote.to_string())),
            ("STOR", _) => Err("Missing `local` or `remote` field"),
            (
                "CDUP" | "FEAT" | "HELP" | "LIST" | "LOGIN" | "LOGOUT" | "NLST" | "NOOP" | "PWD"
                | "QUIT",
                _,
            ) => Err("Too many arguments"),
            _ => Err("Unknown command"),
        }
    }
}

/// `<` retrieves from the server, `>` stores on the server; a negative count is one
/// connection per task
fn parse_mtran(parallel: &str, transfers: &[&str]) -> Result<Command, &'static str> {
    let parallel = match parallel.parse::<i64>() {
        Ok(n) if n < 0 => None,
        Ok(n) => Some(n as usize),
        Err(_) => return Err("Invalid amount of parallel connections"),
    };
    let tasks = transfers
        .chunks(3)
        .map(|triple| match triple {
            ["<", local, remote] => Ok(TransferTask::retrieve(local, remote)),
            [">", local, remote] => Ok(TransferTask::store(local, remote)),
            _ => Err("Invalid transfer direction: `<` or `>` expected"),
        })
        .collect::<Result<Vec<TransferTask>, _>>()?;
    Ok(Command::Mtran(parallel, tasks))
}
