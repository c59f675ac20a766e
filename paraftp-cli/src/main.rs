//! # paraftp shell
//!
//! An interactive FTP/FTPS shell on top of the paraftp library, with `MTRAN` for parallel
//! multi-file transfers.
//!

// -- mods
mod actions;
mod args;
mod command;

use std::io;
use std::io::Write;
use std::process::exit;
use std::str::FromStr;
use std::time::Duration;

use actions::*;
use args::Args;
use command::Command;
use env_logger::Builder as LogBuilder;
use log::LevelFilter;
use paraftp::{FtpResult, FtpSession, TrustMaterial};

const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

fn usage() {
    println!("Available commands:");
    println!("AUTH TLS                            Secure the connection with TLS");
    println!("CDUP                                Go to parent directory");
    println!("CLD <dir>                           Change local working directory");
    println!("CWD <dir>                           Change working directory");
    println!("DELE <file>                         Remove file");
    println!("FEAT                                Print the features supported by the server");
    println!("HELP                                Print this help");
    println!("LIST [dir]                          List files. If directory is not provided, current directory is used");
    println!("LOGIN [user] [password]             Login to remote; missing fields are prompted");
    println!("LOGOUT                              Logout from remote");
    println!("MKD <dir>                           Create directory");
    println!("MTRAN <n> (<|>) <local> <remote>... Transfer files over `n` connections (negative for one per file)");
    println!("                                    `<` retrieves from the server, `>` stores on the server");
    println!("NLST [dir]                          List file names");
    println!("NOOP                                Ping server");
    println!("PWD                                 Print working directory");
    println!("QUIT                                Quit paraftp");
    println!("RENAME <source> <dest>              Rename file `source` to `dest`");
    println!("RETR <local> <remote>               Download `remote` to `local`");
    println!("RMD <dir>                           Remove directory");
    println!("STOR <local> <remote>               Upload `local` to `remote`");
}

/// Next command from stdin; end of input quits
fn input() -> Command {
    loop {
        print!("> ");
        let _ = io::stdout().flush();
        let mut input: String = String::new();
        match io::stdin().read_line(&mut input) {
            Ok(0) | Err(_) => return Command::Quit,
            Ok(_) => {}
        }
        match Command::from_str(input.as_str()) {
            Ok(cmd) => return cmd,
            Err(err) => println!("{err}"),
        }
    }
}

fn trust_material(args: &Args) -> FtpResult<Option<TrustMaterial>> {
    if args.insecure {
        return TrustMaterial::insecure().map(Some);
    }
    args.cert
        .as_ref()
        .map(TrustMaterial::from_pem_file)
        .transpose()
}

fn main() {
    let args: Args = argh::from_env();
    // print version
    if args.version {
        println!("paraftp {APP_VERSION}");
        return;
    }
    // init logger
    LogBuilder::new()
        .filter_level(if args.debug {
            LevelFilter::Trace
        } else if args.verbose {
            LevelFilter::Info
        } else {
            LevelFilter::Off
        })
        .init();
    let trust = match trust_material(&args) {
        Ok(trust) => trust,
        Err(err) => {
            eprintln!("Failed to load trust material: {err}");
            exit(1);
        }
    };
    let address = format!("{}:{}", args.host, args.port);
    let mut ftp = match FtpSession::dial(&address, Some(Duration::from_secs(30)), trust) {
        Ok(ftp) => ftp,
        Err(err) => {
            eprintln!("Failed to connect to {address}: {err}");
            exit(1);
        }
    };
    if let Some(welcome) = ftp.welcome_msg() {
        println!("{welcome}");
    }
    // Main loop
    loop {
        match input() {
            Command::Quit => {
                quit(ftp);
                break;
            }
            Command::Help => usage(),
            cmd => perform(&mut ftp, cmd),
        }
    }
}

fn perform(ftp: &mut FtpSession, command: Command) {
    match command {
        Command::AuthTls => auth_tls(ftp),
        Command::Cdup => cdup(ftp),
        Command::Cld(dir) => cld(dir.as_path()),
        Command::Cwd(dir) => cwd(ftp, dir.as_str()),
        Command::Dele(file) => dele(ftp, file.as_str()),
        Command::Feat => feat(ftp),
        Command::List(p) => list(ftp, p.as_deref()),
        Command::Login(user, password) => login(ftp, user, password),
        Command::Logout => logout(ftp),
        Command::Mkd(dir) => mkd(ftp, dir.as_str()),
        Command::Mtran(parallel, tasks) => mtran(ftp, parallel, tasks),
        Command::Nlst(p) => nlst(ftp, p.as_deref()),
        Command::Noop => noop(ftp),
        Command::Pwd => pwd(ftp),
        Command::Rename(src, dest) => rename(ftp, src.as_str(), dest.as_str()),
        Command::Retr(local, remote) => retr(ftp, local.as_path(), remote.as_str()),
        Command::Rmd(dir) => rmd(ftp, dir.as_str()),
        Command::Stor(local, remote) => stor(ftp, local.as_path(), remote.as_str()),
        Command::Help | Command::Quit => {
            unreachable!("handled by the main loop")
        }
    }
}
