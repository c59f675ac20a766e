use std::fs::File;
use std::io::{self, Write};
use std::path::Path;

use paraftp::{FtpError, FtpSession, TransferTask};

pub fn quit(mut ftp: FtpSession) {
    match ftp.quit() {
        Ok(_) => println!("OK"),
        Err(err) => eprintln!("Failed to disconnect from remote: {err}"),
    }
}

pub fn auth_tls(ftp: &mut FtpSession) {
    match ftp.auth_tls() {
        Ok(_) => println!("OK"),
        Err(err) => eprintln!("AUTH error: {err}"),
    }
}

pub fn cdup(ftp: &mut FtpSession) {
    match ftp.cdup() {
        Ok(_) => println!("OK"),
        Err(err) => eprintln!("CDUP error: {err}"),
    }
}

pub fn cld(dir: &Path) {
    match std::env::set_current_dir(dir) {
        Ok(_) => println!("OK"),
        Err(err) => eprintln!("CLD error: {err}"),
    }
}

pub fn cwd(ftp: &mut FtpSession, dir: &str) {
    match ftp.cwd(dir) {
        Ok(_) => println!("OK"),
        Err(err) => eprintln!("CWD error: {err}"),
    }
}

pub fn dele(ftp: &mut FtpSession, file: &str) {
    match ftp.rm(file) {
        Ok(_) => println!("OK"),
        Err(err) => eprintln!("DELE error: {err}"),
    }
}

pub fn feat(ftp: &FtpSession) {
    let mut features: Vec<_> = ftp.features().iter().collect();
    features.sort();
    for (name, description) in features {
        match description {
            Some(description) => println!("  {name} {description}"),
            None => println!("  {name}"),
        }
    }
}

pub fn list(ftp: &mut FtpSession, dir: Option<&str>) {
    match ftp.list(dir) {
        Ok(entries) => entries.iter().for_each(|entry| println!("  {entry}")),
        Err(err) => eprintln!("LIST error: {err}"),
    }
}

pub fn login(ftp: &mut FtpSession, username: Option<String>, password: Option<String>) {
    let username = match username {
        Some(username) => username,
        None => match prompt("Username: ") {
            Ok(username) => username,
            Err(err) => {
                eprintln!("Could not read username: {err}");
                return;
            }
        },
    };
    let password = match password {
        Some(password) => password,
        None => match rpassword::prompt_password("Password: ") {
            Ok(password) => password,
            Err(err) => {
                eprintln!("Could not read password: {err}");
                return;
            }
        },
    };
    match ftp.login(&username, &password) {
        Ok(_) => println!("OK"),
        Err(err) => eprintln!("LOGIN error: {err}"),
    }
}

pub fn logout(ftp: &mut FtpSession) {
    match ftp.logout() {
        Ok(_) => println!("OK"),
        Err(err) => eprintln!("LOGOUT error: {err}"),
    }
}

pub fn mkd(ftp: &mut FtpSession, dir: &str) {
    match ftp.mkdir(dir) {
        Ok(_) => println!("OK"),
        Err(err) => eprintln!("MKD error: {err}"),
    }
}

pub fn mtran(ftp: &mut FtpSession, parallel: Option<usize>, tasks: Vec<TransferTask>) {
    match ftp.multiple_transfer(tasks, parallel) {
        Ok(_) => println!("OK"),
        Err(err) => eprintln!("MTRAN error: {err}"),
    }
}

pub fn nlst(ftp: &mut FtpSession, dir: Option<&str>) {
    match ftp.nlst(dir) {
        Ok(names) => names.iter().for_each(|name| println!("  {name}")),
        Err(err) => eprintln!("NLST error: {err}"),
    }
}

pub fn noop(ftp: &mut FtpSession) {
    match ftp.noop() {
        Ok(_) => println!("OK"),
        Err(err) => eprintln!("NOOP error: {err}"),
    }
}

pub fn pwd(ftp: &mut FtpSession) {
    match ftp.pwd() {
        Ok(p) => println!("OK: {p}"),
        Err(err) => eprintln!("PWD error: {err}"),
    }
}

pub fn rename(ftp: &mut FtpSession, src: &str, dest: &str) {
    match ftp.rename(src, dest) {
        Ok(_) => println!("OK"),
        Err(err) => eprintln!("RENAME error: {err}"),
    }
}

pub fn retr(ftp: &mut FtpSession, local: &Path, remote: &str) {
    if local.exists() {
        eprintln!("RETR error: {} already exists", local.display());
        return;
    }
    let mut dest = match File::create(local) {
        Ok(d) => d,
        Err(err) => {
            eprintln!("Failed to open destination file: {err}");
            return;
        }
    };
    match ftp.retr(remote, move |reader| {
        io::copy(reader, &mut dest)
            .map(|_| ())
            .map_err(FtpError::LocalIo)
    }) {
        Ok(_) => println!("OK"),
        Err(err) => eprintln!("RETR error: {err}"),
    }
}

pub fn rmd(ftp: &mut FtpSession, dir: &str) {
    match ftp.rmdir(dir) {
        Ok(_) => println!("OK"),
        Err(err) => eprintln!("RMD error: {err}"),
    }
}

pub fn stor(ftp: &mut FtpSession, local: &Path, remote: &str) {
    let mut reader = match File::open(local) {
        Ok(r) => r,
        Err(err) => {
            eprintln!("Failed to open local file for read: {err}");
            return;
        }
    };
    match ftp.put_file(remote, &mut reader) {
        Ok(bytes) => println!("OK: {bytes} bytes"),
        Err(err) => eprintln!("STOR error: {err}"),
    }
}

fn prompt(text: &str) -> io::Result<String> {
    print!("{text}");
    io::stdout().flush()?;
    let mut line = String::new();
    io::stdin().read_line(&mut line)?;
    Ok(line.trim().to_string())
}
