use std::path::PathBuf;

use argh::FromArgs;

#[derive(FromArgs)]
#[argh(description = "Interactive FTP/FTPS shell with parallel multi-file transfers")]
pub struct Args {
    #[argh(
        option,
        default = "String::from(\"localhost\")",
        description = "host to connect to"
    )]
    pub host: String,
    #[argh(option, default = "2121", description = "control port")]
    pub port: u16,
    #[argh(
        option,
        description = "PEM file with the certificates trusted for AUTH TLS"
    )]
    pub cert: Option<PathBuf>,
    #[argh(switch, description = "accept any server certificate on AUTH TLS")]
    pub insecure: bool,
    #[argh(switch, short = 'D', description = "enable TRACE log level")]
    pub debug: bool,
    #[argh(switch, short = 'v', description = "verbose mode")]
    pub verbose: bool,
    #[argh(switch, short = 'V', description = "print version")]
    pub version: bool,
}
