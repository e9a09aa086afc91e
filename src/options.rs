/*
 *  options.rs: Command line processing routines for dwipe.
 *
 *  Copyright Darik Horn <dajhorn-dban@vanadac.com>.
 *  Modifications to original dwipe Copyright Andy Beverley <andy@andybev.com>
 *
 *  This program is free software; you can redistribute it and/or modify it under
 *  the terms of the GNU General Public License as published by the Free Software
 *  Foundation, version 2.
 */

use std::path::PathBuf;

use clap::Parser;

use crate::method::{VerifyLevel, WipeMethod};
use crate::prng::PrngKind;

/* Program knobs. */

/// The kernel entropy source.
pub const KNOB_ENTROPY: &str = "/dev/urandom";

/// The partition table exposed by the kernel.
pub const KNOB_PARTITIONS: &str = "/proc/partitions";

/// The number of entropy bytes used to seed a PRNG (128 words).
pub const KNOB_PRNG_STATE_LENGTH: usize = 512;

/// The supervisor tick in seconds.
pub const KNOB_SLEEP: u64 = 1;

/// The default log file.
pub const KNOB_LOGFILE: &str = "/var/log/dban/dwipe.txt";

/// Recognized configuration, after command line processing.
#[derive(Debug, Clone)]
pub struct WipeOptions {
    /// Do not prompt the user for device selection.
    pub autonuke: bool,
    /// Run without the terminal interface.
    pub nogui: bool,
    /// Don't wait for a key before exiting.
    pub nowait: bool,
    /// The wipe method that will be used.
    pub method: WipeMethod,
    /// The pseudo random number generator implementation.
    pub prng: PrngKind,
    /// The number of times that the wipe method should be run.
    pub rounds: i32,
    /// Open devices for synchronous writes.
    pub sync: bool,
    /// The read-back policy.
    pub verify: VerifyLevel,
    /// The log file.
    pub logfile: Option<PathBuf>,
    /// Whether to enable the web status endpoint.
    pub web_enabled: bool,
    /// The web server port.
    pub web_port: u16,
    /// The address where the web server listens.
    pub web_listen: String,
    /// The HTTP Basic Auth user, empty to disable authentication.
    pub web_auth_user: String,
    /// The HTTP Basic Auth password.
    pub web_auth_pass: String,
    /// The url to call when wiping actually starts.
    pub notify_start_url: Option<String>,
    /// The url to call after successful completion.
    pub notify_success_url: Option<String>,
    /// The url to call in case of failure.
    pub notify_fail_url: Option<String>,
    /// Device names given on the command line; empty means scan.
    pub device_names: Vec<String>,
}

/// Command line arguments for dwipe.
#[derive(Parser, Debug)]
#[command(
    name = "dwipe",
    version = crate::version::VERSION,
    about = "Securely erase block storage devices"
)]
struct Args {
    /// Wipe all enumerated devices without a confirmation prompt
    #[arg(long)]
    autonuke: bool,

    /// The wipe method
    #[arg(short = 'm', long, default_value = "dodshort", value_parser = parse_method)]
    method: WipeMethod,

    /// The pseudo random number generator
    #[arg(short = 'p', long, default_value = "twister", value_parser = parse_prng)]
    prng: PrngKind,

    /// The number of times to run the method
    #[arg(short = 'r', long, default_value_t = 1, value_parser = parse_rounds)]
    rounds: i32,

    /// Open devices in sync mode
    #[arg(long)]
    sync: bool,

    /// Verify that patterns were written: 0|off, 1|last, 2|all
    #[arg(long, default_value = "last", value_parser = parse_verify)]
    verify: VerifyLevel,

    /// The path where to write the log
    #[arg(long, value_name = "FILE")]
    log: Option<PathBuf>,

    /// Run without the terminal interface (requires --autonuke)
    #[arg(long)]
    nogui: bool,

    /// Don't wait for a key before exiting
    #[arg(long)]
    nowait: bool,

    /// Enable the read-only web status endpoint
    #[arg(long)]
    web: bool,

    /// The port where the web server listens
    #[arg(long, default_value_t = 9595, value_name = "PORT")]
    web_port: u16,

    /// The address where the web server listens
    #[arg(long, default_value = "0.0.0.0", value_name = "ADDR")]
    web_listen: String,

    /// The HTTP Basic Auth user
    #[arg(long, default_value = "", value_name = "USER")]
    web_user: String,

    /// The HTTP Basic Auth password
    #[arg(long, default_value = "", value_name = "PASS")]
    web_pass: String,

    /// The url to call when wiping starts
    #[arg(long, value_name = "URL")]
    notify_start: Option<String>,

    /// The url to call after successful completion
    #[arg(long, value_name = "URL")]
    notify_success: Option<String>,

    /// The url to call in case of failure
    #[arg(long, value_name = "URL")]
    notify_fail: Option<String>,

    /// Devices to wipe; omit to scan for devices
    #[arg(value_name = "DEVICE")]
    device_names: Vec<String>,
}

fn parse_method(name: &str) -> Result<WipeMethod, String> {
    WipeMethod::from_name(name).ok_or_else(|| format!("Unknown wipe method '{}'.", name))
}

fn parse_prng(name: &str) -> Result<PrngKind, String> {
    PrngKind::from_name(name).ok_or_else(|| format!("Unknown prng '{}'.", name))
}

fn parse_verify(name: &str) -> Result<VerifyLevel, String> {
    VerifyLevel::from_name(name).ok_or_else(|| format!("Unknown verification level '{}'.", name))
}

fn parse_rounds(value: &str) -> Result<i32, String> {
    match value.trim().parse::<i32>() {
        Ok(n) if n >= 1 => Ok(n),
        _ => Err("The rounds argument must be a positive integer.".to_string()),
    }
}

/// Parse command line options.
pub fn parse_options() -> WipeOptions {
    let options = from_args(Args::parse());

    if options.web_auth_user.is_empty() != options.web_auth_pass.is_empty() {
        eprintln!("Error: you must specify both user and password for HTTP Basic Auth.");
        std::process::exit(1);
    }

    options
}

fn from_args(args: Args) -> WipeOptions {
    WipeOptions {
        autonuke: args.autonuke,
        nogui: args.nogui,
        nowait: args.nowait,
        method: args.method,
        prng: args.prng,
        rounds: args.rounds,
        sync: args.sync,
        verify: args.verify,
        logfile: Some(args.log.unwrap_or_else(|| PathBuf::from(KNOB_LOGFILE))),
        web_enabled: args.web,
        web_port: args.web_port,
        web_listen: args.web_listen,
        web_auth_user: args.web_user,
        web_auth_pass: args.web_pass,
        notify_start_url: args.notify_start,
        notify_success_url: args.notify_success,
        notify_fail_url: args.notify_fail,
        device_names: args.device_names,
    }
}

impl Default for WipeOptions {
    fn default() -> Self {
        Self {
            autonuke: false,
            nogui: false,
            nowait: false,
            method: WipeMethod::DodShort,
            prng: PrngKind::MersenneTwister,
            rounds: 1,
            sync: false,
            verify: VerifyLevel::Last,
            logfile: None,
            web_enabled: false,
            web_port: 9595,
            web_listen: "0.0.0.0".to_string(),
            web_auth_user: String::new(),
            web_auth_pass: String::new(),
            notify_start_url: None,
            notify_success_url: None,
            notify_fail_url: None,
            device_names: Vec::new(),
        }
    }
}

/// Log the working options, as the original does after parsing.
pub fn log_options(options: &WipeOptions) {
    use crate::logging::{wipe_log, LogLevel};

    wipe_log(
        LogLevel::Info,
        &format!("Method is '{}'.", options.method.label()),
    );
    wipe_log(
        LogLevel::Info,
        &format!("PRNG is '{}'.", options.prng.label()),
    );
    wipe_log(LogLevel::Info, &format!("Rounds is {}.", options.rounds));
    wipe_log(
        LogLevel::Info,
        &format!("Verify is '{}'.", options.verify.label()),
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_the_original() {
        let args = Args::try_parse_from(["dwipe"]).unwrap();
        let options = from_args(args);
        assert_eq!(options.method, WipeMethod::DodShort);
        assert_eq!(options.prng, PrngKind::MersenneTwister);
        assert_eq!(options.rounds, 1);
        assert_eq!(options.verify, VerifyLevel::Last);
        assert!(!options.autonuke);
        assert!(!options.sync);
        assert_eq!(options.web_port, 9595);
        assert_eq!(options.logfile, Some(PathBuf::from(KNOB_LOGFILE)));
    }

    #[test]
    fn method_and_prng_aliases_parse() {
        let args =
            Args::try_parse_from(["dwipe", "-m", "quick", "-p", "isaac", "--verify", "2"]).unwrap();
        let options = from_args(args);
        assert_eq!(options.method, WipeMethod::Zero);
        assert_eq!(options.prng, PrngKind::Isaac);
        assert_eq!(options.verify, VerifyLevel::All);
    }

    #[test]
    fn rounds_must_be_positive() {
        assert!(Args::try_parse_from(["dwipe", "-r", "0"]).is_err());
        assert!(Args::try_parse_from(["dwipe", "-r", "-3"]).is_err());
        assert!(Args::try_parse_from(["dwipe", "-r", "four"]).is_err());
        let args = Args::try_parse_from(["dwipe", "-r", "4"]).unwrap();
        assert_eq!(from_args(args).rounds, 4);
    }

    #[test]
    fn unknown_method_is_rejected() {
        assert!(Args::try_parse_from(["dwipe", "-m", "shred"]).is_err());
    }

    #[test]
    fn positional_arguments_are_device_names() {
        let args = Args::try_parse_from(["dwipe", "/dev/sdx", "/dev/sdy"]).unwrap();
        let options = from_args(args);
        assert_eq!(options.device_names, vec!["/dev/sdx", "/dev/sdy"]);
    }
}
