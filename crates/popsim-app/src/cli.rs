//! Command-line parsing.
//!
//! Usage:
//!   popsim run <config.json> [--ticks N] [--frame-every N] [--columns N]
//!   popsim init <config.json>

use std::path::PathBuf;

use crate::error::AppError;

/// Default width of printed frames, in characters.
pub const DEFAULT_COLUMNS: usize = 64;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunOptions {
    /// Stop after this many ticks. `None` runs until a tick fails.
    pub ticks: Option<u64>,
    /// Print every Nth frame; 0 prints none.
    pub frame_every: u64,
    pub columns: usize,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            ticks: None,
            frame_every: 0,
            columns: DEFAULT_COLUMNS,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Run { config: PathBuf, options: RunOptions },
    Init { config: PathBuf },
    Help,
}

/// Parse `args` without the program name.
pub fn parse_args(args: &[String]) -> Result<Command, AppError> {
    let Some(command) = args.first() else {
        return Ok(Command::Help);
    };
    match command.as_str() {
        "run" => {
            let config = config_path(&args[1..])?;
            let mut options = RunOptions::default();
            let mut rest = args[2..].iter();
            while let Some(flag) = rest.next() {
                let mut value = || {
                    rest.next()
                        .ok_or_else(|| AppError::Usage(format!("{flag} needs a value")))
                };
                match flag.as_str() {
                    "--ticks" => options.ticks = Some(parse_number(flag, value()?)?),
                    "--frame-every" => options.frame_every = parse_number(flag, value()?)?,
                    "--columns" => {
                        options.columns = parse_number(flag, value()?)?;
                        if options.columns == 0 {
                            return Err(AppError::Usage("--columns must be positive".into()));
                        }
                    }
                    other => return Err(AppError::Usage(format!("unknown option: {other}"))),
                }
            }
            Ok(Command::Run { config, options })
        }
        "init" => {
            let config = config_path(&args[1..])?;
            if let Some(extra) = args.get(2) {
                return Err(AppError::Usage(format!("unexpected argument: {extra}")));
            }
            Ok(Command::Init { config })
        }
        "help" | "--help" | "-h" => Ok(Command::Help),
        other => Err(AppError::Usage(format!("unknown command: {other}"))),
    }
}

fn config_path(args: &[String]) -> Result<PathBuf, AppError> {
    match args.first() {
        Some(path) if !path.starts_with("--") => Ok(PathBuf::from(path)),
        _ => Err(AppError::Usage("missing config path".into())),
    }
}

fn parse_number<T: std::str::FromStr>(flag: &str, value: &str) -> Result<T, AppError> {
    value
        .parse()
        .map_err(|_| AppError::Usage(format!("{flag}: not a number: {value}")))
}

pub fn usage() -> &'static str {
    "popsim: fixed-tick population simulator\n\
     \n\
     Commands:\n\
     \n\
     run <config.json>   Run the simulation described by the config file.\n\
                         The file is created with demo settings if missing.\n\
       --ticks <N>         Stop after N ticks (default: run until failure)\n\
       --frame-every <N>   Print every Nth frame as text (default: 0, none)\n\
       --columns <N>       Width of printed frames (default: 64)\n\
     \n\
     init <config.json>  Write the demo configuration and exit.\n\
     \n\
     Logging is controlled with RUST_LOG, e.g. RUST_LOG=popsim_sim=debug.\n"
}
