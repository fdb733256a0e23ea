use std::io;
use std::process;

use popsim_app::cli::{self, Command};
use popsim_app::{config_file, runner, AppError};

fn main() {
    env_logger::init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    if let Err(e) = run(&args) {
        log::error!("{e}");
        eprintln!("popsim: {e}");
        if matches!(e, AppError::Usage(_)) {
            eprint!("\n{}", cli::usage());
            process::exit(2);
        }
        process::exit(1);
    }
}

fn run(args: &[String]) -> Result<(), AppError> {
    match cli::parse_args(args)? {
        Command::Help => {
            print!("{}", cli::usage());
            Ok(())
        }
        Command::Init { config } => {
            config_file::write_config(&config, &config_file::demo_config())?;
            println!("wrote {}", config.display());
            Ok(())
        }
        Command::Run { config, options } => {
            let sim_config = config_file::load_or_init(&config)?;
            let summary = runner::run(&sim_config, &options, Box::new(io::stdout()))?;
            println!("{} ticks, {} live entities", summary.ticks, summary.live);
            Ok(())
        }
    }
}
