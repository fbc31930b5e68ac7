mod config;
mod emulator;

use clap::Parser;
use config::Config;
use emulator::Emulator;
use std::path::PathBuf;
use tracing::{info, Level};

#[derive(Parser)]
#[command(version, about = "Headless Intel 8088 / NEC V20 PC emulator")]
struct Args {
    /// BIOS image, mapped so that it ends at the top of the address space
    bios: Option<PathBuf>,

    /// Configuration file to use instead of the one in the user config directory
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Emulate a NEC V20 instead of an Intel 8088
    #[arg(long)]
    v20: bool,

    /// Amount of conventional memory in KiB
    #[arg(long)]
    ram: Option<usize>,

    /// Limit the speed in millions of instructions per second
    #[arg(long)]
    mips: Option<f64>,

    /// Stop after this many instructions
    #[arg(long)]
    max_instructions: Option<u64>,

    /// More output per occurrence (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

impl Args {
    /// Flags on the command line take precedence over the config file.
    fn apply(self, config: &mut Config) {
        if let Some(bios) = self.bios {
            config.bios = Some(bios);
        }
        if self.v20 {
            config.v20 = true;
        }
        if let Some(ram) = self.ram {
            config.ram_size = ram * 1024;
        }
        if self.mips.is_some() {
            config.mips = self.mips;
        }
        if self.max_instructions.is_some() {
            config.max_instructions = self.max_instructions;
        }
        match self.verbose {
            0 => {}
            1 => config.log_level = "debug".to_owned(),
            _ => config.log_level = "trace".to_owned(),
        }
    }
}

fn load_config(path: Option<&PathBuf>) -> Result<Config, Box<dyn std::error::Error>> {
    match path {
        Some(path) => Config::load(path),
        None => match Config::default_path() {
            Some(path) if path.exists() => Config::load(&path),
            _ => Ok(Config::default()),
        },
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let mut config = load_config(args.config.as_ref())?;
    args.apply(&mut config);

    let level: Level = config.log_level.parse()?;
    tracing_subscriber::fmt().with_max_level(level).init();

    let mut emulator = Emulator::new(&config)?;
    let result = emulator.run();
    emulator.close();

    let reason = result?;
    info!("Stopped: {:?}", reason);

    Ok(())
}
