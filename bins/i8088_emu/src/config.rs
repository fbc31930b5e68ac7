use i8088_core::{CpuConfig, CpuModel};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Conventional memory of a fully populated PC (640KiB).
pub const DEFAULT_RAM_SIZE: usize = 0xA0000;

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Config {
    pub bios: Option<PathBuf>,
    pub ram_size: usize,
    pub v20: bool,
    pub break_on_invalid: bool,
    /// Upper limit on the emulated speed in millions of instructions per second.
    pub mips: Option<f64>,
    pub max_instructions: Option<u64>,
    pub log_level: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bios: None,
            ram_size: DEFAULT_RAM_SIZE,
            v20: false,
            break_on_invalid: true,
            mips: None,
            max_instructions: None,
            log_level: "info".to_owned(),
        }
    }
}

impl Config {
    /// `<config dir>/i8088-emu/config.toml`
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("i8088-emu").join("config.toml"))
    }

    pub fn load(path: &Path) -> Result<Self, Box<dyn std::error::Error>> {
        let text = std::fs::read_to_string(path)?;
        Ok(toml::from_str(&text)?)
    }

    pub fn cpu(&self) -> CpuConfig {
        let model = if self.v20 {
            CpuModel::NecV20
        } else {
            CpuModel::Intel8088
        };

        CpuConfig {
            model,
            break_on_invalid: self.break_on_invalid,
        }
    }
}
