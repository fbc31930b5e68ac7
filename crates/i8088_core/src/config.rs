use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CpuModel {
    #[default]
    Intel8088,
    NecV20,
}

/// Construction time settings for the execution engine.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CpuConfig {
    pub model: CpuModel,

    /// Raise the debug break flag when the baseline CPU hits an invalid opcode. When disabled the
    /// opcode is logged and skipped.
    pub break_on_invalid: bool,
}

impl Default for CpuConfig {
    fn default() -> Self {
        Self {
            model: CpuModel::Intel8088,
            break_on_invalid: true,
        }
    }
}

impl CpuConfig {
    pub fn with_model(mut self, model: CpuModel) -> Self {
        self.model = model;
        self
    }

    #[inline(always)]
    pub fn is_v20(&self) -> bool {
        self.model == CpuModel::NecV20
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_to_baseline_cpu() {
        let config = CpuConfig::default();
        assert!(!config.is_v20());
        assert!(config.break_on_invalid);
        assert!(config.with_model(CpuModel::NecV20).is_v20());
    }
}
