use crate::governor::DEFAULT_MAX_FRACTION;
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

/// Delay between restarting the core and loading the corrupted state back in.
/// Empirical: it gives the host time to settle after a restart. It is not a
/// synchronization point.
pub const DEFAULT_RELOAD_DELAY: Duration = Duration::from_millis(50);

/// Delay before a full host reload when a ROM was rewritten but the session
/// cannot restart.
pub const DEFAULT_HOST_RELOAD_DELAY: Duration = Duration::from_millis(100);

pub const DEFAULT_ROM_EXTENSIONS: [&str; 18] = [
    "sfc", "smc", "nes", "gen", "bin", "iso", "z64", "n64", "gba", "gg", "md", "gb", "gbc", "v64",
    "cue", "img", "nds", "pbp",
];

#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "kebab-case")]
#[serde(deny_unknown_fields)]
pub struct SafetySettings {
    #[serde(default = "default_max_fraction")]
    pub max_fraction: f64,
    #[serde(default = "default_rom_row_fraction")]
    pub rom_row_fraction: f64,
}

fn default_max_fraction() -> f64 {
    DEFAULT_MAX_FRACTION
}

fn default_rom_row_fraction() -> f64 {
    1.0
}

impl Default for SafetySettings {
    fn default() -> Self {
        Self {
            max_fraction: default_max_fraction(),
            rom_row_fraction: default_rom_row_fraction(),
        }
    }
}

#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
#[serde(deny_unknown_fields)]
pub struct RestartSettings {
    #[serde(default = "default_reload_delay_ms")]
    pub reload_delay_ms: u64,
    #[serde(default = "default_host_reload_delay_ms")]
    pub host_reload_delay_ms: u64,
}

fn default_reload_delay_ms() -> u64 {
    DEFAULT_RELOAD_DELAY.as_millis() as u64
}

fn default_host_reload_delay_ms() -> u64 {
    DEFAULT_HOST_RELOAD_DELAY.as_millis() as u64
}

impl RestartSettings {
    pub fn reload_delay(&self) -> Duration {
        Duration::from_millis(self.reload_delay_ms)
    }
}

impl Default for RestartSettings {
    fn default() -> Self {
        Self {
            reload_delay_ms: default_reload_delay_ms(),
            host_reload_delay_ms: default_host_reload_delay_ms(),
        }
    }
}

#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
#[serde(deny_unknown_fields)]
pub struct RomSettings {
    /// Bytes per row; rows are the unit of ROM row selection.
    #[serde(default = "default_line_size")]
    pub line_size: usize,
    /// Leading bytes (headers, boot code) that are never mutated.
    #[serde(default = "default_boot_safe_bytes")]
    pub boot_safe_bytes: usize,
    #[serde(default = "default_min_boot_safe_lines")]
    pub min_boot_safe_lines: usize,
    #[serde(default = "default_extensions")]
    pub extensions: Vec<String>,
}

fn default_line_size() -> usize {
    16
}

fn default_boot_safe_bytes() -> usize {
    1024
}

fn default_min_boot_safe_lines() -> usize {
    2
}

fn default_extensions() -> Vec<String> {
    DEFAULT_ROM_EXTENSIONS
        .iter()
        .map(|ext| ext.to_string())
        .collect()
}

impl Default for RomSettings {
    fn default() -> Self {
        Self {
            line_size: default_line_size(),
            boot_safe_bytes: default_boot_safe_bytes(),
            min_boot_safe_lines: default_min_boot_safe_lines(),
            extensions: default_extensions(),
        }
    }
}

#[derive(Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(rename_all = "kebab-case")]
#[serde(deny_unknown_fields)]
pub struct GlitchConfig {
    /// Fixed RNG seed. `None` seeds from the thread RNG.
    #[serde(default)]
    pub seed: Option<u64>,
    #[serde(default)]
    pub safety: SafetySettings,
    #[serde(default)]
    pub restart: RestartSettings,
    #[serde(default)]
    pub rom: RomSettings,
}

impl GlitchConfig {
    pub fn load_from_file(path: &Path) -> Result<Self, anyhow::Error> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("Failed to read config file at {:?}: {}", path, e))?;
        Self::from_toml_str(&content)
            .map_err(|e| anyhow::anyhow!("Invalid config file {:?}: {}", path, e))
    }

    pub fn from_toml_str(content: &str) -> Result<Self, anyhow::Error> {
        let config: GlitchConfig = toml::from_str(content)
            .map_err(|e| anyhow::anyhow!("Failed to parse TOML: {}", e))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), anyhow::Error> {
        for (name, fraction) in [
            ("safety.max-fraction", self.safety.max_fraction),
            ("safety.rom-row-fraction", self.safety.rom_row_fraction),
        ] {
            if !(fraction > 0.0 && fraction <= 1.0) {
                anyhow::bail!("{name} must be in (0, 1], got {fraction}");
            }
        }
        if self.rom.line_size == 0 {
            anyhow::bail!("rom.line-size must be at least 1");
        }
        Ok(())
    }
}
