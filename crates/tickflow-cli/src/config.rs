//! Driver configuration – reads/writes `~/.tickflow/config.toml`.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use tickflow_runtime::MachineConfig;
use tickflow_runtime::history::DEFAULT_HISTORY_CAPACITY;
use tickflow_runtime::state_machine::DEFAULT_MAX_CASCADE;
use tickflow_types::TickflowError;

/// Persisted driver configuration stored in `~/.tickflow/config.toml`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// Delay between two `step()` calls, in milliseconds.
    #[serde(default = "default_tick_interval_ms")]
    pub tick_interval_ms: u64,

    /// Number of steps the driver runs before stopping.
    #[serde(default = "default_max_steps")]
    pub max_steps: u64,

    /// Transitions one step may fire before it is aborted.
    #[serde(default = "default_max_cascade")]
    pub max_cascade: usize,

    /// Entries kept in the state history shown at exit.
    #[serde(default = "default_history_capacity")]
    pub history_capacity: usize,
}

fn default_tick_interval_ms() -> u64 {
    250
}
fn default_max_steps() -> u64 {
    60
}
fn default_max_cascade() -> usize {
    DEFAULT_MAX_CASCADE
}
fn default_history_capacity() -> usize {
    DEFAULT_HISTORY_CAPACITY
}

impl Default for Config {
    fn default() -> Self {
        Self {
            tick_interval_ms: default_tick_interval_ms(),
            max_steps: default_max_steps(),
            max_cascade: default_max_cascade(),
            history_capacity: default_history_capacity(),
        }
    }
}

impl Config {
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }

    pub fn machine_config(&self) -> MachineConfig {
        MachineConfig {
            max_cascade: self.max_cascade,
        }
    }
}

/// Return the path to `~/.tickflow/config.toml`.
pub fn config_path() -> PathBuf {
    config_path_for_home(
        &std::env::var("HOME")
            .or_else(|_| std::env::var("USERPROFILE"))
            .unwrap_or_else(|_| ".".to_string()),
    )
}

/// Build the config path relative to the given home directory.
pub(crate) fn config_path_for_home(home: &str) -> PathBuf {
    PathBuf::from(home).join(".tickflow").join("config.toml")
}

/// Load the config at `path` and apply environment overrides.  A missing
/// file yields the defaults (with overrides) and `false`.
pub fn load(path: &Path) -> Result<(Config, bool), TickflowError> {
    let (mut cfg, found) = match load_from(path)? {
        Some(cfg) => (cfg, true),
        None => (Config::default(), false),
    };
    apply_env_overrides(&mut cfg);
    Ok((cfg, found))
}

/// Parse the config file at `path`.  Returns `None` if the file does not
/// exist.
pub(crate) fn load_from(path: &Path) -> Result<Option<Config>, TickflowError> {
    if !path.exists() {
        return Ok(None);
    }
    let raw = fs::read_to_string(path).map_err(|e| {
        TickflowError::Config(format!("failed to read {}: {e}", path.display()))
    })?;
    let cfg: Config = toml::from_str(&raw)
        .map_err(|e| TickflowError::Config(format!("failed to parse {}: {e}", path.display())))?;
    Ok(Some(cfg))
}

/// Apply `TICKFLOW_*` environment variable overrides to `cfg`.
///
/// | Variable | Config field |
/// |---|---|
/// | `TICKFLOW_TICK_INTERVAL_MS` | `tick_interval_ms` |
/// | `TICKFLOW_MAX_STEPS` | `max_steps` |
/// | `TICKFLOW_MAX_CASCADE` | `max_cascade` |
///
/// Values that do not parse are ignored.
pub fn apply_env_overrides(cfg: &mut Config) {
    if let Ok(v) = std::env::var("TICKFLOW_TICK_INTERVAL_MS")
        && let Ok(ms) = v.parse::<u64>()
    {
        cfg.tick_interval_ms = ms;
    }
    if let Ok(v) = std::env::var("TICKFLOW_MAX_STEPS")
        && let Ok(steps) = v.parse::<u64>()
    {
        cfg.max_steps = steps;
    }
    if let Ok(v) = std::env::var("TICKFLOW_MAX_CASCADE")
        && let Ok(limit) = v.parse::<usize>()
    {
        cfg.max_cascade = limit;
    }
}

/// Save the config to a specific path, creating its directory if necessary.
pub fn save_to(cfg: &Config, path: &Path) -> Result<(), TickflowError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| {
            TickflowError::Config(format!("failed to create {}: {e}", parent.display()))
        })?;
    }
    let raw = toml::to_string_pretty(cfg)
        .map_err(|e| TickflowError::Config(format!("failed to serialize config: {e}")))?;
    fs::write(path, raw)
        .map_err(|e| TickflowError::Config(format!("failed to write {}: {e}", path.display())))?;
    Ok(())
}
