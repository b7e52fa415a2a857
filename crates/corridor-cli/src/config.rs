//! Configuration Vault – reads/writes `~/.corridor/config.toml`.

use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use corridor_hal::SensorTiming;
use corridor_perception::FilterKind;
use corridor_runtime::{
    AvoidanceStrategy, CorrectionBand, CorrectionTable, ControlLoopConfig, DEFAULT_BANDS,
    DodgeExit, NavigationPolicy,
};
use corridor_types::{CorridorError, SpeedPair, Ticks};
use serde::{Deserialize, Serialize};

// ─────────────────────────────────────────────────────────────────────────────
// Config sections
// ─────────────────────────────────────────────────────────────────────────────

/// Trigger and echo timing of one sensor, in microseconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensorConfig {
    #[serde(default = "default_trigger_pulse_us")]
    pub trigger_pulse_us: u64,
    #[serde(default = "default_echo_window_us")]
    pub echo_window_us: u64,
}

impl Default for SensorConfig {
    fn default() -> Self {
        Self {
            trigger_pulse_us: default_trigger_pulse_us(),
            echo_window_us: default_echo_window_us(),
        }
    }
}

impl SensorConfig {
    pub fn timing(&self) -> SensorTiming {
        SensorTiming {
            trigger_pulse: Duration::from_micros(self.trigger_pulse_us),
            echo_window: Duration::from_micros(self.echo_window_us),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SensorsConfig {
    #[serde(default)]
    pub front: SensorConfig,
    #[serde(default)]
    pub side: SensorConfig,
}

/// Navigation thresholds (ticks), speeds, and waits (milliseconds).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NavigationConfig {
    #[serde(default = "default_stop_threshold")]
    pub stop_threshold: Ticks,
    #[serde(default = "default_dodge_threshold")]
    pub dodge_threshold: Ticks,
    #[serde(default = "default_recover_threshold")]
    pub recover_threshold: Ticks,
    #[serde(default = "default_dodge_front_exit")]
    pub dodge_front_exit: Ticks,
    #[serde(default = "default_dodge_side_exit")]
    pub dodge_side_exit: Ticks,
    #[serde(default = "default_stop_hold_ms")]
    pub stop_hold_ms: f64,
    #[serde(default = "default_settle_ms")]
    pub settle_ms: f64,
    #[serde(default = "default_turn_ms")]
    pub turn_ms: f64,
    #[serde(default)]
    pub avoidance: AvoidanceStrategy,
    #[serde(default)]
    pub dodge_exit: DodgeExit,
    /// Unset means recoveries never give up.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recovery_limit: Option<u32>,
    #[serde(default = "default_stop_speeds")]
    pub stop_speeds: SpeedPair,
    #[serde(default = "default_reverse_speeds")]
    pub reverse_speeds: SpeedPair,
    #[serde(default = "default_dodge_speeds")]
    pub dodge_speeds: SpeedPair,
    #[serde(default = "default_turn_speeds")]
    pub turn_speeds: SpeedPair,
}

impl Default for NavigationConfig {
    fn default() -> Self {
        Self {
            stop_threshold: default_stop_threshold(),
            dodge_threshold: default_dodge_threshold(),
            recover_threshold: default_recover_threshold(),
            dodge_front_exit: default_dodge_front_exit(),
            dodge_side_exit: default_dodge_side_exit(),
            stop_hold_ms: default_stop_hold_ms(),
            settle_ms: default_settle_ms(),
            turn_ms: default_turn_ms(),
            avoidance: AvoidanceStrategy::default(),
            dodge_exit: DodgeExit::default(),
            recovery_limit: None,
            stop_speeds: default_stop_speeds(),
            reverse_speeds: default_reverse_speeds(),
            dodge_speeds: default_dodge_speeds(),
            turn_speeds: default_turn_speeds(),
        }
    }
}

impl NavigationConfig {
    pub fn to_policy(&self) -> Result<NavigationPolicy, CorridorError> {
        let policy = NavigationPolicy {
            stop_threshold: self.stop_threshold,
            dodge_threshold: self.dodge_threshold,
            recover_threshold: self.recover_threshold,
            dodge_front_exit: self.dodge_front_exit,
            dodge_side_exit: self.dodge_side_exit,
            stop_speeds: self.stop_speeds,
            reverse_speeds: self.reverse_speeds,
            dodge_speeds: self.dodge_speeds,
            turn_speeds: self.turn_speeds,
            stop_hold: millis("navigation.stop_hold_ms", self.stop_hold_ms)?,
            settle: millis("navigation.settle_ms", self.settle_ms)?,
            turn_duration: millis("navigation.turn_ms", self.turn_ms)?,
            avoidance: self.avoidance,
            dodge_exit: self.dodge_exit,
            recovery_limit: self.recovery_limit,
        };
        policy.validate()?;
        Ok(policy)
    }
}

/// Scripted echoes for the simulation rig.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimConfig {
    /// Initial value of the virtual capture timer.
    #[serde(default)]
    pub start_tick: u64,
    #[serde(default = "default_front_echoes")]
    pub front_echoes: Vec<Ticks>,
    #[serde(default = "default_side_echoes")]
    pub side_echoes: Vec<Ticks>,
    /// Restart the scripts when exhausted instead of holding the last echo.
    #[serde(default = "default_true")]
    pub cycle: bool,
    #[serde(default)]
    pub motor_busy_polls: u32,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            start_tick: 0,
            front_echoes: default_front_echoes(),
            side_echoes: default_side_echoes(),
            cycle: true,
            motor_busy_polls: 0,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Config
// ─────────────────────────────────────────────────────────────────────────────

/// Persisted configuration stored in `~/.corridor/config.toml`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Largest count of the capture timer before it wraps.
    #[serde(default = "default_tick_max")]
    pub tick_max: Ticks,

    /// Capture timer frequency.
    #[serde(default = "default_clock_hz")]
    pub clock_hz: u32,

    #[serde(default)]
    pub filter: FilterKind,

    #[serde(default = "default_warmup_ms")]
    pub warmup_ms: f64,

    #[serde(default = "default_priming_pings")]
    pub priming_pings: u32,

    /// Iterations per run; `0` runs until Ctrl-C.
    #[serde(default = "default_max_iterations")]
    pub max_iterations: u64,

    #[serde(default)]
    pub sensors: SensorsConfig,

    #[serde(default)]
    pub navigation: NavigationConfig,

    #[serde(default)]
    pub sim: SimConfig,

    #[serde(default = "default_correction")]
    pub correction: Vec<CorrectionBand>,
}

fn default_tick_max() -> Ticks {
    0xFFFF
}
fn default_clock_hz() -> u32 {
    1_200_000
}
fn default_warmup_ms() -> f64 {
    62.5
}
fn default_priming_pings() -> u32 {
    50
}
fn default_max_iterations() -> u64 {
    500
}
fn default_trigger_pulse_us() -> u64 {
    10
}
fn default_echo_window_us() -> u64 {
    25_000
}
fn default_stop_threshold() -> Ticks {
    1770
}
fn default_dodge_threshold() -> Ticks {
    4000
}
fn default_recover_threshold() -> Ticks {
    3800
}
fn default_dodge_front_exit() -> Ticks {
    4000
}
fn default_dodge_side_exit() -> Ticks {
    2000
}
fn default_stop_hold_ms() -> f64 {
    100.0
}
fn default_settle_ms() -> f64 {
    25.0
}
fn default_turn_ms() -> f64 {
    262.5
}
fn default_stop_speeds() -> SpeedPair {
    SpeedPair::NEUTRAL
}
fn default_reverse_speeds() -> SpeedPair {
    SpeedPair::new(90, 90)
}
fn default_dodge_speeds() -> SpeedPair {
    SpeedPair::new(70, 5)
}
fn default_turn_speeds() -> SpeedPair {
    SpeedPair::new(20, 58)
}
fn default_true() -> bool {
    true
}
fn default_correction() -> Vec<CorrectionBand> {
    DEFAULT_BANDS.to_vec()
}
/// A corridor with a box ahead: open, closing in, blocked, then clear.
fn default_front_echoes() -> Vec<Ticks> {
    vec![
        9000, 8800, 8600, 7000, 5600, 4400, 3600, 3400, 4200, 6000, 8000, 8800, 8600, 5200,
        2600, 1600, 1500, 1500, 2400, 3300, 4200, 5800, 7600, 9000,
    ]
}
/// A wall that drifts close, then far, around the target band.
fn default_side_echoes() -> Vec<Ticks> {
    vec![2400, 2350, 2150, 1900, 1700, 1850, 2300, 2500, 2800, 3100, 3300, 2900, 2600]
}

impl Default for Config {
    fn default() -> Self {
        Self {
            tick_max: default_tick_max(),
            clock_hz: default_clock_hz(),
            filter: FilterKind::default(),
            warmup_ms: default_warmup_ms(),
            priming_pings: default_priming_pings(),
            max_iterations: default_max_iterations(),
            sensors: SensorsConfig::default(),
            navigation: NavigationConfig::default(),
            sim: SimConfig::default(),
            correction: default_correction(),
        }
    }
}

impl Config {
    /// Convert into the runtime's loop configuration, validating every
    /// section on the way.
    pub fn to_loop_config(&self) -> Result<ControlLoopConfig, CorridorError> {
        if self.clock_hz == 0 {
            return Err(CorridorError::InvalidConfig("clock_hz must be non-zero".into()));
        }
        Ok(ControlLoopConfig {
            warmup: millis("warmup_ms", self.warmup_ms)?,
            priming_pings: self.priming_pings,
            policy: self.navigation.to_policy()?,
            correction: CorrectionTable::new(self.correction.clone())?,
            max_iterations: (self.max_iterations > 0).then_some(self.max_iterations),
            clock_hz: self.clock_hz,
        })
    }
}

fn millis(field: &str, ms: f64) -> Result<Duration, CorridorError> {
    Duration::try_from_secs_f64(ms / 1000.0)
        .map_err(|e| CorridorError::InvalidConfig(format!("{field} = {ms}: {e}")))
}

// ─────────────────────────────────────────────────────────────────────────────
// Load / save
// ─────────────────────────────────────────────────────────────────────────────

/// Return the config path: `$CORRIDOR_CONFIG` if set, otherwise
/// `~/.corridor/config.toml`.
pub fn config_path() -> PathBuf {
    if let Ok(p) = std::env::var("CORRIDOR_CONFIG") {
        return PathBuf::from(p);
    }
    config_path_for_home(
        &std::env::var("HOME")
            .or_else(|_| std::env::var("USERPROFILE"))
            .unwrap_or_else(|_| ".".to_string()),
    )
}

pub(crate) fn config_path_for_home(home: &str) -> PathBuf {
    PathBuf::from(home).join(".corridor").join("config.toml")
}

/// Load the config from disk.  Returns `None` if the file does not exist.
pub fn load() -> Result<Option<Config>, String> {
    load_from(&config_path())
}

pub(crate) fn load_from(path: &PathBuf) -> Result<Option<Config>, String> {
    if !path.exists() {
        return Ok(None);
    }
    let raw = fs::read_to_string(path)
        .map_err(|e| format!("Failed to read config at {}: {}", path.display(), e))?;
    let mut cfg: Config =
        toml::from_str(&raw).map_err(|e| format!("Failed to parse config: {}", e))?;
    apply_env_overrides(&mut cfg);
    Ok(Some(cfg))
}

/// Defaults with the `CORRIDOR_*` overrides applied, for when no config file
/// is present or the file cannot be loaded.
pub fn fallback() -> Config {
    let mut cfg = Config::default();
    apply_env_overrides(&mut cfg);
    cfg
}

/// Apply `CORRIDOR_*` environment variable overrides to `cfg`.  Values that
/// do not parse are ignored.
///
/// | Variable | Config field |
/// |---|---|
/// | `CORRIDOR_STOP_THRESHOLD` | `navigation.stop_threshold` |
/// | `CORRIDOR_DODGE_THRESHOLD` | `navigation.dodge_threshold` |
/// | `CORRIDOR_RECOVERY_LIMIT` | `navigation.recovery_limit` |
/// | `CORRIDOR_MAX_ITERATIONS` | `max_iterations` |
pub fn apply_env_overrides(cfg: &mut Config) {
    if let Ok(v) = std::env::var("CORRIDOR_STOP_THRESHOLD")
        && let Ok(ticks) = v.parse::<Ticks>()
    {
        cfg.navigation.stop_threshold = ticks;
    }
    if let Ok(v) = std::env::var("CORRIDOR_DODGE_THRESHOLD")
        && let Ok(ticks) = v.parse::<Ticks>()
    {
        cfg.navigation.dodge_threshold = ticks;
    }
    if let Ok(v) = std::env::var("CORRIDOR_RECOVERY_LIMIT")
        && let Ok(limit) = v.parse::<u32>()
    {
        cfg.navigation.recovery_limit = Some(limit);
    }
    if let Ok(v) = std::env::var("CORRIDOR_MAX_ITERATIONS")
        && let Ok(n) = v.parse::<u64>()
    {
        cfg.max_iterations = n;
    }
}

/// Save the config to disk, creating its directory if necessary.
pub fn save(cfg: &Config) -> Result<(), String> {
    save_to(cfg, &config_path())
}

pub(crate) fn save_to(cfg: &Config, path: &PathBuf) -> Result<(), String> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .map_err(|e| format!("Failed to create config directory: {}", e))?;
    }
    let raw =
        toml::to_string_pretty(cfg).map_err(|e| format!("Failed to serialize config: {}", e))?;
    fs::write(path, raw)
        .map_err(|e| format!("Failed to write config at {}: {}", path.display(), e))
}
