//! Configuration loading from joulecast.toml
//!
//! Study parameters can be specified in a `joulecast.toml` file in the
//! project root. The configuration is automatically discovered by walking up
//! from the current directory; CLI flags override individual values.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use joulecast_core::{Platform, SamplerSettings};

/// Joulecast configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct StudyConfig {
    /// Experiment schedule configuration
    #[serde(default)]
    pub experiment: ExperimentConfig,
    /// Browser session configuration
    #[serde(default)]
    pub browser: BrowserConfig,
    /// Energy sampler configuration
    #[serde(default)]
    pub sampler: SamplerConfig,
    /// Output configuration
    #[serde(default)]
    pub output: OutputConfig,
    /// Episode URLs per platform
    #[serde(default)]
    pub platforms: PlatformConfig,
}

/// Experiment schedule configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExperimentConfig {
    /// Successful trials targeted per condition
    #[serde(default = "default_runs_per_config")]
    pub runs_per_config: u32,
    /// Ceiling on total attempts per condition; defaults to twice the target
    #[serde(default)]
    pub max_attempts_per_config: Option<u32>,
    /// Measurement window per trial (e.g., "45s", "2m")
    #[serde(default = "default_measurement_time")]
    pub measurement_time: String,
    /// Idle pause between trials (e.g., "30s")
    #[serde(default = "default_cooldown_time")]
    pub cooldown_time: String,
}

impl Default for ExperimentConfig {
    fn default() -> Self {
        Self {
            runs_per_config: default_runs_per_config(),
            max_attempts_per_config: None,
            measurement_time: default_measurement_time(),
            cooldown_time: default_cooldown_time(),
        }
    }
}

fn default_runs_per_config() -> u32 {
    30
}
fn default_measurement_time() -> String {
    "45s".to_string()
}
fn default_cooldown_time() -> String {
    "30s".to_string()
}

/// Browser session configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrowserConfig {
    /// Wait after navigation before playback is attempted (e.g., "10s")
    #[serde(default = "default_page_load_wait")]
    pub page_load_wait: String,
    /// Explicit Chrome binary path (else discovered on the search path)
    #[serde(default)]
    pub chrome_binary: Option<PathBuf>,
    /// Explicit Brave binary path (else discovered on the search path)
    #[serde(default)]
    pub brave_binary: Option<PathBuf>,
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            page_load_wait: default_page_load_wait(),
            chrome_binary: None,
            brave_binary: None,
        }
    }
}

fn default_page_load_wait() -> String {
    "10s".to_string()
}

/// Energy sampler configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SamplerConfig {
    /// Explicit sampler binary path (else env override, else search path)
    #[serde(default)]
    pub path: Option<PathBuf>,
    /// Sampling interval passed to the tool, also the fallback interval when
    /// telemetry rows carry no timing column (e.g., "500ms")
    #[serde(default = "default_sampler_interval")]
    pub interval: String,
    /// Grace period between stop signal and hard kill (e.g., "10s")
    #[serde(default = "default_stop_timeout")]
    pub stop_timeout: String,
    /// Wrap the sampler in `sudo -n` on Linux (energy counters usually need
    /// elevated privileges there)
    #[serde(default)]
    pub elevate: bool,
}

impl Default for SamplerConfig {
    fn default() -> Self {
        Self {
            path: None,
            interval: default_sampler_interval(),
            stop_timeout: default_stop_timeout(),
            elevate: false,
        }
    }
}

fn default_sampler_interval() -> String {
    "500ms".to_string()
}
fn default_stop_timeout() -> String {
    "10s".to_string()
}

/// Output configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Directory holding per-condition results
    #[serde(default = "default_output_dir")]
    pub directory: String,
    /// Default report format: "human", "json", "csv"
    #[serde(default = "default_format")]
    pub format: String,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            directory: default_output_dir(),
            format: default_format(),
        }
    }
}

fn default_output_dir() -> String {
    "results".to_string()
}
fn default_format() -> String {
    "human".to_string()
}

/// Episode URLs per platform. Use a long episode (longer than the
/// measurement window).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlatformConfig {
    /// Spotify episode URL
    #[serde(default = "default_spotify_url")]
    pub spotify_url: String,
    /// Apple Podcasts episode URL
    #[serde(default = "default_apple_url")]
    pub apple_url: String,
}

impl Default for PlatformConfig {
    fn default() -> Self {
        Self {
            spotify_url: default_spotify_url(),
            apple_url: default_apple_url(),
        }
    }
}

fn default_spotify_url() -> String {
    "https://open.spotify.com/episode/18IGzOgfs3Bmcr5JZapdEt".to_string()
}
fn default_apple_url() -> String {
    "https://podcasts.apple.com/us/podcast/open-retrieve-expand-load/id617416468?i=1000746253334"
        .to_string()
}

impl StudyConfig {
    /// Load configuration from a TOML file
    pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        let config: Self = toml::from_str(&content)?;
        Ok(config)
    }

    /// Try to discover and load configuration by walking up from current directory
    pub fn discover() -> Option<Self> {
        let mut dir = std::env::current_dir().ok()?;
        loop {
            let config_path = dir.join("joulecast.toml");
            if config_path.exists() {
                return Self::load(&config_path).ok();
            }
            if !dir.pop() {
                break;
            }
        }
        None
    }

    /// Generate a default configuration as TOML string
    pub fn default_toml() -> String {
        r#"# Joulecast Configuration

[experiment]
# Successful trials per condition
runs_per_config = 30
# Measurement window per trial
measurement_time = "45s"
# Idle pause between trials
cooldown_time = "30s"
# Attempts ceiling per condition (uncomment to override the 2x default)
# max_attempts_per_config = 60

[browser]
# Wait after navigation before playback is attempted
page_load_wait = "10s"
# Explicit binary paths (uncomment to override discovery)
# chrome_binary = "/usr/bin/google-chrome"
# brave_binary = "/usr/bin/brave-browser"

[sampler]
# Explicit sampler binary path (uncomment to override discovery)
# path = "/usr/local/bin/energibridge"
# Sampling interval; also the fallback when rows carry no timing column
interval = "500ms"
# Grace period between stop signal and hard kill
stop_timeout = "10s"
# Wrap the sampler in `sudo -n` on Linux
elevate = false

[output]
# Directory holding per-condition results
directory = "results"
# Default report format: human, json, csv
format = "human"

[platforms]
# Use episodes longer than the measurement window
spotify_url = "https://open.spotify.com/episode/18IGzOgfs3Bmcr5JZapdEt"
apple_url = "https://podcasts.apple.com/us/podcast/open-retrieve-expand-load/id617416468?i=1000746253334"
"#
        .to_string()
    }

    /// Parse duration string (e.g., "45s", "500ms", "2m") to a [`Duration`]
    pub fn parse_duration(s: &str) -> anyhow::Result<Duration> {
        let s = s.trim();
        if s.is_empty() {
            return Err(anyhow::anyhow!("Empty duration string"));
        }

        // Find where the number ends and unit begins
        let (num_part, unit_part) = s
            .char_indices()
            .find(|(_, c)| c.is_alphabetic())
            .map(|(i, _)| s.split_at(i))
            .unwrap_or((s, "s"));

        let value: f64 = num_part
            .parse()
            .map_err(|_| anyhow::anyhow!("Invalid duration number: {}", num_part))?;

        let nanos: u64 = match unit_part.to_lowercase().as_str() {
            "ms" => (value * 1_000_000.0) as u64,
            "s" | "" => (value * 1_000_000_000.0) as u64,
            "m" | "min" => (value * 60_000_000_000.0) as u64,
            _ => return Err(anyhow::anyhow!("Unknown duration unit: {}", unit_part)),
        };

        Ok(Duration::from_nanos(nanos))
    }

    /// Measurement window per trial.
    pub fn measurement(&self) -> anyhow::Result<Duration> {
        Self::parse_duration(&self.experiment.measurement_time)
    }

    /// Cooldown between trials.
    pub fn cooldown(&self) -> anyhow::Result<Duration> {
        Self::parse_duration(&self.experiment.cooldown_time)
    }

    /// Wait after navigation before playback is attempted.
    pub fn page_load_wait(&self) -> anyhow::Result<Duration> {
        Self::parse_duration(&self.browser.page_load_wait)
    }

    /// Sampling interval (and fallback interval for untimed telemetry).
    pub fn sampler_interval(&self) -> anyhow::Result<Duration> {
        Self::parse_duration(&self.sampler.interval)
    }

    /// Attempts ceiling per condition: explicit, else twice the success
    /// target so a flaky condition cannot loop forever.
    pub fn max_attempts(&self) -> u32 {
        self.experiment
            .max_attempts_per_config
            .unwrap_or_else(|| self.experiment.runs_per_config.saturating_mul(2))
    }

    /// Episode URL for one platform.
    pub fn episode_url(&self, platform: Platform) -> &str {
        match platform {
            Platform::Spotify => &self.platforms.spotify_url,
            Platform::Apple => &self.platforms.apple_url,
        }
    }

    /// Sampler settings for the core sampler wrapper.
    pub fn sampler_settings(&self) -> anyhow::Result<SamplerSettings> {
        Ok(SamplerSettings {
            path_override: self.sampler.path.clone(),
            interval: self.sampler_interval()?,
            stop_timeout: Self::parse_duration(&self.sampler.stop_timeout)?,
            elevate: self.sampler.elevate,
            ..SamplerSettings::default()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = StudyConfig::default();
        assert_eq!(config.experiment.runs_per_config, 30);
        assert_eq!(config.experiment.measurement_time, "45s");
        assert_eq!(config.experiment.cooldown_time, "30s");
        assert_eq!(config.max_attempts(), 60);
        assert!(!config.sampler.elevate);
    }

    #[test]
    fn test_parse_duration() {
        assert_eq!(
            StudyConfig::parse_duration("45s").unwrap(),
            Duration::from_secs(45)
        );
        assert_eq!(
            StudyConfig::parse_duration("500ms").unwrap(),
            Duration::from_millis(500)
        );
        assert_eq!(
            StudyConfig::parse_duration("2m").unwrap(),
            Duration::from_secs(120)
        );
        assert_eq!(
            StudyConfig::parse_duration("1.5s").unwrap(),
            Duration::from_millis(1500)
        );
        assert!(StudyConfig::parse_duration("10 fortnights").is_err());
        assert!(StudyConfig::parse_duration("").is_err());
    }

    #[test]
    fn test_parse_toml() {
        let toml_str = r#"
            [experiment]
            runs_per_config = 5
            measurement_time = "10s"

            [sampler]
            elevate = true
        "#;

        let config: StudyConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.experiment.runs_per_config, 5);
        assert_eq!(config.experiment.measurement_time, "10s");
        assert!(config.sampler.elevate);
        // Defaults should still apply
        assert_eq!(config.output.directory, "results");
        assert_eq!(config.max_attempts(), 10);
    }

    #[test]
    fn test_default_toml_parses() {
        let default_toml = StudyConfig::default_toml();
        let config: StudyConfig = toml::from_str(&default_toml).unwrap();
        assert_eq!(config.experiment.runs_per_config, 30);
        assert_eq!(config.sampler.interval, "500ms");
    }

    #[test]
    fn test_episode_urls() {
        let config = StudyConfig::default();
        assert!(config.episode_url(Platform::Spotify).contains("spotify.com"));
        assert!(config.episode_url(Platform::Apple).contains("apple.com"));
    }
}
