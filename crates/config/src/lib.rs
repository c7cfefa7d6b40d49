//! Layered configuration for lectern.
//!
//! Sources are merged in order, later ones winning:
//!
//! 1. Built-in defaults ([`Config::default`]).
//! 2. A config file: an explicit path, or `lectern.toml` in the platform
//!    config directory. The format follows the extension (`.toml`, `.yaml`,
//!    `.yml`, `.json`).
//! 3. Environment variables prefixed `LECTERN_`; `__` separates nested keys
//!    (`LECTERN_SCROLLER__MAX_SECTIONS=30`).

pub mod error;

use crate::error::{ErrorKind, Result};
use directories::ProjectDirs;
use exn::ResultExt;
use figment::Figment;
use figment::providers::{Env, Format, Json, Serialized, Toml, Yaml};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

const ENV_PREFIX: &str = "LECTERN_";
const CONFIG_FILE: &str = "lectern.toml";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Provider used for unqualified text ids the catalog doesn't know.
    pub default_provider: String,
    /// Separates a provider name from a text id (`"local:eng_kjv"`).
    pub provider_separator: char,
    /// Directory-backed provider, registered when present.
    pub local: Option<LocalConfig>,
    pub scroller: ScrollerConfig,
}
impl Default for Config {
    fn default() -> Self {
        Self {
            default_provider: "local".to_string(),
            provider_separator: ':',
            local: None,
            scroller: ScrollerConfig::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocalConfig {
    #[serde(default = "LocalConfig::default_name")]
    pub name: String,
    pub root: PathBuf,
}
impl LocalConfig {
    fn default_name() -> String {
        "local".to_string()
    }
}

/// Tuning for every scroller the application opens.
///
/// Distances are measured in viewport heights so the same settings behave
/// the same in a tiny pane and a maximised one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScrollerConfig {
    /// Velocity sampling period while the reader is scrolling.
    pub sample_interval_ms: u64,
    /// How long location broadcasts to other windows are held back.
    pub nav_broadcast_delay_ms: u64,
    /// Load an adjacent section once the buffer edge is closer than this.
    pub prefetch_viewports: f64,
    /// Drop an edge section once the buffer edge is further than this.
    pub evict_viewports: f64,
    /// Hard cap on mounted sections.
    pub max_sections: usize,
    /// The bottom edge is only trimmed while more than this many sections are mounted.
    pub min_sections_for_bottom_evict: usize,
    /// Tolerance (px) when comparing a fragment's top with the viewport's.
    pub focus_epsilon: f64,
}
impl Default for ScrollerConfig {
    fn default() -> Self {
        Self {
            sample_interval_ms: 100,
            nav_broadcast_delay_ms: 1000,
            prefetch_viewports: 2.0,
            evict_viewports: 15.0,
            max_sections: 50,
            min_sections_for_bottom_evict: 4,
            focus_epsilon: 2.0,
        }
    }
}
impl ScrollerConfig {
    pub fn sample_interval(&self) -> Duration {
        Duration::from_millis(self.sample_interval_ms)
    }

    pub fn nav_broadcast_delay(&self) -> Duration {
        Duration::from_millis(self.nav_broadcast_delay_ms)
    }

    pub fn validate(&self) -> Result<()> {
        if self.sample_interval_ms == 0 {
            exn::bail!(ErrorKind::Invalid("scroller.sample_interval_ms"));
        }
        if !(self.prefetch_viewports.is_finite() && self.prefetch_viewports > 0.0) {
            exn::bail!(ErrorKind::Invalid("scroller.prefetch_viewports"));
        }
        // Anything evicted must be well outside the prefetch zone, otherwise
        // the scroller would load and drop the same section forever.
        if !(self.evict_viewports.is_finite() && self.evict_viewports > self.prefetch_viewports) {
            exn::bail!(ErrorKind::Invalid("scroller.evict_viewports"));
        }
        if self.max_sections < 2 {
            exn::bail!(ErrorKind::Invalid("scroller.max_sections"));
        }
        if self.min_sections_for_bottom_evict == 0 || self.min_sections_for_bottom_evict > self.max_sections {
            exn::bail!(ErrorKind::Invalid("scroller.min_sections_for_bottom_evict"));
        }
        if !(self.focus_epsilon.is_finite() && self.focus_epsilon >= 0.0) {
            exn::bail!(ErrorKind::Invalid("scroller.focus_epsilon"));
        }
        Ok(())
    }
}

impl Config {
    /// Location of the config file when none is given explicitly.
    pub fn default_path() -> Option<PathBuf> {
        ProjectDirs::from("", "", "lectern").map(|dirs| dirs.config_dir().join(CONFIG_FILE))
    }

    /// All configuration sources, merged but not yet extracted.
    pub fn figment(file: Option<&Path>) -> Figment {
        let mut figment = Figment::from(Serialized::defaults(Config::default()));
        if let Some(path) = file.map(Path::to_path_buf).or_else(Self::default_path) {
            tracing::debug!(path = %path.display(), "Reading configuration file");
            figment = match path.extension().and_then(|ext| ext.to_str()) {
                Some("yaml" | "yml") => figment.merge(Yaml::file(path)),
                Some("json") => figment.merge(Json::file(path)),
                _ => figment.merge(Toml::file(path)),
            };
        }
        figment.merge(Env::prefixed(ENV_PREFIX).split("__"))
    }

    /// Load and validate the configuration.
    pub fn load(file: Option<&Path>) -> Result<Self> {
        Self::from_figment(Self::figment(file))
    }

    pub fn from_figment(figment: Figment) -> Result<Self> {
        let config: Config = figment.extract().or_raise(|| ErrorKind::Load)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.default_provider.is_empty() {
            exn::bail!(ErrorKind::Invalid("default_provider"));
        }
        if let Some(local) = &self.local
            && local.name.is_empty()
        {
            exn::bail!(ErrorKind::Invalid("local.name"));
        }
        self.scroller.validate()
    }
}
