//! Run configuration. Loaded from `plant.ron` in the current directory, or
//! from the path given on the command line.

use anyhow::{Context, Result};
use procgen::{ColonizationConfig, LSystemConfig, VisualConfig};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Which generator builds the branch topology.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Generator {
    SpaceColonization(ColonizationConfig),
    LSystem(LSystemConfig),
}

impl Default for Generator {
    fn default() -> Self {
        Generator::SpaceColonization(ColonizationConfig::default())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlantConfig {
    #[serde(default)]
    pub generator: Generator,
    #[serde(default)]
    pub visual: VisualConfig,
    /// Fixed animation ticks per second.
    #[serde(default = "default_tick_rate")]
    pub tick_rate_hz: f64,
    /// Seconds of senescence to animate after everything has grown.
    #[serde(default = "default_linger")]
    pub linger_seconds: f32,
    /// Hard stop for the growth phase, in simulated seconds.
    #[serde(default = "default_max_seconds")]
    pub max_seconds: f32,
    /// Pace ticks against the wall clock instead of running flat out.
    #[serde(default)]
    pub realtime: bool,
}

fn default_tick_rate() -> f64 {
    60.0
}
fn default_linger() -> f32 {
    2.0
}
fn default_max_seconds() -> f32 {
    600.0
}

impl Default for PlantConfig {
    fn default() -> Self {
        Self {
            generator: Generator::default(),
            visual: VisualConfig::default(),
            tick_rate_hz: default_tick_rate(),
            linger_seconds: default_linger(),
            max_seconds: default_max_seconds(),
            realtime: false,
        }
    }
}

impl PlantConfig {
    /// Load config from `path`. A missing file gives the defaults; a file
    /// that exists but does not parse is an error.
    pub fn load(path: &Path) -> Result<Self> {
        let data = match std::fs::read_to_string(path) {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                log::warn!("No config at {:?}, using defaults", path);
                return Ok(Self::default());
            }
            Err(e) => return Err(e).with_context(|| format!("reading {:?}", path)),
        };
        Self::parse(&data).with_context(|| format!("invalid config at {:?}", path))
    }

    /// Parse a RON document.
    pub fn parse(data: &str) -> Result<Self> {
        Ok(ron::from_str(data)?)
    }

    /// Write this config as pretty RON.
    pub fn save(&self, path: &Path) -> Result<()> {
        let s = ron::ser::to_string_pretty(self, ron::ser::PrettyConfig::default())?;
        std::fs::write(path, s).with_context(|| format!("writing {:?}", path))?;
        Ok(())
    }
}

/// `plant.ron` in the current directory.
pub fn default_path() -> PathBuf {
    std::env::current_dir()
        .unwrap_or_else(|_| PathBuf::from("."))
        .join("plant.ron")
}

#[cfg(test)]
mod tests {
    use super::*;
    use procgen::RenderMode;

    #[test]
    fn partial_file_fills_defaults() {
        let config = PlantConfig::parse(
            "(generator: LSystem((iterations: 2, angle_degrees: 25.0)), visual: (render_mode: Ribbon), tick_rate_hz: 30.0)",
        )
        .unwrap();
        match &config.generator {
            Generator::LSystem(l) => {
                assert_eq!(l.iterations, 2);
                assert_eq!(l.angle_degrees, 25.0);
                assert_eq!(l.axiom, LSystemConfig::default().axiom);
            }
            other => panic!("unexpected generator {:?}", other),
        }
        assert_eq!(config.visual.render_mode, RenderMode::Ribbon);
        assert_eq!(config.visual.tube_sides, 10);
        assert_eq!(config.tick_rate_hz, 30.0);
        assert_eq!(config.linger_seconds, 2.0);
    }

    #[test]
    fn empty_struct_is_all_defaults() {
        let config = PlantConfig::parse("()").unwrap();
        assert!(matches!(config.generator, Generator::SpaceColonization(_)));
        assert_eq!(config.max_seconds, 600.0);
    }

    #[test]
    fn garbage_is_an_error() {
        assert!(PlantConfig::parse("(generator: Oak)").is_err());
    }

    #[test]
    fn missing_file_gives_defaults() {
        let path = std::env::temp_dir().join("plantgen-definitely-missing.ron");
        let config = PlantConfig::load(&path).unwrap();
        assert_eq!(config.tick_rate_hz, 60.0);
    }

    #[test]
    fn saved_config_loads_back() {
        let path = std::env::temp_dir().join(format!("plantgen-save-{}.ron", std::process::id()));
        let mut config = PlantConfig::default();
        config.linger_seconds = 5.0;
        config.save(&path).unwrap();
        let loaded = PlantConfig::load(&path).unwrap();
        let _ = std::fs::remove_file(&path);
        assert_eq!(loaded.linger_seconds, 5.0);
    }
}
