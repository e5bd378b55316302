//! Runtime configuration.
//!
//! Loaded from `XLSNAP_*` environment variables or JSON. Every field has a
//! default, so partial JSON documents and sparse environments are fine.

use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Result, XlsnapError};
use crate::layout::LayoutConfig;
use crate::render::AccentColor;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub cache: CacheConfig,
    pub render: RenderConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub enabled: bool,
    pub dir: PathBuf,
    pub ttl_secs: u64,
    pub cleanup_interval_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            dir: std::env::temp_dir().join("xlsnap-cache"),
            ttl_secs: 86_400,
            cleanup_interval_secs: 3_600,
        }
    }
}

impl CacheConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }

    pub fn cleanup_interval(&self) -> Duration {
        Duration::from_secs(self.cleanup_interval_secs)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderConfig {
    #[serde(flatten)]
    pub layout: LayoutConfig,
    /// TrueType/OpenType font file; the bundled face is used when unset
    pub font_path: Option<PathBuf>,
    pub footer_text: String,
    pub first_row_is_header: bool,
    pub accent_color: AccentColor,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            layout: LayoutConfig::default(),
            font_path: None,
            footer_text: String::new(),
            first_row_is_header: true,
            accent_color: AccentColor::default(),
        }
    }
}

impl Config {
    /// Load from `XLSNAP_*` environment variables.
    ///
    /// Unparseable values fall back to their defaults with a warning.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load from any variable source (the environment, a map in tests).
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let defaults = Self::default();
        let get = |name: &str| lookup(name).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let parse = |name: &str, fallback| parse_or(name, get(name), fallback);

        let cache = CacheConfig {
            enabled: get("XLSNAP_CACHE_ENABLED")
                .map_or(defaults.cache.enabled, |v| parse_bool("XLSNAP_CACHE_ENABLED", &v, defaults.cache.enabled)),
            dir: get("XLSNAP_CACHE_DIR").map_or(defaults.cache.dir, PathBuf::from),
            ttl_secs: parse_or("XLSNAP_CACHE_TTL_SECS", get("XLSNAP_CACHE_TTL_SECS"), defaults.cache.ttl_secs),
            cleanup_interval_secs: parse_or(
                "XLSNAP_CLEANUP_INTERVAL_SECS",
                get("XLSNAP_CLEANUP_INTERVAL_SECS"),
                defaults.cache.cleanup_interval_secs,
            ),
        };

        let base = defaults.render.layout;
        let layout = LayoutConfig {
            column_width: parse("XLSNAP_COLUMN_WIDTH", base.column_width),
            min_column_width: parse("XLSNAP_MIN_COLUMN_WIDTH", base.min_column_width),
            max_column_width: parse("XLSNAP_MAX_COLUMN_WIDTH", base.max_column_width),
            row_height: parse("XLSNAP_ROW_HEIGHT", base.row_height),
            max_image_width: parse("XLSNAP_MAX_IMAGE_WIDTH", base.max_image_width),
            max_image_height: parse("XLSNAP_MAX_IMAGE_HEIGHT", base.max_image_height),
            ..base
        };
        let render = RenderConfig {
            layout,
            font_path: get("XLSNAP_FONT_PATH").map(PathBuf::from),
            footer_text: get("XLSNAP_FOOTER_TEXT").unwrap_or_default(),
            ..defaults.render
        };

        let config = Self { cache, render };
        config.validate()?;
        Ok(config)
    }

    /// Load from a JSON document; missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)
            .map_err(|e| XlsnapError::InvalidConfig(format!("invalid JSON: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Load a JSON file.
    pub fn from_json_file(path: &Path) -> Result<Self> {
        Self::from_json(&std::fs::read_to_string(path)?)
    }

    pub fn validate(&self) -> Result<()> {
        self.render.layout.validate()?;
        if self.render.accent_color.rgb().is_none() {
            return Err(XlsnapError::InvalidConfig(format!(
                "accent_color must be #RRGGBB, got {:?}",
                self.render.accent_color.0
            )));
        }
        if self.cache.cleanup_interval_secs == 0 {
            return Err(XlsnapError::InvalidConfig(
                "cleanup_interval_secs must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

fn parse_or<T: FromStr + Copy + std::fmt::Display>(name: &str, value: Option<String>, fallback: T) -> T {
    let Some(raw) = value else {
        return fallback;
    };
    raw.parse().unwrap_or_else(|_| {
        tracing::warn!(variable = name, value = %raw, default = %fallback, "unparseable setting, using default");
        fallback
    })
}

fn parse_bool(name: &str, raw: &str, fallback: bool) -> bool {
    match raw.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => true,
        "0" | "false" | "no" | "off" => false,
        _ => {
            tracing::warn!(variable = name, value = %raw, default = fallback, "unparseable setting, using default");
            fallback
        }
    }
}
