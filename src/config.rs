use serde::Deserialize;
use std::fs;
use std::path::Path;

use crate::error::{Error, Result};

static DEFAULT_CONFIG: &str = include_str!("default_config.toml");

/// Page and typography settings for the PDF.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub page: PageConfig,
    pub font: FontConfig,
    pub links: LinksConfig,
    pub layout: LayoutConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PageConfig {
    /// Typst paper name, e.g. "us-letter" or "a4".
    pub paper: String,
    /// Any Typst length, e.g. "0.75in" or "2cm".
    pub margin: String,
    pub numbers: bool,
}

impl Default for PageConfig {
    fn default() -> Self {
        Self {
            paper: "us-letter".to_string(),
            margin: "0.75in".to_string(),
            numbers: false,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FontConfig {
    pub family: String,
    pub size: String,
    /// Also search fonts installed on this machine. Off keeps output identical across hosts.
    pub system_fonts: bool,
}

impl Default for FontConfig {
    fn default() -> Self {
        Self {
            family: "Libertinus Serif".to_string(),
            size: "10.5pt".to_string(),
            system_fonts: false,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LinksConfig {
    pub color: String,
    pub underline: bool,
}

impl Default for LinksConfig {
    fn default() -> Self {
        Self {
            color: "#1a4f8b".to_string(),
            underline: true,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LayoutConfig {
    /// Never leave a heading alone at the bottom of a page.
    pub keep_headings_with_content: bool,
    /// Lists with at most this many items (nested ones included) are kept on one page.
    pub unbreakable_list_items: usize,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            keep_headings_with_content: true,
            unbreakable_list_items: 5,
        }
    }
}

impl Config {
    /// The configuration compiled into the binary.
    pub fn compiled_default() -> Self {
        // build.rs has already checked that this parses.
        toml::from_str(DEFAULT_CONFIG).unwrap_or_default()
    }

    /// Load config from a TOML file. Missing keys take their defaults.
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| Error::read(path, e))?;
        Ok(toml::from_str(&content)?)
    }
}
