use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::search::context::ContextExpander;
use crate::search::filters::Limits;

/// `[search]` block from config.toml.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(default)]
pub struct SearchConfig {
    pub default_limit: i64,
    pub max_limit: i64,
}

impl Default for SearchConfig {
    fn default() -> Self {
        let limits = Limits::default();
        SearchConfig {
            default_limit: limits.default_limit,
            max_limit: limits.max_limit,
        }
    }
}

/// `[context]` block from config.toml.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(default)]
pub struct ContextConfig {
    pub default_count: u32,
    pub max_count: u32,
    /// Keep neighbor lookups on the anchor's station.
    pub same_station: bool,
}

impl Default for ContextConfig {
    fn default() -> Self {
        let limits = Limits::default();
        ContextConfig {
            default_count: limits.default_context,
            max_count: limits.max_context,
            same_station: false,
        }
    }
}

/// `[answer]` block: external question-answering command.
#[derive(Debug, Deserialize, Serialize, Default, Clone, PartialEq)]
pub struct AnswerConfig {
    pub command: Option<String>,
    #[serde(default)]
    pub args: Vec<String>,
}

/// Top-level wavesearch config file structure.
#[derive(Debug, Deserialize, Serialize, Default, Clone, PartialEq)]
#[serde(default)]
pub struct Config {
    pub search: SearchConfig,
    pub context: ContextConfig,
    pub answer: Option<AnswerConfig>,
}

impl Config {
    /// Load config from ~/.wavesearch/config.toml. Returns default if file doesn't exist.
    pub fn load() -> Result<Self> {
        Self::load_from(&config_path()?)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Config::default());
        }
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config: {}", path.display()))?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content).context("Failed to parse config.toml")?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        let s = &self.search;
        if s.max_limit < 1 || s.default_limit < 1 || s.default_limit > s.max_limit {
            bail!(
                "[search] needs 1 <= default_limit <= max_limit (got {} and {})",
                s.default_limit,
                s.max_limit
            );
        }
        let c = &self.context;
        if c.max_count < 1 || c.default_count < 1 || c.default_count > c.max_count {
            bail!(
                "[context] needs 1 <= default_count <= max_count (got {} and {})",
                c.default_count,
                c.max_count
            );
        }
        Ok(())
    }

    pub fn limits(&self) -> Limits {
        Limits {
            default_limit: self.search.default_limit,
            max_limit: self.search.max_limit,
            default_context: self.context.default_count,
            max_context: self.context.max_count,
        }
    }

    pub fn expander(&self) -> ContextExpander {
        ContextExpander::new(self.context.same_station)
    }

    /// Effective settings, one `key = value` per line.
    pub fn display(&self) -> String {
        let mut lines = vec![
            "[search]".to_string(),
            format!("  default_limit = {}", self.search.default_limit),
            format!("  max_limit = {}", self.search.max_limit),
            "[context]".to_string(),
            format!("  default_count = {}", self.context.default_count),
            format!("  max_count = {}", self.context.max_count),
            format!("  same_station = {}", self.context.same_station),
        ];
        match self.answer.as_ref().and_then(|a| a.command.as_ref()) {
            Some(cmd) => {
                lines.push("[answer]".to_string());
                lines.push(format!("  command = \"{cmd}\""));
            }
            None => lines.push("(no answer command configured)".to_string()),
        }
        lines.join("\n")
    }
}

/// Path to the config file: ~/.wavesearch/config.toml
pub fn config_path() -> Result<PathBuf> {
    let home = dirs::home_dir().context("Could not determine home directory")?;
    Ok(home.join(".wavesearch").join("config.toml"))
}

/// Default config template content.
pub fn default_config_template() -> &'static str {
    r#"# ~/.wavesearch/config.toml

[search]
# default_limit = 50
# max_limit = 100

[context]
# default_count = 5
# max_count = 20
# Only return neighbors broadcast on the anchor's station
# same_station = false

[answer]
# command = "/path/to/answer-script"
# args = ["--model", "small"]
"#
}

/// Create the default config file if it doesn't already exist.
pub fn init_config() -> Result<bool> {
    let path = config_path()?;
    if path.exists() {
        return Ok(false);
    }
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(&path, default_config_template())?;
    Ok(true)
}
