use miette::{IntoDiagnostic, Result, WrapErr};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Configuration for a CppDead analysis run
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Compilation database path, relative to the project root
    pub compile_commands: Option<PathBuf>,

    /// Compiler binary used to produce AST dumps
    pub ast_dumper: String,

    /// Project-relative subpaths holding third-party code; declarations
    /// there are never reported
    pub exclude: Vec<PathBuf>,

    /// Report configuration
    pub report: ReportConfig,

    /// Cache configuration
    pub cache: CacheConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReportConfig {
    /// Output format: terminal, json, lines
    pub format: String,

    /// Include used declarations in json output
    pub include_used: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Reuse per-translation-unit results across runs
    pub enabled: bool,

    /// Cache directory; defaults to `.cppdead-cache` under the project root
    pub dir: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            compile_commands: None,
            ast_dumper: "clang".to_string(),
            exclude: vec![],
            report: ReportConfig::default(),
            cache: CacheConfig::default(),
        }
    }
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            format: "terminal".to_string(),
            include_used: false,
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            dir: None,
        }
    }
}

impl Config {
    /// Load configuration from a file (YAML or TOML)
    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .into_diagnostic()
            .wrap_err_with(|| format!("Failed to read config file: {}", path.display()))?;

        let extension = path.extension().and_then(|e| e.to_str()).unwrap_or("");

        match extension {
            "yml" | "yaml" => serde_yaml::from_str(&contents)
                .into_diagnostic()
                .wrap_err("Failed to parse YAML config"),
            "toml" => toml::from_str(&contents)
                .into_diagnostic()
                .wrap_err("Failed to parse TOML config"),
            _ => {
                // Try YAML first, then TOML
                if let Ok(config) = serde_yaml::from_str(&contents) {
                    Ok(config)
                } else {
                    toml::from_str(&contents)
                        .into_diagnostic()
                        .wrap_err("Failed to parse config file")
                }
            }
        }
    }

    /// Try to load configuration from default locations
    pub fn from_default_locations(project_root: &Path) -> Result<Self> {
        let default_names = [
            ".cppdead.yml",
            ".cppdead.yaml",
            ".cppdead.toml",
            "cppdead.yml",
            "cppdead.yaml",
            "cppdead.toml",
        ];

        for name in &default_names {
            let path = project_root.join(name);
            if path.exists() {
                return Self::from_file(&path);
            }
        }

        // No config file found, use defaults
        Ok(Self::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.ast_dumper, "clang");
        assert!(config.cache.enabled);
        assert!(config.exclude.is_empty());
    }

    #[test]
    fn test_parse_yaml() {
        let config: Config = serde_yaml::from_str(
            "ast_dumper: clang-17\nexclude:\n  - third_party/lib\ncache:\n  enabled: false\n",
        )
        .unwrap();
        assert_eq!(config.ast_dumper, "clang-17");
        assert_eq!(config.exclude, vec![PathBuf::from("third_party/lib")]);
        assert!(!config.cache.enabled);
    }

    #[test]
    fn test_parse_toml() {
        let config: Config = toml::from_str(
            "ast_dumper = \"clang\"\nexclude = [\"vendor\"]\n\n[report]\nformat = \"json\"\n",
        )
        .unwrap();
        assert_eq!(config.report.format, "json");
        assert_eq!(config.exclude, vec![PathBuf::from("vendor")]);
    }
}
