use anyhow::Result;
use clap::ArgMatches;
use config::{Config as ConfigBuilder, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Complete configuration that merges CLI args, env vars, config files, and defaults
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SiftConfig {
    /// Build configuration
    pub build: BuildConfig,
    /// Pipeline configuration (from sift-core)
    #[serde(flatten)]
    pub pipeline: sift_core::config::Config,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BuildConfig {
    /// Source directory to collect assets from
    pub source: String,
    /// Remote repository to collect from instead of `source`
    pub git: Option<String>,
    /// Branch cloned when collecting from git
    pub branch: String,
    /// Leading virtual path segment for git-collected assets
    pub git_prefix: String,
    /// Output directory for generated site
    pub output: String,
    /// Configuration file path
    pub config: String,
    /// Host for dev server
    pub host: String,
    /// Port for dev server
    pub port: u16,
    /// Open browser automatically
    pub open: bool,
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            source: "./site".to_string(),
            git: None,
            branch: "main".to_string(),
            git_prefix: String::new(),
            output: "./out".to_string(),
            config: "./sift.toml".to_string(),
            host: "127.0.0.1".to_string(),
            port: 3000,
            open: false,
        }
    }
}

impl Default for SiftConfig {
    fn default() -> Self {
        Self {
            build: BuildConfig::default(),
            pipeline: sift_core::config::Config::default(),
        }
    }
}

impl SiftConfig {
    /// Load configuration with cascading precedence:
    /// 1. CLI arguments (highest priority)
    /// 2. Environment variables (SIFT_*)
    /// 3. Configuration file
    /// 4. Defaults (lowest priority)
    pub fn load(args: &ArgMatches) -> Result<Self> {
        let config_file = args
            .get_one::<String>("config")
            .unwrap_or(&"./sift.toml".to_string())
            .clone();

        let mut builder = ConfigBuilder::builder();

        // 1. Start with defaults
        let defaults = Self::default();
        builder = builder.add_source(config::Config::try_from(&defaults)?);

        // 2. Add configuration file if it exists
        if Path::new(&config_file).exists() {
            builder = builder.add_source(File::with_name(&config_file.replace(".toml", "")));
        }

        // 3. Add environment variables with SIFT_ prefix
        builder = builder.add_source(
            Environment::with_prefix("SIFT")
                .prefix_separator("_")
                .separator("__"), // Use double underscore for nested keys
        );

        // 4. Override with CLI arguments (highest priority)
        let mut cli_overrides = std::collections::HashMap::new();

        if let Some(source) = args.get_one::<String>("source") {
            cli_overrides.insert("build.source".to_string(), source.clone());
        }
        if let Some(output) = args.get_one::<String>("output") {
            cli_overrides.insert("build.output".to_string(), output.clone());
        }
        if let Some(config) = args.get_one::<String>("config") {
            cli_overrides.insert("build.config".to_string(), config.clone());
        }
        if let Some(git) = args.try_get_one::<String>("git").unwrap_or(None) {
            cli_overrides.insert("build.git".to_string(), git.clone());
        }
        if let Some(branch) = args.try_get_one::<String>("branch").unwrap_or(None) {
            cli_overrides.insert("build.branch".to_string(), branch.clone());
        }
        if let Some(prefix) = args.try_get_one::<String>("git-prefix").unwrap_or(None) {
            cli_overrides.insert("build.git_prefix".to_string(), prefix.clone());
        }
        if let Some(base_url) = args.try_get_one::<String>("base-url").unwrap_or(None) {
            cli_overrides.insert("site.base_url".to_string(), base_url.clone());
        }
        if let Some(host) = args.try_get_one::<String>("host").unwrap_or(None) {
            cli_overrides.insert("build.host".to_string(), host.clone());
        }
        if let Some(port) = args.try_get_one::<String>("port").unwrap_or(None) {
            if let Ok(port_num) = port.parse::<u16>() {
                cli_overrides.insert("build.port".to_string(), port_num.to_string());
            }
        }
        if args
            .try_get_one::<bool>("open")
            .unwrap_or(None)
            .unwrap_or(&false)
            == &true
        {
            cli_overrides.insert("build.open".to_string(), "true".to_string());
        }
        if args
            .try_get_one::<bool>("minify")
            .unwrap_or(None)
            .unwrap_or(&false)
            == &true
        {
            cli_overrides.insert("minify.enable".to_string(), "true".to_string());
        }

        if !cli_overrides.is_empty() {
            builder = builder.add_source(config::Config::try_from(&cli_overrides)?);
        }

        // Build and deserialize
        let config = builder.build()?;
        let sift_config: SiftConfig = config.try_deserialize()?;

        Ok(sift_config)
    }
}

/// The encryption password comes from a flag or the environment, never
/// from the config file cascade.
pub fn password_from(args: &ArgMatches) -> Option<String> {
    if let Some(password) = args.try_get_one::<String>("password").unwrap_or(None) {
        return Some(password.clone());
    }
    std::env::var("SIFT_PASSWORD").ok().filter(|p| !p.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::{Arg, Command};

    #[test]
    fn test_default_config() {
        let config = SiftConfig::default();
        assert_eq!(config.build.source, "./site");
        assert_eq!(config.build.output, "./out");
        assert_eq!(config.build.branch, "main");
        assert_eq!(config.build.port, 3000);
        assert!(config.pipeline.sitemap.enable);
    }

    #[test]
    fn test_cli_args_override() {
        let app = Command::new("test")
            .arg(Arg::new("source").long("source").value_name("DIR"))
            .arg(Arg::new("output").long("output").value_name("DIR"))
            .arg(Arg::new("config").long("config").value_name("FILE"));

        let matches = app
            .try_get_matches_from(vec![
                "test",
                "--source",
                "/custom/source",
                "--output",
                "/custom/output",
            ])
            .unwrap();

        let config = SiftConfig::load(&matches).unwrap();
        assert_eq!(config.build.source, "/custom/source");
        assert_eq!(config.build.output, "/custom/output");
        // Should still have defaults for non-overridden values
        assert_eq!(config.build.branch, "main");
    }
}
