//! Daemon configuration.
//!
//! Each setting is a flag with an environment variable fallback, so the
//! server can be configured either way in a container.

use std::time::Duration;

use clap::builder::NonEmptyStringValueParser;
use clap::{Parser, ValueEnum};

use tfstate_gitea::GiteaConfig;

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    Text,
    Json,
}

#[derive(Debug, Clone, Parser)]
#[command(
    name = "tfstated",
    version,
    about = "Terraform/OpenTofu HTTP state backend stored in a Gitea repository"
)]
pub struct Config {
    /// Gitea server URL, e.g. https://gitea.example.com
    #[arg(long, env = "GITEA_URL", value_parser = NonEmptyStringValueParser::new())]
    pub gitea_url: String,

    /// Gitea access token with write access to the state repository.
    #[arg(long, env = "GITEA_TOKEN", hide_env_values = true, value_parser = NonEmptyStringValueParser::new())]
    pub gitea_token: String,

    /// Owner (user or organization) of the state repository.
    #[arg(long, env = "GITEA_OWNER", value_parser = NonEmptyStringValueParser::new())]
    pub gitea_owner: String,

    /// Name of the state repository.
    #[arg(long, env = "GITEA_REPO", value_parser = NonEmptyStringValueParser::new())]
    pub gitea_repo: String,

    /// Branch state commits are made on.
    #[arg(long, env = "GITEA_BRANCH", default_value = "main")]
    pub gitea_branch: String,

    /// Address to listen on. `:PORT` listens on all interfaces.
    #[arg(long, env = "LISTEN_ADDR", default_value = ":8080")]
    pub listen_addr: String,

    /// Token clients must present. Authentication is disabled when unset.
    #[arg(long, env = "AUTH_TOKEN", hide_env_values = true)]
    pub auth_token: Option<String>,

    /// Maximum request body size in megabytes.
    #[arg(
        long,
        env = "MAX_BODY_SIZE_MB",
        default_value_t = 50,
        value_parser = clap::value_parser!(u64).range(1..)
    )]
    pub max_body_size_mb: u64,

    /// Timeout for each Gitea API call, in seconds.
    #[arg(
        long,
        env = "GITEA_TIMEOUT_SECS",
        default_value_t = 30,
        value_parser = clap::value_parser!(u64).range(1..)
    )]
    pub gitea_timeout_secs: u64,

    /// Log output format.
    #[arg(long, env = "LOG_FORMAT", value_enum, default_value_t = LogFormat::Text)]
    pub log_format: LogFormat,
}

impl Config {
    /// Token to require, if authentication is enabled.
    pub fn auth_token(&self) -> Option<&str> {
        self.auth_token.as_deref().filter(|t| !t.is_empty())
    }

    /// Body limit in bytes.
    pub fn max_body_bytes(&self) -> usize {
        let bytes = self.max_body_size_mb.saturating_mul(1 << 20);
        usize::try_from(bytes).unwrap_or(usize::MAX)
    }

    /// Listen address in a form `TcpListener::bind` accepts.
    pub fn bind_addr(&self) -> String {
        if self.listen_addr.starts_with(':') {
            format!("0.0.0.0{}", self.listen_addr)
        } else {
            self.listen_addr.clone()
        }
    }

    pub fn gitea_config(&self) -> GiteaConfig {
        GiteaConfig {
            base_url: self.gitea_url.clone(),
            token: self.gitea_token.clone(),
            owner: self.gitea_owner.clone(),
            repo: self.gitea_repo.clone(),
            branch: self.gitea_branch.clone(),
            timeout: Duration::from_secs(self.gitea_timeout_secs),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const REQUIRED: [&str; 9] = [
        "tfstated",
        "--gitea-url",
        "https://gitea.example.com",
        "--gitea-token",
        "test-token",
        "--gitea-owner",
        "testowner",
        "--gitea-repo",
        "testrepo",
    ];

    fn parse(extra: &[&str]) -> Result<Config, clap::Error> {
        Config::try_parse_from(REQUIRED.iter().chain(extra))
    }

    fn parse_without(flag: &str) -> Result<Config, clap::Error> {
        let mut args: Vec<&str> = Vec::new();
        let mut skip = false;
        for arg in REQUIRED {
            if skip {
                skip = false;
                continue;
            }
            if arg == flag {
                skip = true;
                continue;
            }
            args.push(arg);
        }
        Config::try_parse_from(args)
    }

    #[test]
    fn load_success() {
        let config = parse(&[
            "--gitea-branch",
            "develop",
            "--listen-addr",
            ":9090",
            "--auth-token",
            "secret",
        ])
        .unwrap();

        assert_eq!(config.gitea_url, "https://gitea.example.com");
        assert_eq!(config.gitea_token, "test-token");
        assert_eq!(config.gitea_owner, "testowner");
        assert_eq!(config.gitea_repo, "testrepo");
        assert_eq!(config.gitea_branch, "develop");
        assert_eq!(config.listen_addr, ":9090");
        assert_eq!(config.auth_token(), Some("secret"));
    }

    #[test]
    fn defaults() {
        let config = parse(&[]).unwrap();
        assert_eq!(config.gitea_branch, "main");
        assert_eq!(config.listen_addr, ":8080");
        assert_eq!(config.max_body_size_mb, 50);
        assert_eq!(config.max_body_bytes(), 50 << 20);
        assert_eq!(config.gitea_timeout_secs, 30);
        assert_eq!(config.log_format, LogFormat::Text);
    }

    #[test]
    fn auth_disabled_when_unset_or_empty() {
        assert!(parse(&[]).unwrap().auth_token().is_none());
        assert!(parse(&["--auth-token", ""]).unwrap().auth_token().is_none());
    }

    #[test]
    fn missing_required_fields() {
        for flag in ["--gitea-url", "--gitea-token", "--gitea-owner", "--gitea-repo"] {
            assert!(parse_without(flag).is_err(), "{flag} should be required");
        }
    }

    #[test]
    fn empty_required_field_is_rejected() {
        let args = [
            "tfstated",
            "--gitea-url",
            "",
            "--gitea-token",
            "t",
            "--gitea-owner",
            "o",
            "--gitea-repo",
            "r",
        ];
        assert!(Config::try_parse_from(args).is_err());
    }

    #[test]
    fn max_body_size_must_be_positive_integer() {
        assert_eq!(parse(&["--max-body-size-mb", "10"]).unwrap().max_body_bytes(), 10 << 20);
        assert!(parse(&["--max-body-size-mb", "0"]).is_err());
        assert!(parse(&["--max-body-size-mb", "-5"]).is_err());
        assert!(parse(&["--max-body-size-mb", "abc"]).is_err());
    }

    #[test]
    fn bind_addr_normalizes_port_only() {
        assert_eq!(parse(&[]).unwrap().bind_addr(), "0.0.0.0:8080");
        let config = parse(&["--listen-addr", "127.0.0.1:9000"]).unwrap();
        assert_eq!(config.bind_addr(), "127.0.0.1:9000");
    }

    #[test]
    fn json_log_format() {
        let config = parse(&["--log-format", "json"]).unwrap();
        assert_eq!(config.log_format, LogFormat::Json);
    }

    #[test]
    fn gitea_config_carries_settings() {
        let gitea = parse(&["--gitea-timeout-secs", "5"]).unwrap().gitea_config();
        assert_eq!(gitea.base_url, "https://gitea.example.com");
        assert_eq!(gitea.owner, "testowner");
        assert_eq!(gitea.repo, "testrepo");
        assert_eq!(gitea.branch, "main");
        assert_eq!(gitea.timeout, Duration::from_secs(5));
    }
}
