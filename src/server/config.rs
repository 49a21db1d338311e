use chrono_tz::Tz;
use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
pub struct ServerConfig {
    /// Address to bind
    #[arg(long, default_value = "0.0.0.0")]
    pub host: String,

    /// The listening port
    #[arg(short, long, default_value_t = 1080)]
    pub port: u16,

    /// Number of request worker threads
    #[arg(short, long, default_value_t = 16)]
    pub threads: usize,

    /// The 'context' path on which files are served, e.g. 'doc' will serve the files at 'http://localhost:<port>/doc/'
    #[arg(long, default_value = "")]
    pub context: String,

    /// The path for the static files
    #[arg(long, default_value = "/srv/http")]
    pub path: PathBuf,

    /// Default fallback file. Either absolute for a specific asset (/index.html), or relative to recursively resolve (index.html). Empty disables fallback
    #[arg(long, default_value = "/index.html")]
    pub fallback: String,

    /// HTTP response header, specified as `HeaderName:Value`, added to all responses
    #[arg(long)]
    pub append_header: Option<String>,

    /// Enable basic auth. Passwords are randomly generated unless --set-basic-auth is given
    #[arg(long)]
    pub enable_basic_auth: bool,

    /// Define the basic auth credential, as user:password
    #[arg(long)]
    pub set_basic_auth: Option<String>,

    /// Username paired with a generated password
    #[arg(long, default_value = "gopher")]
    pub default_user_basic_auth: String,

    /// Length of the generated password
    #[arg(long, default_value_t = 16, value_parser = clap::value_parser!(u16).range(1..))]
    pub password_length: u16,

    /// Log every request
    #[arg(long)]
    pub enable_logging: bool,

    /// Redirect requests that reached the proxy over plain HTTP (X-Forwarded-Proto: http) to HTTPS
    #[arg(long)]
    pub https_promote: bool,

    /// Path to the JSON config file for custom response headers
    #[arg(long, default_value = "/config/headerConfig.json")]
    pub header_config_path: PathBuf,

    /// Enable the /health endpoint, answering 200 "Ok"
    #[arg(long)]
    pub enable_health: bool,

    /// Time zone used for log timestamps
    #[arg(long, default_value = "UTC")]
    pub log_timezone: Tz,

    /// Also append plain log lines to this file
    #[arg(long)]
    pub log_file: Option<PathBuf>,

    /// Pairs of `key value` to rewrite inside the fallback document
    #[arg(value_name = "SUBSTITUTIONS", trailing_var_arg = true)]
    pub substitutions: Vec<String>,
}

impl ServerConfig {
    /// Giving a credential implies enabling auth.
    pub fn basic_auth_enabled(&self) -> bool {
        self.enable_basic_auth || self.set_basic_auth.as_deref().is_some_and(|s| !s.is_empty())
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 1080,
            threads: 16,
            context: String::new(),
            path: PathBuf::from("/srv/http"),
            fallback: "/index.html".to_string(),
            append_header: None,
            enable_basic_auth: false,
            set_basic_auth: None,
            default_user_basic_auth: "gopher".to_string(),
            password_length: 16,
            enable_logging: false,
            https_promote: false,
            header_config_path: PathBuf::from("/config/headerConfig.json"),
            enable_health: false,
            log_timezone: Tz::UTC,
            log_file: None,
            substitutions: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_the_cli() {
        let parsed = ServerConfig::parse_from(["spa-static-server"]);
        let default = ServerConfig::default();
        assert_eq!(parsed.port, default.port);
        assert_eq!(parsed.path, default.path);
        assert_eq!(parsed.fallback, default.fallback);
        assert_eq!(parsed.header_config_path, default.header_config_path);
        assert_eq!(parsed.password_length, default.password_length);
        assert_eq!(parsed.log_timezone, default.log_timezone);
    }

    #[test]
    fn parses_flags_and_trailing_substitutions() {
        let config = ServerConfig::parse_from([
            "spa-static-server",
            "--port",
            "8080",
            "--context",
            "doc",
            "--fallback",
            "index.html",
            "--set-basic-auth",
            "a:b",
            "--log-timezone",
            "Europe/Paris",
            "api",
            "https://example.com",
        ]);
        assert_eq!(config.port, 8080);
        assert_eq!(config.context, "doc");
        assert_eq!(config.fallback, "index.html");
        assert!(config.basic_auth_enabled());
        assert_eq!(config.log_timezone, Tz::Europe__Paris);
        assert_eq!(config.substitutions, vec!["api", "https://example.com"]);
    }

    #[test]
    fn empty_fallback_is_accepted() {
        let config = ServerConfig::parse_from(["spa-static-server", "--fallback", ""]);
        assert!(config.fallback.is_empty());
        assert!(!config.basic_auth_enabled());
    }

    #[test]
    fn zero_password_length_is_rejected() {
        assert!(ServerConfig::try_parse_from(["spa-static-server", "--password-length", "0"]).is_err());
    }
}
