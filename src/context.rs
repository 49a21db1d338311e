use log::{info, warn};
use std::sync::Arc;

use crate::credentials::Credential;
use crate::error::StartupError;
use crate::fallback::{FallbackFileSystem, FallbackRule, RequestPath};
use crate::header_config::{ExtraHeader, HeaderConfig};
use crate::server::config::ServerConfig;
use crate::template::{TemplateRewriter, parse_substitutions};

/// The rewritten fallback document, served from memory.
#[derive(Debug, Clone)]
pub struct Shell {
    pub path: RequestPath,
    pub bytes: Arc<[u8]>,
    pub content_type: String,
}

/// Everything the request pipeline reads, built once at startup and never
/// mutated afterwards, so request workers share it without locking.
#[derive(Debug)]
pub struct AppContext {
    pub files: FallbackFileSystem,
    pub shell: Option<Shell>,
    pub credential: Option<Credential>,
    pub header_config: Option<HeaderConfig>,
    pub extra_header: Option<ExtraHeader>,
    /// `""` when serving from the root, otherwise `/prefix` without a trailing slash.
    pub mount_prefix: String,
    pub https_promote: bool,
    pub log_requests: bool,
    pub health_check: bool,
}

impl AppContext {
    pub fn initialize(config: &ServerConfig) -> Result<Self, StartupError> {
        let rule = FallbackRule::parse(&config.fallback).map_err(|err| {
            StartupError::InvalidConfig(format!("fallback {:?}: {}", config.fallback, err))
        })?;

        let files = FallbackFileSystem::new(&config.path, rule.clone())
            .map_err(|err| StartupError::Io("unable to open asset directory".into(), err))?;

        let shell = match &rule {
            Some(rule) => Some(Self::prepare_shell(config, rule, &files)?),
            None => {
                if !config.substitutions.is_empty() {
                    warn!("Fallback is disabled; ignoring substitution arguments");
                }
                None
            }
        };

        let credential = if config.basic_auth_enabled() {
            info!("Enabling Basic Auth");
            Some(Credential::initialize(
                config.set_basic_auth.as_deref().filter(|s| !s.is_empty()),
                &config.default_user_basic_auth,
                usize::from(config.password_length),
            )?)
        } else {
            None
        };

        let extra_header = config.append_header.as_deref().and_then(ExtraHeader::parse);

        Ok(Self {
            files,
            shell,
            credential,
            header_config: HeaderConfig::load(&config.header_config_path),
            extra_header,
            mount_prefix: mount_prefix(&config.context),
            https_promote: config.https_promote,
            log_requests: config.enable_logging,
            health_check: config.enable_health,
        })
    }

    fn prepare_shell(
        config: &ServerConfig,
        rule: &FallbackRule,
        files: &FallbackFileSystem,
    ) -> Result<Shell, StartupError> {
        let substitutions = parse_substitutions(&config.substitutions)?;
        let path = rule.shell_path();
        let asset = files.root().join(path.as_str().trim_start_matches('/'));
        let bytes = TemplateRewriter::rewrite(&asset, &substitutions)?;
        let content_type = mime_guess::from_path(&asset)
            .first_or(mime_guess::mime::TEXT_HTML)
            .to_string();

        Ok(Shell {
            path,
            bytes: bytes.into(),
            content_type,
        })
    }
}

/// Normalizes `--context` to `""` or `/prefix`.
pub fn mount_prefix(context: &str) -> String {
    let trimmed = context.trim_matches('/');
    if trimmed.is_empty() {
        String::new()
    } else {
        format!("/{}", trimmed)
    }
}
