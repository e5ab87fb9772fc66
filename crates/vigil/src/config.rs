//! CLI configuration: thin wrapper around `vigil_config` that applies
//! `GlobalOpts` overrides (--gateway, --node, --token, ...).

use secrecy::SecretString;

use vigil_config::{Config, Profile};
use vigil_core::SessionConfig;

use crate::cli::GlobalOpts;
use crate::error::CliError;

pub use vigil_config::{config_path, load_config};

/// Build a `SessionConfig` from the config file, profile, and CLI flags.
///
/// Flags win over the profile. With no matching profile, `--gateway`
/// alone is enough to build an anonymous session.
pub fn build_session_config(global: &GlobalOpts, cfg: &Config) -> Result<SessionConfig, CliError> {
    let name = cfg.profile_name(global.profile.as_deref());
    let mut profile = select_profile(global, cfg, &name)?;

    if let Some(ref gateway) = global.gateway {
        profile.gateway.clone_from(gateway);
    }
    if let Some(ref node) = global.node {
        profile.node = Some(node.clone());
    }
    if global.insecure {
        profile.insecure = Some(true);
    }
    if let Some(timeout) = global.timeout {
        profile.timeout = Some(timeout);
    }

    let mut session = vigil_config::profile_to_session_config(&profile, &name, &cfg.defaults)?;
    if let Some(ref token) = global.token {
        session = session.with_token(SecretString::from(token.clone()));
    }
    Ok(session)
}

fn select_profile(global: &GlobalOpts, cfg: &Config, name: &str) -> Result<Profile, CliError> {
    if let Some(profile) = cfg.profiles.get(name) {
        return Ok(profile.clone());
    }
    if global.gateway.is_some() {
        return Ok(Profile::default());
    }
    if global.profile.is_some() {
        let mut available: Vec<_> = cfg.profiles.keys().cloned().collect();
        available.sort();
        return Err(CliError::ProfileNotFound {
            name: name.into(),
            available: if available.is_empty() {
                "(none)".into()
            } else {
                available.join(", ")
            },
        });
    }
    Err(CliError::NoConfig {
        path: config_path().display().to_string(),
    })
}
