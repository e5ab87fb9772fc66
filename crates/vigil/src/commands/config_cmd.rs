//! Config subcommand handlers.

use vigil_config::Config;

use crate::cli::{ConfigArgs, ConfigCommand, GlobalOpts};
use crate::config;
use crate::error::CliError;
use crate::output;

pub fn handle(args: &ConfigArgs, global: &GlobalOpts) -> Result<(), CliError> {
    match args.command {
        ConfigCommand::Path => {
            output::print_output(&config::config_path().display().to_string(), global.quiet);
            Ok(())
        }

        ConfigCommand::Show => {
            let cfg = redacted(config::load_config()?);
            output::print_output(&vigil_config::render_config(&cfg)?, global.quiet);
            Ok(())
        }
    }
}

/// Mask plaintext tokens before display.
fn redacted(mut cfg: Config) -> Config {
    for profile in cfg.profiles.values_mut() {
        if profile.token.is_some() {
            profile.token = Some("****".into());
        }
    }
    cfg
}

#[cfg(test)]
mod tests {
    use vigil_config::Profile;

    use super::*;

    #[test]
    fn tokens_are_masked() {
        let mut cfg = Config::default();
        cfg.profiles.insert(
            "lab".into(),
            Profile {
                gateway: "https://gw.example.net".into(),
                token: Some("secret".into()),
                token_env: Some("LAB_TOKEN".into()),
                ..Profile::default()
            },
        );
        let shown = redacted(cfg);
        let lab = &shown.profiles["lab"];
        assert_eq!(lab.token.as_deref(), Some("****"));
        assert_eq!(lab.token_env.as_deref(), Some("LAB_TOKEN"));
    }
}
