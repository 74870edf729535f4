//! Config subcommand handlers.

use crate::cli::{ConfigArgs, ConfigCommand, GlobalOpts};
use crate::config::{self, Config, KEYRING_SERVICE};
use crate::error::CliError;
use crate::output;

const REDACTED: &str = "********";

/// Copy of `cfg` with plaintext keys masked.
fn redacted(cfg: &Config) -> Config {
    let mut cfg = cfg.clone();
    for profile in cfg.profiles.values_mut() {
        if profile.api_key.is_some() {
            profile.api_key = Some(REDACTED.into());
        }
    }
    cfg
}

pub fn handle(args: ConfigArgs, global: &GlobalOpts) -> Result<(), CliError> {
    match args.command {
        // ── Path ────────────────────────────────────────────────────
        ConfigCommand::Path => {
            output::print_output(&config::config_path().display().to_string(), global.quiet);
            Ok(())
        }

        // ── Show ────────────────────────────────────────────────────
        ConfigCommand::Show => {
            let cfg = redacted(&config::load_config_or_default());
            let out = output::render_single(
                global.output,
                &cfg,
                |c| toml::to_string_pretty(c).unwrap_or_else(|e| format!("{c:#?}\n# {e}")),
                |c| c.profiles.keys().cloned().collect::<Vec<_>>().join("\n"),
            )?;
            output::print_output(&out, global.quiet);
            Ok(())
        }

        // ── Init ────────────────────────────────────────────────────
        ConfigCommand::Init {
            url,
            api_key_env,
            user_id,
        } => {
            deskflow_config::parse_url(&url)?;
            let mut cfg = config::load_config_or_default();
            let profile_name = config::active_profile_name(global, &cfg);

            let profile = cfg.profiles.entry(profile_name.clone()).or_default();
            profile.url = Some(url);
            if api_key_env.is_some() {
                profile.api_key_env = api_key_env;
            }
            if user_id.is_some() {
                profile.user_id = user_id;
            }
            if cfg.default_profile.is_none() {
                cfg.default_profile = Some(profile_name.clone());
            }

            config::save_config(&cfg)?;
            if !global.quiet {
                eprintln!(
                    "Profile '{profile_name}' written to {}",
                    config::config_path().display()
                );
                eprintln!("Store its API key with: deskflow config set-key <KEY>");
            }
            Ok(())
        }

        // ── SetKey ──────────────────────────────────────────────────
        ConfigCommand::SetKey { key } => {
            if key.trim().is_empty() {
                return Err(CliError::Validation {
                    field: "key".into(),
                    reason: "API key cannot be empty".into(),
                });
            }
            let cfg = config::load_config_or_default();
            let profile_name = config::active_profile_name(global, &cfg);

            let entry = keyring::Entry::new(KEYRING_SERVICE, &format!("{profile_name}/api-key"))
                .map_err(|e| CliError::Validation {
                    field: "keyring".into(),
                    reason: format!("failed to access keyring: {e}"),
                })?;
            entry.set_password(&key).map_err(|e| CliError::Validation {
                field: "keyring".into(),
                reason: format!("failed to store API key in keyring: {e}"),
            })?;
            if !global.quiet {
                eprintln!("API key for '{profile_name}' stored in system keyring");
            }
            Ok(())
        }

        // ── Profiles ────────────────────────────────────────────────
        ConfigCommand::Profiles => {
            let cfg = config::load_config_or_default();
            let default = cfg.default_profile.as_deref().unwrap_or("default");
            if cfg.profiles.is_empty() {
                eprintln!("No profiles configured. Run: deskflow config init --url <URL>");
                return Ok(());
            }
            let mut names: Vec<_> = cfg.profiles.keys().collect();
            names.sort();
            let listing = names
                .into_iter()
                .map(|name| {
                    if name == default {
                        format!("{name} *")
                    } else {
                        name.clone()
                    }
                })
                .collect::<Vec<_>>()
                .join("\n");
            output::print_output(&listing, global.quiet);
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Profile;

    #[test]
    fn show_masks_plaintext_keys() {
        let mut cfg = Config::default();
        cfg.profiles.insert(
            "office".into(),
            Profile {
                api_key: Some("secret".into()),
                ..Profile::default()
            },
        );
        cfg.profiles.insert("lab".into(), Profile::default());

        let masked = redacted(&cfg);
        assert_eq!(masked.profiles["office"].api_key.as_deref(), Some(REDACTED));
        assert!(masked.profiles["lab"].api_key.is_none());
    }
}
