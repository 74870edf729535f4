//! Watch command: follows a user's realtime notifications.

use std::future;
use std::sync::Arc;

use deskflow_core::{Notification, NotificationConsumer, SessionState, SyncClient};

use crate::cli::{GlobalOpts, OutputFormat, WatchArgs};
use crate::config::{self, Config};
use crate::error::CliError;
use crate::output;

/// One notification as printed by `watch`: a headline, a JSON line, or a
/// YAML document.
fn render_notification(n: &Notification, format: OutputFormat, color: bool) -> String {
    match format {
        OutputFormat::Table | OutputFormat::Plain => format!(
            "{} {}",
            output::headline(&n.title, &n.message, color),
            n.link
        ),
        OutputFormat::Json | OutputFormat::JsonCompact => {
            serde_json::to_string(n).unwrap_or_else(|e| format!("{{\"error\":\"{e}\"}}"))
        }
        OutputFormat::Yaml => serde_yaml::to_string(n).map_or_else(
            |e| format!("---\nerror: {e}"),
            |doc| format!("---\n{}", doc.trim_end()),
        ),
    }
}

fn printer(format: OutputFormat, color: bool) -> NotificationConsumer {
    Arc::new(move |n: Notification| {
        output::print_output(&render_notification(&n, format, color), false);
    })
}

pub async fn handle(
    client: &SyncClient,
    args: WatchArgs,
    cfg: &Config,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let user = match args.user {
        Some(user) => user,
        None => config::active_profile(global, cfg)?
            .1
            .user_id
            .ok_or_else(|| CliError::Validation {
                field: "user".into(),
                reason: "pass --user or set user_id in the profile".into(),
            })?,
    };

    let consumer = printer(global.output, output::should_color(global.color));
    let mut session = client.realtime(&user, consumer)?;
    let mut states = session.subscribe_state();
    if !global.quiet {
        eprintln!("Watching notifications for {user} (Ctrl-C to stop)");
    }

    let deadline = async {
        match args.duration {
            Some(limit) => tokio::time::sleep(limit).await,
            None => future::pending().await,
        }
    };
    tokio::pin!(deadline);

    let outcome = loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break Ok(()),
            () = &mut deadline => break Ok(()),
            changed = states.changed() => {
                if changed.is_err() {
                    break Ok(());
                }
                let state = states.borrow_and_update().clone();
                tracing::debug!(%state, "realtime state");
                if !global.quiet {
                    eprintln!("realtime: {state}");
                }
                if state == SessionState::GivenUp {
                    break Err(CliError::Realtime {
                        reason: "gave up after repeated connection failures".into(),
                    });
                }
            }
        }
    };

    session.disconnect().await;
    outcome
}

#[cfg(test)]
mod tests {
    use super::*;

    fn notification() -> Notification {
        Notification::new("tech-1", "New ticket", "Printer on fire", "/tickets/t-9")
    }

    #[test]
    fn yaml_output_is_a_yaml_document() {
        let out = render_notification(&notification(), OutputFormat::Yaml, false);
        assert!(out.starts_with("---\n"), "{out}");
        assert!(out.contains("title: New ticket"), "{out}");
        assert!(out.contains("link: /tickets/t-9"), "{out}");
    }

    #[test]
    fn json_output_is_one_line() {
        let out = render_notification(&notification(), OutputFormat::Json, false);
        assert!(out.starts_with('{'));
        assert!(!out.contains('\n'));
    }

    #[test]
    fn plain_output_is_a_headline() {
        let out = render_notification(&notification(), OutputFormat::Plain, false);
        assert_eq!(out, "New ticket Printer on fire /tickets/t-9");
    }
}
