//! Client command handlers.

use deskflow_core::model::ClientDraft;
use deskflow_core::{Client, RowId, SyncClient};

use crate::cli::{ClientArgs, ClientCommand, GlobalOpts};
use crate::error::CliError;
use crate::output;

fn detail(c: &Client) -> String {
    output::detail(&[
        ("id", c.id.to_string()),
        ("name", c.name.clone()),
        ("email", c.email.clone().unwrap_or_else(|| "-".into())),
        ("company", c.company.clone().unwrap_or_else(|| "-".into())),
    ])
}

pub async fn handle(client: &SyncClient, args: ClientArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let stored = match args.command {
        ClientCommand::Create {
            name,
            email,
            company,
        } => {
            client
                .create_client(&ClientDraft {
                    name: Some(name),
                    email,
                    company,
                    ..ClientDraft::default()
                })
                .await?
        }

        ClientCommand::Rename { id, name } => {
            if name.trim().is_empty() {
                return Err(CliError::Validation {
                    field: "name".into(),
                    reason: "client name cannot be empty".into(),
                });
            }
            client
                .update_client(
                    &RowId::from(id),
                    &ClientDraft {
                        name: Some(name),
                        ..ClientDraft::default()
                    },
                )
                .await?
        }
    };

    let rendered = output::render_single(global.output, &stored, detail, |c| c.id.to_string())?;
    output::print_output(&rendered, global.quiet);
    Ok(())
}
