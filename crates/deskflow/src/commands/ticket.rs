//! Ticket command handlers. Every write is a confirmed mutation.

use deskflow_core::{RowId, SyncClient, Ticket, TicketDraft};

use crate::cli::{GlobalOpts, TicketArgs, TicketCommand};
use crate::error::CliError;
use crate::output;

fn detail(t: &Ticket) -> String {
    output::detail(&[
        ("id", t.id.to_string()),
        ("title", t.title.clone()),
        ("status", t.status.to_string()),
        ("priority", t.priority.to_string()),
        ("client", t.client_name.clone().unwrap_or_else(|| "-".into())),
        (
            "assignee",
            t.assigned_to
                .as_ref()
                .map_or_else(|| "-".into(), ToString::to_string),
        ),
    ])
}

pub async fn handle(client: &SyncClient, args: TicketArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let ticket = match args.command {
        TicketCommand::Create {
            title,
            description,
            priority,
            client: client_id,
        } => {
            let draft = TicketDraft {
                title: Some(title),
                description,
                priority: priority.map(Into::into),
                client_id: client_id.as_deref().map(RowId::from),
                ..TicketDraft::default()
            };
            client.create_ticket(&draft).await?
        }

        TicketCommand::Assign { id, technician } => {
            client
                .assign_ticket(&RowId::from(id), Some(&RowId::from(technician)))
                .await?
        }

        TicketCommand::Unassign { id } => client.assign_ticket(&RowId::from(id), None).await?,

        TicketCommand::Status { id, status } => {
            client
                .set_ticket_status(&RowId::from(id), status.into())
                .await?
        }
    };

    let rendered = output::render_single(global.output, &ticket, detail, |t| t.id.to_string())?;
    output::print_output(&rendered, global.quiet);
    Ok(())
}
