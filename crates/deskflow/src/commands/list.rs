//! List command: reads a collection through the query cache.

use chrono::{DateTime, Utc};
use tabled::Tabled;

use deskflow_core::{Article, Category, Client, RowId, SyncClient, Technician, Ticket};

use crate::cli::{GlobalOpts, ListArgs, ResourceArg};
use crate::error::CliError;
use crate::output;

// ── Table rows ───────────────────────────────────────────────────────

#[derive(Tabled)]
struct ClientRow {
    #[tabled(rename = "ID")]
    id: String,
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Email")]
    email: String,
    #[tabled(rename = "Company")]
    company: String,
}

impl From<&Client> for ClientRow {
    fn from(c: &Client) -> Self {
        Self {
            id: c.id.to_string(),
            name: c.name.clone(),
            email: c.email.clone().unwrap_or_default(),
            company: c.company.clone().unwrap_or_default(),
        }
    }
}

#[derive(Tabled)]
struct TicketRow {
    #[tabled(rename = "ID")]
    id: String,
    #[tabled(rename = "Title")]
    title: String,
    #[tabled(rename = "Status")]
    status: String,
    #[tabled(rename = "Priority")]
    priority: String,
    #[tabled(rename = "Client")]
    client: String,
    #[tabled(rename = "Assignee")]
    assignee: String,
    #[tabled(rename = "Updated")]
    updated: String,
}

fn timestamp(at: Option<DateTime<Utc>>) -> String {
    at.map(|t| t.format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_default()
}

impl From<&Ticket> for TicketRow {
    fn from(t: &Ticket) -> Self {
        Self {
            id: t.id.to_string(),
            title: t.title.clone(),
            status: t.status.to_string(),
            priority: t.priority.to_string(),
            client: t.client_name.clone().unwrap_or_default(),
            assignee: t
                .assigned_to
                .as_ref()
                .map(ToString::to_string)
                .unwrap_or_default(),
            updated: timestamp(t.updated_at.or(t.created_at)),
        }
    }
}

#[derive(Tabled)]
struct TechnicianRow {
    #[tabled(rename = "ID")]
    id: String,
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Specialty")]
    specialty: String,
    #[tabled(rename = "Active")]
    active: String,
}

impl From<&Technician> for TechnicianRow {
    fn from(t: &Technician) -> Self {
        Self {
            id: t.id.to_string(),
            name: t.name.clone(),
            specialty: t.specialty.clone().unwrap_or_default(),
            active: if t.active { "yes" } else { "no" }.into(),
        }
    }
}

#[derive(Tabled)]
struct ArticleRow {
    #[tabled(rename = "ID")]
    id: String,
    #[tabled(rename = "Title")]
    title: String,
    #[tabled(rename = "Category")]
    category: String,
    #[tabled(rename = "Published")]
    published: String,
}

impl From<&Article> for ArticleRow {
    fn from(a: &Article) -> Self {
        Self {
            id: a.id.to_string(),
            title: a.title.clone(),
            category: a.category_name.clone().unwrap_or_default(),
            published: if a.published { "yes" } else { "no" }.into(),
        }
    }
}

#[derive(Tabled)]
struct CategoryRow {
    #[tabled(rename = "ID")]
    id: String,
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Description")]
    description: String,
}

impl From<&Category> for CategoryRow {
    fn from(c: &Category) -> Self {
        Self {
            id: c.id.to_string(),
            name: c.name.clone(),
            description: c.description.clone().unwrap_or_default(),
        }
    }
}

// ── Handler ──────────────────────────────────────────────────────────

pub async fn handle(client: &SyncClient, args: ListArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let format = global.output;
    let rendered = match args.resource {
        ResourceArg::Clients => {
            let clients = client.clients().await?;
            output::render_list(
                format,
                &clients,
                |c| ClientRow::from(c),
                |c| c.id.to_string(),
            )?
        }
        ResourceArg::Tickets => {
            let tickets = filter_tickets(client.tickets().await?, &args);
            output::render_list(
                format,
                &tickets,
                |t| TicketRow::from(t),
                |t| t.id.to_string(),
            )?
        }
        ResourceArg::Technicians => {
            let technicians = client.technicians().await?;
            output::render_list(
                format,
                &technicians,
                |t| TechnicianRow::from(t),
                |t| t.id.to_string(),
            )?
        }
        ResourceArg::Articles => {
            let articles = client.articles().await?;
            output::render_list(
                format,
                &articles,
                |a| ArticleRow::from(a),
                |a| a.id.to_string(),
            )?
        }
        ResourceArg::Categories => {
            let categories = client.categories().await?;
            output::render_list(
                format,
                &categories,
                |c| CategoryRow::from(c),
                |c| c.id.to_string(),
            )?
        }
    };
    output::print_output(&rendered, global.quiet);
    Ok(())
}

fn filter_tickets(tickets: Vec<Ticket>, args: &ListArgs) -> Vec<Ticket> {
    let assignee = args.assigned_to.as_deref().map(RowId::from);
    tickets
        .into_iter()
        .filter(|t| !args.open || t.is_open())
        .filter(|t| assignee.is_none() || t.assigned_to == assignee)
        .collect()
}
