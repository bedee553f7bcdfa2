use chrono::{NaiveDate, TimeZone, Utc};
use clap::{Parser, Subcommand};
use serde::Deserialize;

use libs::{
    contact::ContactInquiry,
    payload::{
        AddMessagePayload, AddTaskPayload, DeleteTaskPayload, ToggleTaskPayload,
    },
    record::{EpochMillis, Message, Priority, RecordId, Task},
};

mod util;
use util::{ClientError, ServiceClient};

const SERVICE_DOMAIN: &str = "http://localhost:8000";

#[derive(Parser)]
#[command(version, about = "No More Calls tasks, messages and contact desk", long_about = None)]
struct Cli {
    /// Base URL of the record service.
    #[arg(long, env = "NMC_SERVICE_URL", default_value = SERVICE_DOMAIN)]
    url: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List tasks, open ones first.
    Tasks,
    /// Add a task.
    Add {
        title: String,
        description: String,
        /// Due date, `YYYY-MM-DD`.
        #[arg(long, value_parser = parse_due_date)]
        due: Option<EpochMillis>,
        /// Who is on it.
        #[arg(long)]
        assign: Option<String>,
        #[arg(long, default_value = "Medium")]
        priority: Priority,
    },
    /// Flip a task between open and done.
    Toggle { id: String },
    /// Remove a task.
    Delete { id: String },
    /// Show messages, newest first.
    Messages,
    /// Post a message.
    Say { author: String, text: String },
    /// Send a contact inquiry.
    Contact {
        #[arg(long)]
        first_name: String,
        #[arg(long)]
        last_name: String,
        #[arg(long)]
        email: String,
        #[arg(long)]
        subject: String,
        #[arg(long)]
        message: String,
        #[arg(long)]
        company: Option<String>,
    },
    /// Fill the store with demo tasks and messages.
    Seed,
}

#[derive(Deserialize, Debug)]
struct TasksData {
    tasks: Vec<Task>,
}

#[derive(Deserialize, Debug)]
struct MessagesData {
    messages: Vec<Message>,
}

#[derive(Deserialize, Debug)]
struct IdData {
    id: RecordId,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
struct ToggleData {
    is_completed: bool,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
struct SeedReport {
    tasks_added: usize,
    messages_added: usize,
    failures: Vec<String>,
}

#[derive(Deserialize, Debug)]
struct SeedData {
    report: SeedReport,
}

/// Midnight UTC of the given day, in epoch milliseconds.
fn parse_due_date(value: &str) -> Result<EpochMillis, String> {
    let date = NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .map_err(|e| format!("expected YYYY-MM-DD: {}", e))?;
    let midnight = date
        .and_hms_opt(0, 0, 0)
        .ok_or_else(|| "invalid date".to_string())?;
    Ok(midnight.and_utc().timestamp_millis())
}

fn format_date(millis: EpochMillis) -> String {
    match Utc.timestamp_millis_opt(millis).single() {
        Some(datetime) => datetime.format("%Y-%m-%d").to_string(),
        None => millis.to_string(),
    }
}

fn format_task(task: &Task) -> String {
    let mut details = vec![];
    if let Some(due_date) = task.due_date {
        details.push(format!("due {}", format_date(due_date)));
    }
    if let Some(assigned_to) = &task.assigned_to {
        details.push(assigned_to.clone());
    }
    if let Some(priority) = &task.priority {
        details.push(priority.clone());
    }

    let mut line = format!(
        "[{}] {}",
        if task.is_completed { "x" } else { " " },
        task.title
    );
    if !details.is_empty() {
        line.push_str(&format!(" ({})", details.join(", ")));
    }
    line.push_str(&format!("  #{}", task.id));
    line
}

fn format_message(message: &Message) -> String {
    let when = Utc
        .timestamp_millis_opt(message.timestamp)
        .single()
        .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_default();
    format!("{} {}: {}", when, message.author, message.text)
}

/// Checks the inquiry locally and only submits it when every check passes.
fn send_inquiry(client: &ServiceClient, inquiry: ContactInquiry) -> Result<RecordId, ClientError> {
    let problems = inquiry.check();
    if !problems.is_empty() {
        return Err(ClientError::Invalid(problems));
    }
    let data = client
        .post::<IdData, _>("/v1/forms", &inquiry.into_payload())?
        .ok_or(ClientError::MissingData)?;
    Ok(data.id)
}

fn run(client: &ServiceClient, command: Commands) -> Result<(), ClientError> {
    match command {
        Commands::Tasks => {
            let data: TasksData = client.get("/v1/tasks")?;
            if data.tasks.is_empty() {
                println!("Nothing to do.");
            }
            for task in &data.tasks {
                println!("{}", format_task(task));
                println!("      {}", task.description);
            }
        }
        Commands::Add {
            title,
            description,
            due,
            assign,
            priority,
        } => {
            let payload = AddTaskPayload {
                title,
                description,
                due_date: due,
                assigned_to: assign.filter(|a| !a.is_empty()),
                priority: Some(priority.to_string()),
            };
            let data = client
                .post::<IdData, _>("/v1/tasks", &payload)?
                .ok_or(ClientError::MissingData)?;
            println!("Added #{}", data.id);
        }
        Commands::Toggle { id } => {
            let payload = ToggleTaskPayload {
                id: RecordId::from(id),
            };
            let data = client
                .post::<ToggleData, _>("/v1/tasks/toggle", &payload)?
                .ok_or(ClientError::MissingData)?;
            if data.is_completed {
                println!("Done.");
            } else {
                println!("Reopened.");
            }
        }
        Commands::Delete { id } => {
            let payload = DeleteTaskPayload {
                id: RecordId::from(id),
            };
            client.post::<serde_json::Value, _>("/v1/tasks/delete", &payload)?;
            println!("Deleted.");
        }
        Commands::Messages => {
            let data: MessagesData = client.get("/v1/messages")?;
            for message in &data.messages {
                println!("{}", format_message(message));
            }
        }
        Commands::Say { author, text } => {
            let payload = AddMessagePayload { text, author };
            let data = client
                .post::<IdData, _>("/v1/messages", &payload)?
                .ok_or(ClientError::MissingData)?;
            println!("Posted #{}", data.id);
        }
        Commands::Contact {
            first_name,
            last_name,
            email,
            subject,
            message,
            company,
        } => {
            let inquiry = ContactInquiry {
                first_name,
                last_name,
                email,
                company,
                subject,
                message,
            };
            send_inquiry(client, inquiry)?;
            println!("Your message has been sent successfully. We'll get back to you soon.");
        }
        Commands::Seed => {
            let data = client
                .post::<SeedData, _>("/v1/seed", &serde_json::json!({}))?
                .ok_or(ClientError::MissingData)?;
            println!(
                "Added {} sample tasks and {} sample messages.",
                data.report.tasks_added, data.report.messages_added
            );
            for failure in &data.report.failures {
                eprintln!("failed: {}", failure);
            }
        }
    }
    Ok(())
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let client = ServiceClient::new(&cli.url);

    if let Err(err) = run(&client, cli.command) {
        eprintln!("{}", err);
        std::process::exit(1);
    }
}
