//! Demo data for staging. Every run inserts the full set again.

use serde::Serialize;

use libs::{
    payload::{AddMessagePayload, AddTaskPayload},
    record::{now_millis, EpochMillis, Priority},
};

use super::logic::{perform_add_message, perform_add_task};
use crate::store::DocumentStore;

struct SampleTask {
    title: &'static str,
    description: &'static str,
    due_in_days: i64,
    assigned_to: &'static str,
    priority: Priority,
}

const SAMPLE_TASKS: [SampleTask; 5] = [
    SampleTask {
        title: "Update the website design",
        description: "Implement the new color scheme and typography",
        due_in_days: 7,
        assigned_to: "Sarah",
        priority: Priority::High,
    },
    SampleTask {
        title: "Review analytics dashboard",
        description: "Check conversion rates and user engagement metrics",
        due_in_days: 2,
        assigned_to: "Michael",
        priority: Priority::Medium,
    },
    SampleTask {
        title: "Prepare quarterly report",
        description: "Compile data and create presentation slides",
        due_in_days: 14,
        assigned_to: "Jessica",
        priority: Priority::High,
    },
    SampleTask {
        title: "Respond to customer inquiries",
        description: "Answer emails and support tickets",
        due_in_days: 1,
        assigned_to: "David",
        priority: Priority::Medium,
    },
    SampleTask {
        title: "Schedule social media posts",
        description: "Create and schedule content for next month",
        due_in_days: 5,
        assigned_to: "Sarah",
        priority: Priority::Low,
    },
];

/// `(author, text)`
const SAMPLE_MESSAGES: [(&str, &str); 5] = [
    (
        "David",
        "Hey team, I've just pushed the latest changes to the repo.",
    ),
    ("Sarah", "Great! I'll review your PR this afternoon."),
    ("Michael", "Don't forget about our meeting at 3pm today."),
    (
        "Jessica",
        "I've updated the design specs in Figma. Let me know what you think!",
    ),
    (
        "David",
        "Has anyone seen the issue with the login form? It seems to be resolved now.",
    ),
];

#[derive(Serialize, Debug, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SeedReport {
    pub tasks_added: usize,
    pub messages_added: usize,
    pub failures: Vec<String>,
}

impl SampleTask {
    fn to_payload(&self, now: EpochMillis) -> AddTaskPayload {
        AddTaskPayload {
            title: self.title.to_string(),
            description: self.description.to_string(),
            due_date: Some(now + chrono::Duration::days(self.due_in_days).num_milliseconds()),
            assigned_to: Some(self.assigned_to.to_string()),
            priority: Some(self.priority.to_string()),
        }
    }
}

async fn seed_tasks(store: &dyn DocumentStore, now: EpochMillis) -> (usize, Vec<String>) {
    let mut added = 0;
    let mut failures = vec![];
    for sample in SAMPLE_TASKS.iter() {
        match perform_add_task(sample.to_payload(now), store).await {
            Ok(_) => added += 1,
            Err(err) => {
                tracing::error!(title = sample.title, "seed task failed: {}", err);
                failures.push(format!("task `{}`: {}", sample.title, err));
            }
        }
    }
    (added, failures)
}

async fn seed_messages(store: &dyn DocumentStore) -> (usize, Vec<String>) {
    let mut added = 0;
    let mut failures = vec![];
    for (author, text) in SAMPLE_MESSAGES {
        let payload = AddMessagePayload {
            text: text.to_string(),
            author: author.to_string(),
        };
        match perform_add_message(payload, store).await {
            Ok(_) => added += 1,
            Err(err) => {
                tracing::error!(author, "seed message failed: {}", err);
                failures.push(format!("message by `{}`: {}", author, err));
            }
        }
    }
    (added, failures)
}

/// Inserts the sample tasks and messages. Individual failures are recorded
/// and the remaining inserts still run.
pub(crate) async fn perform_seed(store: &dyn DocumentStore) -> SeedReport {
    tracing::info!("Seeding started...");
    let now = now_millis();
    let ((tasks_added, task_failures), (messages_added, message_failures)) =
        tokio::join!(seed_tasks(store, now), seed_messages(store));

    let report = SeedReport {
        tasks_added,
        messages_added,
        failures: task_failures.into_iter().chain(message_failures).collect(),
    };
    tracing::info!(
        tasks = report.tasks_added,
        messages = report.messages_added,
        failures = report.failures.len(),
        "seeding finished"
    );
    report
}
