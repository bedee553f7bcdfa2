use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumString};

pub mod contact;
pub mod payload;
pub mod record;

/// The document collections owned by the record store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum Collection {
    Tasks,
    Messages,
    Forms,
}

#[derive(Debug, Display)]
pub enum DocumentRedisJsonPath {
    #[strum(serialize = "$")]
    Root,
}

impl DocumentRedisJsonPath {
    /// JSONPath addressing a single top-level field of a document.
    pub fn field(name: &str) -> String {
        format!("{}.{}", DocumentRedisJsonPath::Root, name)
    }
}

/// Builds the key under which a document is stored, `<prefix>:<collection>:<id>`.
pub fn generate_key(prefix: &str, collection: Collection, id: &str) -> String {
    format!("{}:{}:{}", prefix, collection, id)
}

/// Glob matching every document key of one collection.
pub fn collection_pattern(prefix: &str, collection: Collection) -> String {
    format!("{}:{}:*", prefix, collection)
}

/// Counter holding the last `_creationTime` handed out under `prefix`.
pub fn clock_key(prefix: &str) -> String {
    format!("{}:clock", prefix)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "snake_case")]
pub enum ProcedureKind {
    Query,
    Mutation,
    Action,
}

/// Named entry points callable by a presentation layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString)]
pub enum Procedure {
    #[strum(serialize = "tasks:getTasks")]
    GetTasks,
    #[strum(serialize = "tasks:addTask")]
    AddTask,
    #[strum(serialize = "tasks:toggleTaskStatus")]
    ToggleTaskStatus,
    #[strum(serialize = "tasks:deleteTask")]
    DeleteTask,
    #[strum(serialize = "messages:getMessages")]
    GetMessages,
    #[strum(serialize = "messages:addMessage")]
    AddMessage,
    #[strum(serialize = "forms:submitForm")]
    SubmitForm,
    #[strum(serialize = "seed:seed")]
    Seed,
}

impl Procedure {
    pub fn kind(&self) -> ProcedureKind {
        match self {
            Procedure::GetTasks | Procedure::GetMessages => ProcedureKind::Query,
            Procedure::Seed => ProcedureKind::Action,
            _ => ProcedureKind::Mutation,
        }
    }
}
