use serde::{Deserialize, Serialize};

/// A single todo item
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Todo {
    pub id: TodoId,
    pub title: String,
    pub due_date: Option<String>,
    pub status: Status,
    #[serde(skip)]
    pub revision: u32,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TodoId(pub u64);

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    Open,
    InProgress,
    Done,
}

#[derive(Debug, Deserialize)]
pub struct NewTodo {
    #[validate(length(min = 1, max = 200))]
    pub title: String,
    #[serde(default)]
    pub status: Option<Status>,
}

#[derive(Debug, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: u64,
}
