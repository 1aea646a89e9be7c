use serde::Serialize;

#[derive(Debug, Serialize)]
#[serde(tag = "kind")]
pub enum ApiError {
    NotFound(NotFound),
    Invalid(Invalid),
}

#[derive(Debug, Serialize)]
pub struct NotFound {
    pub id: u64,
}

#[derive(Debug, Serialize)]
pub struct Invalid {
    pub field: String,
    pub reason: String,
}
