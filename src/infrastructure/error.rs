use thiserror::Error;

#[derive(Debug, Error)]
pub enum InfraError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("Invalid config: {0}")]
    InvalidConfig(String),
    #[error("Invalid input: {0}")]
    Validation(String),
    #[error("toggl api error: http {status}{}", remote_body_suffix(.body))]
    Remote { status: u16, body: String },
    #[error("Network error: {0}")]
    Network(String),
    #[error("Credential store error: {0}")]
    Credential(String),
}

fn remote_body_suffix(body: &str) -> String {
    if body.trim().is_empty() {
        String::new()
    } else {
        format!("; body={}", body.trim())
    }
}
