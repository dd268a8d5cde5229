use thiserror::Error;

#[derive(Error, Debug)]
pub enum AssistantError {
    #[error("tool error: {0}")] Tool(String),
    #[error("diagram render failed: {0}")] Render(String),
    #[error("archive failed: {0}")] Archive(String),
    #[error("snapshot error: {0}")] Snapshot(String),
    #[error("io error: {0}")] Io(#[from] std::io::Error),
    #[error("zip error: {0}")] Zip(#[from] zip::result::ZipError),
    #[error("json error: {0}")] Json(#[from] serde_json::Error),
}

pub type AssistantResult<T> = Result<T, AssistantError>;
