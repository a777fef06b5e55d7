//! 错误处理

#[derive(Debug, thiserror::Error)]
pub enum Error {
    // 标准库错误处理
    #[error("io error, {0}")]
    Io(std::io::Error),
    #[error("system time error, {0}")]
    SystemTimeError(std::time::SystemTimeError),
    // std::sync::rwlock
    #[error("lock error, {0}")]
    LockError(String),

    #[error("model file not found, {0}/{1}")]
    ModelFileNotFound(String, String),
    #[error("invalid directory, {0}")]
    InvalidDirectory(String),

    #[error("py error, {0}")]
    PyErr(#[from] pyo3::PyErr),
    #[error("json error, {0}")]
    Json(#[from] serde_json::Error),
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::Io(e)
    }
}

impl From<std::time::SystemTimeError> for Error {
    fn from(e: std::time::SystemTimeError) -> Self {
        Error::SystemTimeError(e)
    }
}
