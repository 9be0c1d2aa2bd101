// src/job/value.rs

//! What a job leaves behind once it is done: a [`JobValue`] when its body
//! returned, or a [`JobError`] when it raised.

use std::fmt;
use std::sync::Arc;

/// Return value of a job body.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum JobValue {
    #[default]
    None,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

impl JobValue {
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            JobValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            JobValue::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            JobValue::Text(s) => Some(s.as_str()),
            _ => None,
        }
    }
}

impl fmt::Display for JobValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JobValue::None => write!(f, "None"),
            JobValue::Bool(b) => write!(f, "{b}"),
            JobValue::Int(i) => write!(f, "{i}"),
            JobValue::Float(x) => write!(f, "{x}"),
            JobValue::Text(s) => write!(f, "{s}"),
        }
    }
}

impl From<()> for JobValue {
    fn from(_: ()) -> Self {
        JobValue::None
    }
}

impl From<bool> for JobValue {
    fn from(b: bool) -> Self {
        JobValue::Bool(b)
    }
}

impl From<i64> for JobValue {
    fn from(i: i64) -> Self {
        JobValue::Int(i)
    }
}

impl From<i32> for JobValue {
    fn from(i: i32) -> Self {
        JobValue::Int(i64::from(i))
    }
}

impl From<f64> for JobValue {
    fn from(x: f64) -> Self {
        JobValue::Float(x)
    }
}

impl From<String> for JobValue {
    fn from(s: String) -> Self {
        JobValue::Text(s)
    }
}

impl From<&str> for JobValue {
    fn from(s: &str) -> Self {
        JobValue::Text(s.to_string())
    }
}

/// An error raised by a job body, shared by reference.
///
/// Cloning a `JobError` never copies the underlying error: every clone points
/// at the same allocation, which is what lets a nested scheduler hand the
/// *original* error of one of its critical jobs up to its parent
/// (see [`JobError::ptr_eq`]).
#[derive(Clone)]
pub struct JobError(Arc<anyhow::Error>);

impl JobError {
    /// Wrap an error returned by a job body.
    ///
    /// If `err` is itself a re-raised `JobError`, the shared original is
    /// returned instead of wrapping it a second time.
    pub fn new(err: anyhow::Error) -> Self {
        match err.downcast::<JobError>() {
            Ok(shared) => shared,
            Err(err) => JobError(Arc::new(err)),
        }
    }

    pub(crate) fn panicked(message: &str) -> Self {
        JobError(Arc::new(anyhow::anyhow!("job panicked: {message}")))
    }

    /// Whether both handles refer to the very same raised error.
    pub fn ptr_eq(&self, other: &JobError) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    pub fn inner(&self) -> &anyhow::Error {
        &self.0
    }

    pub fn downcast_ref<E>(&self) -> Option<&E>
    where
        E: fmt::Display + fmt::Debug + Send + Sync + 'static,
    {
        self.0.downcast_ref::<E>()
    }
}

impl fmt::Display for JobError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if f.alternate() {
            write!(f, "{:#}", self.0)
        } else {
            write!(f, "{}", self.0)
        }
    }
}

impl fmt::Debug for JobError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&*self.0, f)
    }
}

impl std::error::Error for JobError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.0.source()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reraised_job_error_keeps_identity() {
        let original = JobError::new(anyhow::anyhow!("boom"));
        let reraised = JobError::new(anyhow::Error::new(original.clone()));

        assert!(original.ptr_eq(&reraised));
        assert_eq!(reraised.to_string(), "boom");
    }

    #[test]
    fn distinct_errors_are_not_ptr_eq() {
        let a = JobError::new(anyhow::anyhow!("same text"));
        let b = JobError::new(anyhow::anyhow!("same text"));
        assert!(!a.ptr_eq(&b));
    }

    #[test]
    fn downcast_reaches_the_typed_error() {
        let err = JobError::new(std::io::Error::other("disk on fire").into());
        assert!(err.downcast_ref::<std::io::Error>().is_some());
    }

    #[test]
    fn value_display() {
        assert_eq!(JobValue::from(3).to_string(), "3");
        assert_eq!(JobValue::from("ok").to_string(), "ok");
        assert_eq!(JobValue::default().to_string(), "None");
        assert_eq!(JobValue::from(true).as_bool(), Some(true));
    }
}
