//! Error types for the scheduler module

use std::fmt;

/// Result type for scheduler operations
pub type SchedulerResult<T> = Result<T, SchedulerError>;

/// Scheduler-specific errors
#[derive(Debug)]
pub enum SchedulerError {
    /// Invalid cron expression
    InvalidCron {
        field: String,
        reason: String,
    },

    /// Task not found
    TaskNotFound {
        id: String,
    },

    /// Task is currently running
    TaskRunning {
        id: String,
    },

    /// No action registered under the task's action name
    UnknownAction {
        name: String,
    },

    /// Task action failed
    ActionFailed {
        id: String,
        reason: String,
    },

    /// Serialization/deserialization error
    SerializationError {
        reason: String,
    },

    /// IO error
    IoError {
        operation: String,
        reason: String,
    },
}

impl fmt::Display for SchedulerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidCron { field, reason } => {
                write!(f, "Invalid cron expression ({field}): {reason}")
            }
            Self::TaskNotFound { id } => {
                write!(f, "Task not found: {id}")
            }
            Self::TaskRunning { id } => {
                write!(f, "Task is currently running: {id}")
            }
            Self::UnknownAction { name } => {
                write!(f, "No action registered for '{name}'")
            }
            Self::ActionFailed { id, reason } => {
                write!(f, "Task '{id}' failed: {reason}")
            }
            Self::SerializationError { reason } => {
                write!(f, "Serialization error: {reason}")
            }
            Self::IoError { operation, reason } => {
                write!(f, "IO error during '{operation}': {reason}")
            }
        }
    }
}

impl std::error::Error for SchedulerError {}

impl From<serde_json::Error> for SchedulerError {
    fn from(err: serde_json::Error) -> Self {
        Self::SerializationError {
            reason: err.to_string(),
        }
    }
}

impl From<std::io::Error> for SchedulerError {
    fn from(err: std::io::Error) -> Self {
        Self::IoError {
            operation: "unknown".to_string(),
            reason: err.to_string(),
        }
    }
}

impl SchedulerError {
    /// Create an invalid cron error
    pub fn invalid_cron(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidCron {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Create a task not found error
    pub fn task_not_found(id: impl Into<String>) -> Self {
        Self::TaskNotFound { id: id.into() }
    }

    /// Create a task running error
    pub fn task_running(id: impl Into<String>) -> Self {
        Self::TaskRunning { id: id.into() }
    }

    /// Create an unknown action error
    pub fn unknown_action(name: impl Into<String>) -> Self {
        Self::UnknownAction { name: name.into() }
    }

    /// Create an action failure error
    pub fn action_failed(id: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::ActionFailed {
            id: id.into(),
            reason: reason.into(),
        }
    }

    /// Create an IO error with context
    pub fn io_error(operation: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::IoError {
            operation: operation.into(),
            reason: reason.into(),
        }
    }

    /// Check if the error is recoverable
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::ActionFailed { .. } | Self::IoError { .. } | Self::TaskRunning { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_cron_error() {
        let err = SchedulerError::invalid_cron("minute", "bad value '61'");
        assert!(err.to_string().contains("minute"));
        assert!(err.to_string().contains("61"));
    }

    #[test]
    fn test_task_not_found_error() {
        let err = SchedulerError::task_not_found("post_content_bluesky");
        assert!(err.to_string().contains("post_content_bluesky"));
    }

    #[test]
    fn test_is_recoverable() {
        let action_err = SchedulerError::action_failed("t1", "timeout");
        assert!(action_err.is_recoverable());

        let cron_err = SchedulerError::invalid_cron("hour", "out of range");
        assert!(!cron_err.is_recoverable());
    }

    #[test]
    fn test_from_serde_json_error() {
        let json_err = serde_json::from_str::<i32>("not a number").unwrap_err();
        let scheduler_err: SchedulerError = json_err.into();
        assert!(matches!(
            scheduler_err,
            SchedulerError::SerializationError { .. }
        ));
    }
}
