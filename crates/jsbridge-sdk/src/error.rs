//! Error types for the bridge
//!
//! `BridgeError` is the taxonomy of failures raised while converting or
//! dispatching a single value or call. `JsBridgeError` is the envelope handed
//! to the caller of an invocation: it records in which phase the failure
//! happened, which argument was involved, and whether it originated inside
//! script evaluation.

use std::fmt;

use crate::host::HostException;

/// Result type for conversion and dispatch steps
pub type BridgeResult<T> = Result<T, BridgeError>;

/// Exception raised by the script engine
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptException {
    /// Error constructor name (`TypeError`, `Error`, ...)
    pub name: String,
    /// Error message
    pub message: String,
}

impl ScriptException {
    /// Create a new script exception
    pub fn new(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for ScriptException {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.name, self.message)
    }
}

/// Failure raised by a converter or by the dispatch around it
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum BridgeError {
    /// Script value has a runtime type incompatible with the target converter
    #[error("Cannot convert {value} to {target}")]
    TypeConversion {
        /// Description of the offending value
        value: String,
        /// Target type name
        target: String,
        /// Whether the failure happened during in-script evaluation
        in_script: bool,
    },

    /// Structurally disallowed conversion
    #[error("Unsupported operation: {message}")]
    UnsupportedOperation {
        /// What was attempted
        message: String,
    },

    /// The host call left a pending exception
    #[error("Host invocation failed: {0}")]
    HostInvocation(#[source] HostException),

    /// An awaited promise settled as a failure
    #[error("Async rejection: {message}")]
    AsyncRejection {
        /// Rejection reason as text
        message: String,
    },

    /// The engine call raised a script exception
    #[error("Script exception: {0}")]
    Script(ScriptException),
}

impl BridgeError {
    /// Build a type conversion error
    pub fn type_conversion(
        value: impl Into<String>,
        target: impl Into<String>,
        in_script: bool,
    ) -> Self {
        BridgeError::TypeConversion {
            value: value.into(),
            target: target.into(),
            in_script,
        }
    }

    /// Build an unsupported-operation error
    pub fn unsupported(message: impl Into<String>) -> Self {
        BridgeError::UnsupportedOperation {
            message: message.into(),
        }
    }

    /// Error category
    pub fn kind(&self) -> ErrorKind {
        match self {
            BridgeError::TypeConversion { .. } => ErrorKind::TypeConversion,
            BridgeError::UnsupportedOperation { .. } => ErrorKind::UnsupportedOperation,
            BridgeError::HostInvocation(_) => ErrorKind::HostInvocation,
            BridgeError::AsyncRejection { .. } => ErrorKind::AsyncRejection,
            BridgeError::Script(_) => ErrorKind::Script,
        }
    }

    /// Name of the script error constructor this failure maps to when it is
    /// reported inside script code
    pub fn script_error_name(&self) -> &str {
        match self {
            BridgeError::TypeConversion { .. } => "TypeError",
            BridgeError::Script(e) => &e.name,
            _ => "Error",
        }
    }
}

/// Category of a bridge failure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Incompatible script value
    TypeConversion,
    /// Disallowed conversion
    UnsupportedOperation,
    /// Pending host exception after a host call
    HostInvocation,
    /// Rejected promise
    AsyncRejection,
    /// Script exception from the engine call
    Script,
}

/// Step of an invocation in which a failure happened
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    /// Building the loader set
    Bind,
    /// Converting arguments
    ArgumentConversion,
    /// The underlying call
    Invocation,
    /// Waiting for an asynchronous result
    Await,
    /// Converting the return value
    ReturnConversion,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Phase::Bind => "bind",
            Phase::ArgumentConversion => "argument conversion",
            Phase::Invocation => "invocation",
            Phase::Await => "await",
            Phase::ReturnConversion => "return conversion",
        })
    }
}

/// Which value of a call a failure refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Position {
    /// Zero-based argument index
    Argument(usize),
    /// The return value
    ReturnValue,
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Position::Argument(i) => write!(f, "argument {}", i),
            Position::ReturnValue => f.write_str("return value"),
        }
    }
}

/// Failure of a bridged invocation, as surfaced to its caller.
#[derive(Debug, Clone, PartialEq)]
pub struct JsBridgeError {
    error: BridgeError,
    phase: Phase,
    position: Option<Position>,
    in_script: bool,
}

impl JsBridgeError {
    /// Wrap a bridge error with its invocation context
    pub fn new(error: BridgeError, phase: Phase, position: Option<Position>, in_script: bool) -> Self {
        Self {
            error,
            phase,
            position,
            in_script,
        }
    }

    /// Underlying error
    pub fn error(&self) -> &BridgeError {
        &self.error
    }

    /// Take the underlying error
    pub fn into_error(self) -> BridgeError {
        self.error
    }

    /// Error category
    pub fn kind(&self) -> ErrorKind {
        self.error.kind()
    }

    /// Phase in which the failure happened
    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Argument index or return value, when known
    pub fn position(&self) -> Option<Position> {
        self.position
    }

    /// Argument index, if the failure concerns an argument
    pub fn argument_index(&self) -> Option<usize> {
        match self.position {
            Some(Position::Argument(i)) => Some(i),
            _ => None,
        }
    }

    /// Whether the failure should be reported as a script-land exception
    pub fn in_script(&self) -> bool {
        self.in_script
    }
}

impl fmt::Display for JsBridgeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.position {
            Some(position) => write!(f, "{} failed at {}: {}", self.phase, position, self.error),
            None => write!(f, "{} failed: {}", self.phase, self.error),
        }
    }
}

impl std::error::Error for JsBridgeError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_type_conversion_message() {
        let err = BridgeError::type_conversion("\"abc\"", "int", false);
        assert_eq!(err.to_string(), "Cannot convert \"abc\" to int");
        assert_eq!(err.kind(), ErrorKind::TypeConversion);
        assert_eq!(err.script_error_name(), "TypeError");
    }

    #[test]
    fn test_envelope_display() {
        let err = JsBridgeError::new(
            BridgeError::type_conversion("\"abc\"", "int", false),
            Phase::ArgumentConversion,
            Some(Position::Argument(1)),
            false,
        );
        assert_eq!(
            err.to_string(),
            "argument conversion failed at argument 1: Cannot convert \"abc\" to int"
        );
        assert_eq!(err.argument_index(), Some(1));
    }

    #[test]
    fn test_envelope_source() {
        use std::error::Error;
        let err = JsBridgeError::new(
            BridgeError::AsyncRejection {
                message: "Error: boom".to_string(),
            },
            Phase::Await,
            None,
            false,
        );
        assert!(err.source().is_some());
        assert!(err.to_string().contains("boom"));
    }
}
