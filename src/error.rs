//! Runtime errors.
//!
//! Only construction-time and registration-time operations are fallible.
//! Flushing, patching and reconciliation never return errors.

use thiserror::Error;

/// Errors reported by the component runtime.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RuntimeError {
    /// A lifecycle or context function was called with no component being
    /// initialised or updated, so there is nothing to attach it to.
    #[error("`{operation}` called outside component initialisation")]
    OutsideComponentInit { operation: &'static str },

    /// A context entry exists under `key` but holds a different type.
    #[error("context entry `{key}` holds a different type")]
    ContextTypeMismatch { key: String },

    /// Two items of one keyed list share a key.
    #[error("duplicate key `{key}` at positions {first} and {second} of a keyed each")]
    DuplicateKey {
        key: String,
        first: usize,
        second: usize,
    },

    /// The component has already been destroyed.
    #[error("`{operation}` called on a destroyed component")]
    ComponentDestroyed { operation: &'static str },

    /// The component definition's instance function rejected its props.
    #[error("component instance failed: {0}")]
    Instance(String),
}

/// Crate result alias.
pub type Result<T> = std::result::Result<T, RuntimeError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages_name_the_operation() {
        let err = RuntimeError::OutsideComponentInit { operation: "on_mount" };
        assert_eq!(err.to_string(), "`on_mount` called outside component initialisation");

        let err = RuntimeError::DuplicateKey {
            key: "\"a\"".into(),
            first: 0,
            second: 2,
        };
        assert!(err.to_string().contains("positions 0 and 2"));
    }
}
