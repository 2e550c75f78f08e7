//! Step vocabulary and call-encoding errors.

/// Errors that can occur while validating or encoding plan operations
#[derive(Debug, thiserror::Error)]
pub enum PlanError {
    #[error("Unknown parameter binding '{binding}'")]
    UnknownBinding { binding: String },

    #[error("Binding '{binding}' cannot be used for a {expected} parameter")]
    BindingTypeMismatch {
        binding: String,
        expected: &'static str,
    },

    #[error("Binding '{binding}' requires a spender but the plan declares none")]
    MissingSpender { binding: String },
}
