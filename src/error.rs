use thiserror::Error;

/// Error for anything that crosses a user-visible boundary.
///
/// Carries the failing operation, the underlying reason, and a corrective
/// action, so the chain surfaced by `anyhow` always ends in something the
/// user can act on.
#[derive(Debug, Error)]
#[error("{context}\n  reason: {reason}\n  hint: {hint}")]
pub struct UserError {
    pub context: String,
    pub reason: String,
    pub hint: String,
}

impl UserError {
    pub fn new(
        context: impl Into<String>,
        reason: impl Into<String>,
        hint: impl Into<String>,
    ) -> Self {
        UserError {
            context: context.into(),
            reason: reason.into(),
            hint: hint.into(),
        }
    }
}
