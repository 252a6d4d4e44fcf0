/// Errors that can occur within the notification subsystem.
///
/// # Examples
///
/// ```rust
/// use sitemon_notify::NotifyError;
///
/// let err = NotifyError::InvalidConfig("missing smtp host".to_string());
/// assert!(err.to_string().contains("smtp host"));
/// ```
#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    /// Sink configuration is missing a required field or contains an
    /// invalid value.
    #[error("Notify: invalid sink configuration: {0}")]
    InvalidConfig(String),

    /// SMTP transport error when sending email.
    #[error("Notify: SMTP error: {0}")]
    Smtp(String),

    /// A recipient or sender address could not be parsed.
    #[error("Notify: invalid mail address: {0}")]
    Address(#[from] lettre::address::AddressError),

    /// Building the mail message failed.
    #[error("Notify: failed to build message: {0}")]
    Message(#[from] lettre::error::Error),

    /// Generic notification error for cases not covered by other variants.
    #[error("Notify: {0}")]
    Other(String),
}

/// Convenience `Result` alias for notification operations.
pub type Result<T> = std::result::Result<T, NotifyError>;
