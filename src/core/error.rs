use thiserror::Error;

#[derive(Error, Debug)]
pub enum ProxyError {
    #[error("Invalid configuration of '{entity}': {message}")]
    InvalidConfiguration { entity: String, message: String },

    #[error("Member '{member}' is not part of the generic shape of '{entity}'")]
    UnknownMember { entity: String, member: String },

    #[error("Member '{member}' is bound more than once in shape '{shape}'")]
    DuplicateMember { shape: String, member: String },

    #[error("Proxy accessor for '{0}' is already configured")]
    AlreadyConfigured(String),

    #[error("Entity type '{0}' not found")]
    EntityNotFound(String),

    #[error("Type mismatch: {0}")]
    TypeMismatch(String),

    #[error("Evaluation error: {0}")]
    EvaluationError(String),

    #[error("Unsupported operation: {0}")]
    UnsupportedOperation(String),

    #[error(transparent)]
    Hook(#[from] anyhow::Error),

    #[error("Lock error: {0}")]
    LockError(String),
}

impl ProxyError {
    pub fn invalid_configuration(entity: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidConfiguration {
            entity: entity.into(),
            message: message.into(),
        }
    }

    /// True for errors caused by the schema configuration rather than by data.
    pub fn is_configuration_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidConfiguration { .. }
                | Self::UnknownMember { .. }
                | Self::DuplicateMember { .. }
                | Self::AlreadyConfigured(_)
                | Self::EntityNotFound(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, ProxyError>;

impl<T> From<std::sync::PoisonError<T>> for ProxyError {
    fn from(err: std::sync::PoisonError<T>) -> Self {
        Self::LockError(err.to_string())
    }
}
