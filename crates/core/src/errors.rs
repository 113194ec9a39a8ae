use thiserror::Error;

/// Failures that reach the dispatcher boundary. Tool-level faults never appear here;
/// they stay inside the tool's structured outcome.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum DispatchError {
    #[error("configuration missing for: {}", missing.join(", "))]
    ConfigurationMissing { missing: Vec<String> },
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("upstream failure: {0}")]
    UpstreamFailure(String),
}

impl DispatchError {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::ConfigurationMissing { .. } => "configuration_missing",
            Self::InvalidInput(_) => "invalid_input",
            Self::UpstreamFailure(_) => "upstream_failure",
        }
    }

    /// Configuration gaps clear up once instructions are pushed; callers may retry later.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::ConfigurationMissing { .. })
    }

    pub fn into_interface(self, correlation_id: impl Into<String>) -> InterfaceError {
        let correlation_id = correlation_id.into();
        let mut mapped = InterfaceError::from(self);
        match &mut mapped {
            InterfaceError::BadRequest { correlation_id: id, .. }
            | InterfaceError::ServiceUnavailable { correlation_id: id, .. }
            | InterfaceError::BadGateway { correlation_id: id, .. } => *id = correlation_id,
        }
        mapped
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum InterfaceError {
    #[error("bad request: {message}")]
    BadRequest { message: String, correlation_id: String },
    #[error("service unavailable: {message}")]
    ServiceUnavailable { message: String, correlation_id: String },
    #[error("bad gateway: {message}")]
    BadGateway { message: String, correlation_id: String },
}

impl InterfaceError {
    /// Text safe to show the caller. Bad requests carry their own reason; upstream
    /// detail stays in `detail()` for logs.
    pub fn user_message(&self) -> &str {
        match self {
            Self::BadRequest { message, .. } => message,
            Self::ServiceUnavailable { .. } => {
                "The assistant is not fully configured yet. Please try again later."
            }
            Self::BadGateway { .. } => "Error processing message. Please try again.",
        }
    }

    pub fn status_code(&self) -> u16 {
        match self {
            Self::BadRequest { .. } => 400,
            Self::ServiceUnavailable { .. } => 503,
            Self::BadGateway { .. } => 502,
        }
    }

    pub fn correlation_id(&self) -> &str {
        match self {
            Self::BadRequest { correlation_id, .. }
            | Self::ServiceUnavailable { correlation_id, .. }
            | Self::BadGateway { correlation_id, .. } => correlation_id,
        }
    }

    pub fn detail(&self) -> &str {
        match self {
            Self::BadRequest { message, .. }
            | Self::ServiceUnavailable { message, .. }
            | Self::BadGateway { message, .. } => message,
        }
    }
}

impl From<DispatchError> for InterfaceError {
    fn from(value: DispatchError) -> Self {
        let message = value.to_string();
        match value {
            DispatchError::InvalidInput(reason) => {
                Self::BadRequest { message: reason, correlation_id: "unassigned".to_owned() }
            }
            DispatchError::ConfigurationMissing { .. } => {
                Self::ServiceUnavailable { message, correlation_id: "unassigned".to_owned() }
            }
            DispatchError::UpstreamFailure(_) => {
                Self::BadGateway { message, correlation_id: "unassigned".to_owned() }
            }
        }
    }
}
