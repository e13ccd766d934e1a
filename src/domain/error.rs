use crate::core::protocol::{CallEndReason, ProtocolError, Service};
use thiserror::Error;

/// qmictl unified error type
#[derive(Error, Debug)]
pub enum QmiCtlError {
    /// Bad or conflicting options; raised before any device interaction.
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    #[error("couldn't open the QMI device '{device}': {source}")]
    Connection {
        device: String,
        #[source]
        source: ProtocolError,
    },

    #[error("couldn't create client for the '{service}' service: {source}")]
    Allocation {
        service: Service,
        #[source]
        source: ProtocolError,
    },

    /// The action's request failed or the device rejected it.
    #[error("{context}: {source}")]
    Action {
        context: String,
        #[source]
        source: ProtocolError,
    },

    #[error("couldn't release client: {source}")]
    Release {
        #[source]
        source: ProtocolError,
    },

    #[error("Output error: {0}")]
    Output(String),
}

impl QmiCtlError {
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Failure headline, reported as the `error` field of a result object.
    pub fn headline(&self) -> String {
        match self {
            QmiCtlError::Configuration { message } => message.clone(),
            QmiCtlError::Connection { .. } => "couldn't open the QmiDevice".to_string(),
            QmiCtlError::Allocation { .. } => {
                "couldn't create client for the service".to_string()
            }
            QmiCtlError::Action { context, .. } => context.clone(),
            QmiCtlError::Release { .. } => "couldn't release client".to_string(),
            QmiCtlError::Output(_) => "couldn't write output".to_string(),
        }
    }

    /// Underlying cause, reported as the `message` field of a result object.
    pub fn detail(&self) -> Option<String> {
        match self {
            QmiCtlError::Configuration { .. } => None,
            QmiCtlError::Connection { source, .. }
            | QmiCtlError::Allocation { source, .. }
            | QmiCtlError::Action { source, .. }
            | QmiCtlError::Release { source } => Some(source.to_string()),
            QmiCtlError::Output(message) => Some(message.clone()),
        }
    }

    pub fn call_end_reason(&self) -> Option<&CallEndReason> {
        match self {
            QmiCtlError::Action { source, .. } => source.call_end_reason(),
            _ => None,
        }
    }

    pub fn is_configuration(&self) -> bool {
        matches!(self, QmiCtlError::Configuration { .. })
    }
}

pub type QmiCtlResult<T> = Result<T, QmiCtlError>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::protocol::QmiStatus;

    #[test]
    fn test_action_error_fields() {
        let err = QmiCtlError::Action {
            context: "couldn't get home network".to_string(),
            source: ProtocolError::response(QmiStatus::info_unavailable()),
        };
        assert_eq!(err.headline(), "couldn't get home network");
        assert_eq!(
            err.detail().as_deref(),
            Some("QMI protocol error (74): 'InfoUnavailable'")
        );
        assert!(err.to_string().starts_with("couldn't get home network: "));
    }

    #[test]
    fn test_configuration_error_has_no_detail() {
        let err = QmiCtlError::configuration("no actions specified");
        assert!(err.is_configuration());
        assert_eq!(err.headline(), "no actions specified");
        assert!(err.detail().is_none());
    }
}
