use crate::core::protocol::{DeviceRequest, ServiceRequest, Service};
use crate::domain::values::StartNetworkInput;

/// What to do once a service client is available.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operation {
    /// Allocate and release the client without issuing any request.
    Noop,
    /// Issue a single request.
    Request(ServiceRequest),
    /// Start a data session and keep it up until cancelled or disconnected.
    FollowNetwork(StartNetworkInput),
}

/// The single action selected for an invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    /// Served by the device itself; no client is allocated.
    Device(DeviceRequest),
    Service { service: Service, operation: Operation },
}

impl Action {
    pub fn request(request: ServiceRequest) -> Self {
        Action::Service {
            service: request.service(),
            operation: Operation::Request(request),
        }
    }

    pub fn noop(service: Service) -> Self {
        Action::Service {
            service,
            operation: Operation::Noop,
        }
    }

    pub fn follow_network(input: StartNetworkInput) -> Self {
        Action::Service {
            service: Service::Wds,
            operation: Operation::FollowNetwork(input),
        }
    }

    /// Service the action belongs to; device actions report CTL.
    pub fn service(&self) -> Service {
        match self {
            Action::Device(_) => Service::Ctl,
            Action::Service { service, .. } => *service,
        }
    }

    /// Command line flag that selected this action, without leading dashes.
    pub fn flag_name(&self) -> String {
        match self {
            Action::Device(request) => request.flag_name().to_string(),
            Action::Service { service, operation } => match operation {
                Operation::Noop => format!("{}-noop", service.as_str()),
                Operation::Request(request) => request.flag_name().to_string(),
                Operation::FollowNetwork(_) => "wds-follow-network".to_string(),
            },
        }
    }
}
