use std::{fmt, sync::Arc};

use serde::{Deserialize, Serialize};

use crate::{Param, ServiceDescriptor};

/// The logical request for one call. Carries no wire format.
#[derive(Clone)]
pub struct RequestEnvelope {
    service: ServiceDescriptor,
    method: String,
    args: Arc<dyn Param>,
    return_type: &'static str,
}

impl RequestEnvelope {
    pub fn new(
        service: ServiceDescriptor,
        method: &str,
        args: Arc<dyn Param>,
        return_type: &'static str,
    ) -> Self {
        RequestEnvelope {
            service,
            method: method.to_owned(),
            args,
            return_type,
        }
    }

    pub fn service(&self) -> &ServiceDescriptor {
        &self.service
    }

    pub fn method(&self) -> &str {
        &self.method
    }

    pub fn args(&self) -> &dyn Param {
        &*self.args
    }

    /// Type name of the reply the caller expects.
    pub fn return_type(&self) -> &'static str {
        self.return_type
    }
}

impl fmt::Debug for RequestEnvelope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestEnvelope")
            .field("service", &self.service.to_string())
            .field("method", &self.method)
            .field("args", &self.args)
            .field("return_type", &self.return_type)
            .finish()
    }
}

/// What a transport hands back for one correlation id.
#[derive(Debug, Clone, PartialEq)]
pub enum Response {
    Payload(Vec<u8>),
    /// The provider ran the method and reported an application failure.
    RemoteError(String),
}

/// The encoded form of a request envelope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WireRequest {
    pub service: ServiceDescriptor,
    pub method: String,
    pub args: Vec<u8>,
}
