use std::fmt::Display;

use strum_macros::{Display, EnumIter};

#[derive(Debug, Copy, Clone, Display, PartialEq, Eq, Hash, EnumIter)]
pub enum ErrorKind {
    // no healthy channel could be selected
    NoAvailableChannel,
    // no response within the resolved timeout
    Timeout,
    // the transport lost the connection while the request was in flight
    ConnectionLost,
    // the provider executed the call and reported an application failure
    RemoteError,
    Encoding,
    Decoding,
    // a before-hook vetoed the call
    HookRejected,
    // no channel became available while waiting at setup
    ConnectFailed,
    NoSuchMethod,
    Config,
    // the task driving an async invocation was dropped
    Cancelled,
    // a transport already waits on this correlation id
    DuplicateSeq,
    // the result was read as unicast when it is multicast, or the other way round
    WrongDispatchType,
}

impl ErrorKind {
    /// Whether a failover strategy may re-attempt a call that failed with this kind.
    /// A `RemoteError` means the provider already ran the call, so it is never retried.
    pub fn is_retryable(self) -> bool {
        matches!(self, ErrorKind::Timeout | ErrorKind::ConnectionLost)
    }
}

/// The failure half of a response result.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("{kind}: {detail}")]
pub struct Error {
    kind: ErrorKind,
    detail: String,
}

impl Error {
    pub fn new<D: Display>(kind: ErrorKind, detail: D) -> Self {
        Error {
            kind,
            detail: detail.to_string(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn detail(&self) -> &str {
        &self.detail
    }

    pub fn is_retryable(&self) -> bool {
        self.kind.is_retryable()
    }

    pub fn timeout<D: Display>(detail: D) -> Self {
        Error::new(ErrorKind::Timeout, detail)
    }

    pub fn connection_lost<D: Display>(detail: D) -> Self {
        Error::new(ErrorKind::ConnectionLost, detail)
    }

    pub fn remote<D: Display>(detail: D) -> Self {
        Error::new(ErrorKind::RemoteError, detail)
    }

    pub fn config<D: Display>(detail: D) -> Self {
        Error::new(ErrorKind::Config, detail)
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;
    use strum::IntoEnumIterator;

    #[test]
    fn only_timeout_and_connection_lost_are_retryable() {
        let retryable: Vec<ErrorKind> = ErrorKind::iter().filter(|k| k.is_retryable()).collect();
        assert_eq!(vec![ErrorKind::Timeout, ErrorKind::ConnectionLost], retryable);
    }

    #[test]
    fn display_carries_kind_and_detail() {
        let err = Error::remote("division by zero");
        assert_eq!("RemoteError: division by zero", err.to_string());
        assert_eq!(ErrorKind::RemoteError, err.kind());
        assert_eq!("division by zero", err.detail());
    }
}
