use std::time::Duration;

use async_trait::async_trait;
use courier_protocol::{Channel, Response, Result};

/// Moves encoded requests over established connections.
///
/// `send` resolves once the response for `seq` arrives or the transport gives
/// up on the connection (`ErrorKind::ConnectionLost`). Implementations must
/// match responses by `seq`; several requests may be outstanding on one
/// channel. Dropping the returned future abandons the call, and a response
/// that arrives afterwards is discarded (see `courier_protocol::PendingCalls`).
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(
        &self,
        channel: &Channel,
        request: Vec<u8>,
        seq: u64,
        timeout: Duration,
    ) -> Result<Response>;
}
