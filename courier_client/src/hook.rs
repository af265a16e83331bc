use std::sync::Arc;

use courier_protocol::{Error, ErrorKind, Param, RequestEnvelope, Result};
use log::warn;

pub type HookError = Box<dyn std::error::Error + Send + Sync>;

/// Extension point around each physical dispatch attempt.
///
/// Hooks fire once per attempt, so a call retried by failover runs them more
/// than once. They must not assume they see each logical call only once.
pub trait ConsumerHook: Send + Sync {
    /// Returning an error vetoes the attempt before anything is sent.
    fn before(&self, _envelope: &RequestEnvelope) -> std::result::Result<(), HookError> {
        Ok(())
    }

    /// Errors returned here are logged and otherwise ignored.
    fn after(
        &self,
        _envelope: &RequestEnvelope,
        _result: std::result::Result<&dyn Param, &Error>,
    ) -> std::result::Result<(), HookError> {
        Ok(())
    }
}

#[derive(Clone, Default)]
pub struct HookChain {
    hooks: Vec<Arc<dyn ConsumerHook>>,
}

impl HookChain {
    pub fn new(hooks: Vec<Arc<dyn ConsumerHook>>) -> Self {
        HookChain { hooks }
    }

    pub fn len(&self) -> usize {
        self.hooks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hooks.is_empty()
    }

    /// Runs every `before` in registration order, stopping at the first veto.
    pub fn before(&self, envelope: &RequestEnvelope) -> Result<()> {
        for (i, hook) in self.hooks.iter().enumerate() {
            hook.before(envelope).map_err(|err| {
                Error::new(
                    ErrorKind::HookRejected,
                    format!("hook #{} rejected {}: {}", i, envelope.method(), err),
                )
            })?;
        }
        Ok(())
    }

    /// Runs every `after` in registration order. A failing hook never affects
    /// the result the caller receives.
    pub fn after(&self, envelope: &RequestEnvelope, result: std::result::Result<&dyn Param, &Error>) {
        for (i, hook) in self.hooks.iter().enumerate() {
            if let Err(err) = hook.after(envelope, result) {
                warn!("after hook #{} failed on {}: {}", i, envelope.method(), err);
            }
        }
    }
}
