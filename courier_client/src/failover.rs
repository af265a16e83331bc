use std::{
    sync::Arc,
    time::{Duration, Instant},
};

use async_trait::async_trait;
use courier_protocol::{Channel, Error, ErrorKind, Param, RequestEnvelope, Result};
use log::{debug, error, warn};
use strum_macros::{Display, EnumIter, EnumString};

use super::dispatcher::{Dispatch, Dispatcher};

#[derive(Debug, Copy, Clone, Display, PartialEq, Eq, EnumIter, EnumString)]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum FailMode {
    //Failfast returns error immediately
    Failfast,
    //Failover selects another server automaticaly
    Failover,
    //Failtry use current server again
    Failtry,
}

impl Default for FailMode {
    fn default() -> Self {
        FailMode::Failfast
    }
}

/// Where one logical call stands.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Phase {
    Attempting(u32),
    Succeeded,
    /// Retryable failures used up the budget.
    Exhausted,
    /// A failure retrying cannot fix.
    GivingUp,
}

#[derive(Debug)]
struct FailoverState {
    attempt: u32,
    attempts_remaining: u32,
    last_error: Option<Error>,
}

impl FailoverState {
    fn new(retries: u32) -> Self {
        FailoverState {
            attempt: 1,
            attempts_remaining: retries,
            last_error: None,
        }
    }

    fn on_failure(&mut self, err: Error) -> Phase {
        let retryable = err.is_retryable();
        self.last_error = Some(err);
        if !retryable {
            Phase::GivingUp
        } else if self.attempts_remaining == 0 {
            Phase::Exhausted
        } else {
            self.attempts_remaining -= 1;
            self.attempt += 1;
            Phase::Attempting(self.attempt)
        }
    }

    fn into_error(self) -> Error {
        self.last_error
            .unwrap_or_else(|| Error::timeout("overall deadline elapsed before the first attempt"))
    }
}

/// Retries a synchronous unicast call on `Timeout` and `ConnectionLost`.
///
/// `Failover` moves to a channel that has not failed during this call yet,
/// `Failtry` stays on the first channel. The last failure is returned once
/// `retries` extra attempts are spent.
pub struct FailoverStrategy {
    dispatcher: Arc<Dispatcher>,
    mode: FailMode,
    retries: u32,
    overall_deadline: Option<Duration>,
}

impl FailoverStrategy {
    pub fn new(dispatcher: Arc<Dispatcher>, retries: u32) -> Self {
        FailoverStrategy {
            dispatcher,
            mode: FailMode::Failover,
            retries,
            overall_deadline: None,
        }
    }

    pub fn with_mode(mut self, mode: FailMode) -> Self {
        self.mode = mode;
        self
    }

    /// Caps the whole call, retries included. Without it every attempt gets
    /// the full method timeout.
    pub fn with_overall_deadline(mut self, deadline: Option<Duration>) -> Self {
        self.overall_deadline = deadline;
        self
    }

    pub fn retries(&self) -> u32 {
        self.retries
    }

    fn next_channel(
        &self,
        envelope: &RequestEnvelope,
        pinned: &mut Option<Channel>,
        excluded: &mut Vec<Channel>,
    ) -> Result<Channel> {
        if self.mode == FailMode::Failtry {
            if let Some(channel) = pinned.as_ref().filter(|c| self.dispatcher.is_available(c)) {
                return Ok(channel.clone());
            }
            if let Some(gone) = pinned.take() {
                debug!("{} pinned channel {} went away, picking another", envelope.method(), gone);
            }
            let channel = self.dispatcher.select(envelope, &[])?;
            *pinned = Some(channel.clone());
            return Ok(channel);
        }

        match self.dispatcher.select(envelope, excluded) {
            Err(err) if err.kind() == ErrorKind::NoAvailableChannel && !excluded.is_empty() => {
                // every healthy channel failed once already, go round again
                excluded.clear();
                self.dispatcher.select(envelope, excluded)
            }
            selected => selected,
        }
    }
}

#[async_trait]
impl Dispatch for FailoverStrategy {
    async fn dispatch<T>(&self, envelope: &RequestEnvelope) -> Result<T>
    where
        T: Param + Default + 'static,
    {
        let started = Instant::now();
        let mut state = FailoverState::new(self.retries);
        let mut excluded: Vec<Channel> = Vec::new();
        let mut pinned: Option<Channel> = None;

        loop {
            let mut timeout = self.dispatcher.resolve_timeout(envelope.method());
            if let Some(deadline) = self.overall_deadline {
                let remaining = deadline
                    .checked_sub(started.elapsed())
                    .unwrap_or_default();
                if remaining.is_zero() {
                    error!(
                        "{} overall deadline {:?} spent after {} attempts",
                        envelope.method(),
                        deadline,
                        state.attempt - 1
                    );
                    return Err(state.into_error());
                }
                timeout = timeout.min(remaining);
            }

            let channel = self.next_channel(envelope, &mut pinned, &mut excluded)?;

            let err = match self
                .dispatcher
                .dispatch_to::<T>(envelope, &channel, timeout)
                .await
            {
                Ok(reply) => {
                    debug!(
                        "{} {:?} on attempt {}",
                        envelope.method(),
                        Phase::Succeeded,
                        state.attempt
                    );
                    return Ok(reply);
                }
                Err(err) => err,
            };

            match state.on_failure(err) {
                Phase::Attempting(n) => {
                    warn!(
                        "{} failed on {}, {} attempt {}: {}",
                        envelope.method(),
                        channel,
                        self.mode,
                        n,
                        state.last_error.as_ref().map(|e| e.to_string()).unwrap_or_default()
                    );
                    excluded.push(channel);
                }
                Phase::Exhausted => {
                    error!(
                        "{} exhausted {} attempts",
                        envelope.method(),
                        state.attempt
                    );
                    return Err(state.into_error());
                }
                phase => {
                    debug!("{} {:?}", envelope.method(), phase);
                    return Err(state.into_error());
                }
            }
        }
    }
}
