use std::{
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
    time::Duration,
};

use async_trait::async_trait;
use courier_protocol::{
    Channel, Error, Param, RequestEnvelope, Response, Result, Serializer, ServiceDescriptor,
};
use futures::future;
use log::{debug, warn};
use tokio::time;

use super::{
    discovery::ChannelPool, hook::HookChain, selector::LoadBalancer, timeout::TimeoutResolver,
    transport::Transport,
};

/// Turns one envelope into one response result.
///
/// `Dispatcher` implements it directly; `FailoverStrategy` wraps a dispatcher
/// and implements it again with retries, so both are interchangeable.
#[async_trait]
pub trait Dispatch: Send + Sync {
    async fn dispatch<T>(&self, envelope: &RequestEnvelope) -> Result<T>
    where
        T: Param + Default + 'static;
}

/// What one channel of a multicast produced.
#[derive(Debug)]
pub struct ChannelOutcome<T> {
    pub channel: Channel,
    pub result: Result<T>,
}

// Correlation ids are unique per process, so dispatchers sharing a transport
// never wait on the same id.
static NEXT_SEQ: AtomicU64 = AtomicU64::new(0);

pub struct Dispatcher {
    service: ServiceDescriptor,
    pool: Arc<dyn ChannelPool>,
    balancer: LoadBalancer,
    serializer: Arc<dyn Serializer>,
    transport: Arc<dyn Transport>,
    timeouts: TimeoutResolver,
    hooks: HookChain,
}

impl Dispatcher {
    pub fn new(
        service: ServiceDescriptor,
        pool: Arc<dyn ChannelPool>,
        balancer: LoadBalancer,
        serializer: Arc<dyn Serializer>,
        transport: Arc<dyn Transport>,
        timeouts: TimeoutResolver,
        hooks: HookChain,
    ) -> Self {
        Dispatcher {
            service,
            pool,
            balancer,
            serializer,
            transport,
            timeouts,
            hooks,
        }
    }

    pub fn service(&self) -> &ServiceDescriptor {
        &self.service
    }

    pub fn serializer(&self) -> &dyn Serializer {
        &*self.serializer
    }

    pub fn hooks(&self) -> &HookChain {
        &self.hooks
    }

    pub fn timeouts(&self) -> &TimeoutResolver {
        &self.timeouts
    }

    pub fn resolve_timeout(&self, method: &str) -> Duration {
        self.timeouts.resolve(method)
    }

    pub fn select(&self, envelope: &RequestEnvelope, excluding: &[Channel]) -> Result<Channel> {
        self.balancer.select(&*self.pool, envelope, excluding)
    }

    pub fn is_available(&self, channel: &Channel) -> bool {
        self.pool.is_available(channel)
    }

    /// One physical attempt on a channel the caller already picked.
    pub async fn dispatch_to<T>(
        &self,
        envelope: &RequestEnvelope,
        channel: &Channel,
        timeout: Duration,
    ) -> Result<T>
    where
        T: Param + Default,
    {
        self.hooks.before(envelope)?;

        let seq = NEXT_SEQ.fetch_add(1, Ordering::Relaxed);
        debug!(
            "send {}.{} seq={} to {} timeout={:?}",
            envelope.service(),
            envelope.method(),
            seq,
            channel,
            timeout
        );
        let result = self.round_trip::<T>(envelope, channel, seq, timeout).await;

        self.hooks
            .after(envelope, result.as_ref().map(|reply| reply as &dyn Param));
        result
    }

    async fn round_trip<T>(
        &self,
        envelope: &RequestEnvelope,
        channel: &Channel,
        seq: u64,
        timeout: Duration,
    ) -> Result<T>
    where
        T: Param + Default,
    {
        let request = self.serializer.encode(envelope)?;

        let sent = self.transport.send(channel, request, seq, timeout);
        let response = match time::timeout(timeout, sent).await {
            Ok(response) => response?,
            Err(_) => {
                return Err(Error::timeout(format!(
                    "{} seq={} got no response from {} within {:?}",
                    envelope.method(),
                    seq,
                    channel,
                    timeout
                )))
            }
        };

        match response {
            Response::Payload(data) => {
                let mut reply = T::default();
                self.serializer.decode(&data, &mut reply)?;
                Ok(reply)
            }
            Response::RemoteError(msg) => Err(Error::remote(msg)),
        }
    }

    /// Sends the envelope independently to every available channel.
    ///
    /// Failures stay in the returned outcomes and are logged; none of them
    /// aborts the others.
    pub async fn multicast<T>(&self, envelope: &RequestEnvelope) -> Vec<ChannelOutcome<T>>
    where
        T: Param + Default,
    {
        let timeout = self.timeouts.resolve(envelope.method());
        let channels: Vec<Channel> = self
            .pool
            .channels_for(envelope.service())
            .into_iter()
            .filter(|c| self.pool.is_available(c))
            .collect();
        if channels.is_empty() {
            warn!("multicast {} has no available channel", envelope.method());
        }

        let calls: Vec<_> = channels
            .into_iter()
            .map(move |channel| async move {
                let result = self.dispatch_to::<T>(envelope, &channel, timeout).await;
                if let Err(err) = &result {
                    warn!("multicast {} to {} failed: {}", envelope.method(), channel, err);
                }
                ChannelOutcome { channel, result }
            })
            .collect();
        future::join_all(calls).await
    }
}

#[async_trait]
impl Dispatch for Dispatcher {
    async fn dispatch<T>(&self, envelope: &RequestEnvelope) -> Result<T>
    where
        T: Param + Default + 'static,
    {
        let timeout = self.resolve_timeout(envelope.method());
        let channel = self.select(envelope, &[])?;
        self.dispatch_to(envelope, &channel, timeout).await
    }
}
