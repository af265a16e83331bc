use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc, Mutex,
    },
    time::Duration,
};

use async_trait::async_trait;
use courier_protocol::{
    Channel, CodecSerializer, Error, Param, PendingCalls, RequestEnvelope, Response, Result,
    SerializeType, ServiceDescriptor, UnresolvedAddress,
};
use tokio::{sync::Notify, time};

use crate::{
    discovery::StaticChannelPool,
    dispatcher::Dispatcher,
    hook::HookChain,
    selector::{LoadBalancer, SelectMode},
    timeout::TimeoutResolver,
    transport::Transport,
};

#[derive(Clone)]
pub(crate) enum Behaviour {
    Echo,
    Delay(Duration),
    Hang,
    Lost,
    Remote(String),
    Gate(Arc<Notify>),
}

/// Echoes the encoded arguments back as the reply, per-channel behaviour aside.
pub(crate) struct MockTransport {
    calls: PendingCalls,
    default: Mutex<Behaviour>,
    per_channel: Mutex<HashMap<u64, Behaviour>>,
    sends: AtomicUsize,
    sent_to: Mutex<Vec<u64>>,
}

impl MockTransport {
    pub fn new() -> Self {
        MockTransport {
            calls: PendingCalls::new(),
            default: Mutex::new(Behaviour::Echo),
            per_channel: Mutex::new(HashMap::new()),
            sends: AtomicUsize::new(0),
            sent_to: Mutex::new(Vec::new()),
        }
    }

    pub fn set_default(&self, b: Behaviour) {
        *self.default.lock().unwrap() = b;
    }

    pub fn set_for(&self, channel: &Channel, b: Behaviour) {
        self.per_channel.lock().unwrap().insert(channel.id(), b);
    }

    pub fn sends(&self) -> usize {
        self.sends.load(Ordering::SeqCst)
    }

    pub fn sent_to(&self) -> Vec<u64> {
        self.sent_to.lock().unwrap().clone()
    }

    fn behaviour(&self, channel: &Channel) -> Behaviour {
        let per_channel = self.per_channel.lock().unwrap();
        match per_channel.get(&channel.id()) {
            Some(b) => b.clone(),
            None => self.default.lock().unwrap().clone(),
        }
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn send(
        &self,
        channel: &Channel,
        request: Vec<u8>,
        seq: u64,
        _timeout: Duration,
    ) -> Result<Response> {
        self.sends.fetch_add(1, Ordering::SeqCst);
        self.sent_to.lock().unwrap().push(channel.id());

        let req = CodecSerializer::new(SerializeType::Json).decode_request(&request)?;
        let call = self.calls.register(seq)?;
        let calls = self.calls.clone();
        match self.behaviour(channel) {
            Behaviour::Echo => {
                calls.complete(seq, Response::Payload(req.args));
            }
            Behaviour::Delay(d) => {
                tokio::spawn(async move {
                    time::sleep(d).await;
                    calls.complete(seq, Response::Payload(req.args));
                });
            }
            Behaviour::Gate(gate) => {
                tokio::spawn(async move {
                    gate.notified().await;
                    calls.complete(seq, Response::Payload(req.args));
                });
            }
            Behaviour::Hang => {}
            Behaviour::Lost => {
                calls.fail(seq, Error::connection_lost("connection reset"));
            }
            Behaviour::Remote(msg) => {
                calls.complete(seq, Response::RemoteError(msg));
            }
        }
        call.await
    }
}

pub(crate) struct Fixture {
    pub service: ServiceDescriptor,
    pub pool: Arc<StaticChannelPool>,
    pub channels: Vec<Channel>,
    pub transport: Arc<MockTransport>,
    pub timeouts: TimeoutResolver,
    pub hooks: HookChain,
}

impl Fixture {
    pub fn new(providers: u16) -> Self {
        let service = ServiceDescriptor::new("Arith");
        let pool = Arc::new(StaticChannelPool::new());
        let channels = (0..providers)
            .map(|i| pool.add_provider(&service, UnresolvedAddress::new("127.0.0.1", 9000 + i), 1))
            .collect();
        Fixture {
            service,
            pool,
            channels,
            transport: Arc::new(MockTransport::new()),
            timeouts: TimeoutResolver::new(Some(Duration::from_millis(200)), HashMap::new()),
            hooks: HookChain::default(),
        }
    }

    pub fn with_timeouts(mut self, timeouts: TimeoutResolver) -> Self {
        self.timeouts = timeouts;
        self
    }

    pub fn with_hooks(mut self, hooks: HookChain) -> Self {
        self.hooks = hooks;
        self
    }

    pub fn dispatcher(&self) -> Arc<Dispatcher> {
        Arc::new(Dispatcher::new(
            self.service.clone(),
            self.pool.clone(),
            LoadBalancer::from(SelectMode::RoundRobin),
            Arc::new(CodecSerializer::new(SerializeType::Json)),
            self.transport.clone(),
            self.timeouts.clone(),
            self.hooks.clone(),
        ))
    }

    pub fn envelope<A: Param + 'static>(&self, args: A) -> RequestEnvelope {
        RequestEnvelope::new(self.service.clone(), "Echo", Arc::new(args), "u64")
    }
}
