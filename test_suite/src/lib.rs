//! In-memory Arith provider shared by the integration tests.

use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc, Mutex,
    },
    time::Duration,
};

use async_trait::async_trait;
use courier::*;
use mul_model::{ArithAddArgs, ArithAddReply};
use tokio::{sync::Notify, time};

/// How a provider answers one request.
#[derive(Clone)]
pub enum Plan {
    Reply,
    Delay(Duration),
    Hang,
    Lost,
    Remote(String),
    Gate(Arc<Notify>),
}

pub struct MemoryProvider {
    st: SerializeType,
    calls: PendingCalls,
    default: Mutex<Plan>,
    per_channel: Mutex<HashMap<u64, Plan>>,
    sends: AtomicUsize,
    sent_to: Mutex<Vec<u64>>,
}

impl MemoryProvider {
    pub fn new(st: SerializeType) -> Arc<Self> {
        Arc::new(MemoryProvider {
            st,
            calls: PendingCalls::new(),
            default: Mutex::new(Plan::Reply),
            per_channel: Mutex::new(HashMap::new()),
            sends: AtomicUsize::new(0),
            sent_to: Mutex::new(Vec::new()),
        })
    }

    pub fn plan(&self, plan: Plan) {
        *self.default.lock().unwrap() = plan;
    }

    pub fn plan_for(&self, channel: &Channel, plan: Plan) {
        self.per_channel.lock().unwrap().insert(channel.id(), plan);
    }

    pub fn sends(&self) -> usize {
        self.sends.load(Ordering::SeqCst)
    }

    pub fn sent_to(&self) -> Vec<u64> {
        self.sent_to.lock().unwrap().clone()
    }

    pub fn in_flight(&self) -> usize {
        self.calls.len()
    }

    fn plan_of(&self, channel: &Channel) -> Plan {
        match self.per_channel.lock().unwrap().get(&channel.id()) {
            Some(plan) => plan.clone(),
            None => self.default.lock().unwrap().clone(),
        }
    }

    fn execute(&self, request: &[u8]) -> Result<Vec<u8>> {
        let req = CodecSerializer::new(self.st).decode_request(request)?;
        let mut args = ArithAddArgs::default();
        args.from_slice(self.st, &req.args)?;
        let c = match req.method.as_str() {
            "Mul" => args.a * args.b,
            _ => args.a + args.b,
        };
        ArithAddReply { c }.into_bytes(self.st)
    }
}

#[async_trait]
impl Transport for MemoryProvider {
    async fn send(
        &self,
        channel: &Channel,
        request: Vec<u8>,
        seq: u64,
        _timeout: Duration,
    ) -> Result<Response> {
        self.sends.fetch_add(1, Ordering::SeqCst);
        self.sent_to.lock().unwrap().push(channel.id());

        let call = self.calls.register(seq)?;
        let calls = self.calls.clone();
        let payload = self.execute(&request)?;
        match self.plan_of(channel) {
            Plan::Reply => {
                calls.complete(seq, Response::Payload(payload));
            }
            Plan::Delay(d) => {
                tokio::spawn(async move {
                    time::sleep(d).await;
                    calls.complete(seq, Response::Payload(payload));
                });
            }
            Plan::Gate(gate) => {
                tokio::spawn(async move {
                    gate.notified().await;
                    calls.complete(seq, Response::Payload(payload));
                });
            }
            Plan::Hang => {}
            Plan::Lost => {
                calls.fail(seq, Error::connection_lost("peer closed"));
            }
            Plan::Remote(msg) => {
                calls.complete(seq, Response::RemoteError(msg));
            }
        }
        call.await
    }
}

/// A static pool with `providers` channels for the Arith service.
pub fn arith_pool(providers: u16) -> (Arc<StaticChannelPool>, Vec<Channel>) {
    let service = ServiceDescriptor::new("Arith");
    let pool = Arc::new(StaticChannelPool::new());
    let channels = (0..providers)
        .map(|i| pool.add_provider(&service, UnresolvedAddress::new("127.0.0.1", 8972 + i), 1))
        .collect();
    (pool, channels)
}

/// Builder for the Arith service with `Mul`, `Add` and `slowOp` registered.
pub fn arith_builder(provider: &Arc<MemoryProvider>, pool: &Arc<StaticChannelPool>) -> ProxyBuilder {
    ProxyBuilder::new(ServiceDescriptor::new("Arith"))
        .method::<ArithAddArgs, ArithAddReply>("Mul")
        .method::<ArithAddArgs, ArithAddReply>("Add")
        .method::<ArithAddArgs, ArithAddReply>("slowOp")
        .transport(provider.clone())
        .channel_pool(pool.clone())
}
