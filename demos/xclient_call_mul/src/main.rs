use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use courier::*;
use flexi_logger::Logger;
use log::{error, info};
use mul_model::*;
use tokio::time;

/// Arith provider living in this process, answering after a short delay.
struct LocalArith {
    calls: PendingCalls,
    serializer: CodecSerializer,
    latency: Duration,
}

impl LocalArith {
    fn new(st: SerializeType, latency: Duration) -> Self {
        LocalArith {
            calls: PendingCalls::new(),
            serializer: CodecSerializer::new(st),
            latency,
        }
    }

    fn handle(&self, request: &[u8]) -> Result<Response> {
        let req = self.serializer.decode_request(request)?;
        let st = self.serializer.serialize_type();
        let mut args = ArithAddArgs::default();
        args.from_slice(st, &req.args)?;
        let reply = match req.method.as_str() {
            "Mul" => ArithAddReply { c: args.a * args.b },
            "Add" => ArithAddReply { c: args.a + args.b },
            other => return Ok(Response::RemoteError(format!("unknown method {}", other))),
        };
        Ok(Response::Payload(reply.into_bytes(st)?))
    }
}

#[async_trait]
impl Transport for LocalArith {
    async fn send(
        &self,
        channel: &Channel,
        request: Vec<u8>,
        seq: u64,
        _timeout: Duration,
    ) -> Result<Response> {
        let call = self.calls.register(seq)?;
        let response = self.handle(&request)?;
        let calls = self.calls.clone();
        let latency = self.latency * (channel.id() as u32 + 1);
        tokio::spawn(async move {
            time::sleep(latency).await;
            calls.complete(seq, response);
        });
        call.await
    }
}

#[tokio::main]
async fn main() -> std::result::Result<(), Box<dyn std::error::Error>> {
    let _logger = Logger::try_with_env_or_str("info")?.start()?;

    let transport = Arc::new(LocalArith::new(
        SerializeType::MsgPack,
        Duration::from_millis(10),
    ));
    let unicast = ProxyBuilder::new(ServiceDescriptor::new("Arith"))
        .serializer(SerializeType::MsgPack)
        .select_mode(SelectMode::WeightedRoundRobin)
        .fail_mode(FailMode::Failover)
        .timeout(Duration::from_millis(500))
        .method_timeout("Mul", Duration::from_millis(100))
        .method::<ArithAddArgs, ArithAddReply>("Mul")
        .method::<ArithAddArgs, ArithAddReply>("Add")
        .transport(transport.clone())
        .provider_addresses("127.0.0.1:8972,127.0.0.1:8973")
        .wait_for_available(Duration::from_secs(1))
        .build()
        .await?;

    for a in 1..=5 {
        let args = ArithAddArgs { a, b: 10 };
        match unicast.invoke::<_, ArithAddReply>("Mul", args).await {
            Ok(reply) => info!("{} * {} = {}", args.a, args.b, reply.value().await?.c),
            Err(err) => error!("Mul failed: {}", err),
        }
    }

    let multicast = ProxyBuilder::new(ServiceDescriptor::new("Arith"))
        .serializer(SerializeType::MsgPack)
        .invoke_type(InvokeType::Async)
        .dispatch_type(DispatchType::Multicast)
        .method::<ArithAddArgs, ArithAddReply>("Add")
        .transport(transport)
        .provider_addresses("127.0.0.1:8972,127.0.0.1:8973,127.0.0.1:8974")
        .build()
        .await?;
    let pending = multicast
        .invoke::<_, ArithAddReply>("Add", ArithAddArgs { a: 20, b: 22 })
        .await?;
    for outcome in pending.outcomes().await? {
        match outcome.result {
            Ok(reply) => info!("{} answered {}", outcome.channel, reply.c),
            Err(err) => error!("{} failed: {}", outcome.channel, err),
        }
    }

    Ok(())
}
