use std::{collections::HashMap, sync::Arc, time::Duration};

use courier_protocol::{
    CodecSerializer, Error, ErrorKind, Param, Result, SerializeType, ServiceDescriptor,
    UnresolvedAddress,
};
use log::{debug, info};
use tokio::runtime::Handle;

use super::{
    config::ConsumerConfig,
    discovery::{ChannelPool, ConnectionManager, PoolConnectionManager, StaticChannelPool},
    dispatcher::Dispatcher,
    failover::{FailMode, FailoverStrategy},
    hook::{ConsumerHook, HookChain},
    method::{MethodDescriptor, MethodTable},
    proxy::{DispatchType, InvocationProxy, InvokeType},
    selector::{LoadBalancer, SelectMode, Selector},
    timeout::TimeoutResolver,
    transport::Transport,
};

pub const DEFAULT_RETRIES: u32 = 2;

/// Collects the configuration of one `InvocationProxy`.
///
/// Everything is fixed once `build` returns; a running proxy cannot be
/// reconfigured.
pub struct ProxyBuilder {
    service: ServiceDescriptor,
    serialize_type: SerializeType,
    select_mode: SelectMode,
    selector: Option<Box<dyn Selector>>,
    invoke_type: InvokeType,
    dispatch_type: DispatchType,
    timeout: Option<Duration>,
    method_timeouts: HashMap<String, Duration>,
    hooks: Vec<Arc<dyn ConsumerHook>>,
    fail_mode: FailMode,
    retries: u32,
    overall_deadline: Option<Duration>,
    methods: MethodTable,
    transport: Option<Arc<dyn Transport>>,
    pool: Option<Arc<dyn ChannelPool>>,
    connection_manager: Option<Arc<dyn ConnectionManager>>,
    provider_addresses: Option<String>,
    wait_for_available: Option<Duration>,
    runtime: Option<Handle>,
}

impl ProxyBuilder {
    pub fn new(service: ServiceDescriptor) -> Self {
        ProxyBuilder {
            service,
            serialize_type: SerializeType::default(),
            select_mode: SelectMode::default(),
            selector: None,
            invoke_type: InvokeType::default(),
            dispatch_type: DispatchType::default(),
            timeout: None,
            method_timeouts: HashMap::new(),
            hooks: Vec::new(),
            fail_mode: FailMode::default(),
            retries: DEFAULT_RETRIES,
            overall_deadline: None,
            methods: MethodTable::default(),
            transport: None,
            pool: None,
            connection_manager: None,
            provider_addresses: None,
            wait_for_available: None,
            runtime: None,
        }
    }

    /// Starts from a loaded config file. Methods, hooks and the transport
    /// still have to be added in code.
    pub fn from_config(cfg: &ConsumerConfig) -> Result<Self> {
        let mut builder = ProxyBuilder::new(cfg.service_descriptor());
        if let Some(st) = cfg.serializer()? {
            builder = builder.serializer(st);
        }
        if let Some(mode) = cfg.select_mode()? {
            builder = builder.select_mode(mode);
        }
        if let Some(invoke) = cfg.invoke_type()? {
            builder = builder.invoke_type(invoke);
        }
        if let Some(dispatch) = cfg.dispatch_type()? {
            builder = builder.dispatch_type(dispatch);
        }
        if let Some(mode) = cfg.fail_mode()? {
            builder = builder.fail_mode(mode);
        }
        if let Some(retries) = cfg.consumer.retries {
            builder = builder.retries(retries);
        }
        if let Some(timeout) = cfg.timeout() {
            builder = builder.timeout(timeout);
        }
        for (method, timeout) in cfg.method_timeouts() {
            builder = builder.method_timeout(method, timeout);
        }
        builder = builder.overall_deadline(cfg.overall_deadline());
        if let Some(ms) = cfg.consumer.wait_for_available_millis {
            builder = builder.wait_for_available(Duration::from_millis(ms));
        }
        if let Some(addresses) = &cfg.consumer.provider_addresses {
            builder = builder.provider_addresses(addresses);
        }
        Ok(builder)
    }

    pub fn group(mut self, group: &str) -> Self {
        self.service.group = group.to_owned();
        self
    }

    pub fn version(mut self, version: &str) -> Self {
        self.service.version = version.to_owned();
        self
    }

    pub fn serializer(mut self, st: SerializeType) -> Self {
        self.serialize_type = st;
        self
    }

    pub fn select_mode(mut self, mode: SelectMode) -> Self {
        self.select_mode = mode;
        self.selector = None;
        self
    }

    /// A caller-provided policy, used instead of any `SelectMode`.
    pub fn selector(mut self, selector: Box<dyn Selector>) -> Self {
        self.selector = Some(selector);
        self
    }

    pub fn invoke_type(mut self, invoke: InvokeType) -> Self {
        self.invoke_type = invoke;
        self
    }

    pub fn dispatch_type(mut self, dispatch: DispatchType) -> Self {
        self.dispatch_type = dispatch;
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn method_timeout(mut self, method: &str, timeout: Duration) -> Self {
        self.method_timeouts.insert(method.to_owned(), timeout);
        self
    }

    pub fn hook(mut self, hook: Arc<dyn ConsumerHook>) -> Self {
        self.hooks.push(hook);
        self
    }

    pub fn fail_mode(mut self, mode: FailMode) -> Self {
        self.fail_mode = mode;
        self
    }

    pub fn retries(mut self, retries: u32) -> Self {
        self.retries = retries;
        self
    }

    pub fn overall_deadline(mut self, deadline: Option<Duration>) -> Self {
        self.overall_deadline = deadline;
        self
    }

    /// Registers a callable method with its argument and reply types.
    pub fn method<A: Param, R: Param>(mut self, name: &str) -> Self {
        self.methods.insert(MethodDescriptor::of::<A, R>(name));
        self
    }

    pub fn transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    pub fn channel_pool(mut self, pool: Arc<dyn ChannelPool>) -> Self {
        self.pool = Some(pool);
        self
    }

    pub fn connection_manager(mut self, manager: Arc<dyn ConnectionManager>) -> Self {
        self.connection_manager = Some(manager);
        self
    }

    /// Comma separated `host:port` list, turned into a `StaticChannelPool`.
    pub fn provider_addresses(mut self, addresses: &str) -> Self {
        self.provider_addresses = Some(addresses.to_owned());
        self
    }

    /// Makes `build` wait until the service has a usable channel.
    pub fn wait_for_available(mut self, wait: Duration) -> Self {
        self.wait_for_available = Some(wait);
        self
    }

    /// Runtime that asynchronous invocations are spawned on. Defaults to the
    /// runtime `build` is called from.
    pub fn runtime(mut self, handle: Handle) -> Self {
        self.runtime = Some(handle);
        self
    }

    pub async fn build(self) -> Result<InvocationProxy> {
        if self.timeout == Some(Duration::ZERO) {
            return Err(Error::config("timeout must be greater than zero"));
        }
        if let Some((method, _)) = self.method_timeouts.iter().find(|(_, t)| t.is_zero()) {
            return Err(Error::config(format!(
                "timeout of {} must be greater than zero",
                method
            )));
        }
        if self.overall_deadline == Some(Duration::ZERO) {
            return Err(Error::config("overall deadline must be greater than zero"));
        }
        let transport = self
            .transport
            .clone()
            .ok_or_else(|| Error::config(format!("no transport for {}", self.service)))?;
        let pool = self.channel_pool_or_static()?;
        let runtime = match self.runtime.clone() {
            Some(handle) => handle,
            None => Handle::try_current().map_err(Error::config)?,
        };

        if let Some(wait) = self.wait_for_available.filter(|w| !w.is_zero()) {
            let manager = self.connection_manager.clone().unwrap_or_else(|| {
                Arc::new(PoolConnectionManager::new(pool.clone(), self.service.clone()))
            });
            debug!("waiting {:?} for a channel to {}", wait, self.service);
            if !manager.wait_for_available(wait).await {
                return Err(Error::new(
                    ErrorKind::ConnectFailed,
                    format!("no provider of {} became available within {:?}", self.service, wait),
                ));
            }
        }

        let balancer = match self.selector {
            Some(selector) => LoadBalancer::new(selector),
            None => LoadBalancer::from(self.select_mode),
        };
        let dispatcher = Arc::new(Dispatcher::new(
            self.service.clone(),
            pool,
            balancer,
            Arc::new(CodecSerializer::new(self.serialize_type)),
            transport,
            TimeoutResolver::new(self.timeout, self.method_timeouts),
            HookChain::new(self.hooks),
        ));

        let failover = match self.fail_mode {
            FailMode::Failfast => None,
            mode => Some(Arc::new(
                FailoverStrategy::new(dispatcher.clone(), self.retries)
                    .with_mode(mode)
                    .with_overall_deadline(self.overall_deadline),
            )),
        };

        info!(
            "proxy for {} ready: {} {} {} {} serializer={}",
            self.service,
            self.invoke_type,
            self.dispatch_type,
            self.select_mode,
            self.fail_mode,
            self.serialize_type
        );
        Ok(InvocationProxy::new(
            dispatcher,
            failover,
            self.methods,
            self.invoke_type,
            self.dispatch_type,
            runtime,
        ))
    }

    fn channel_pool_or_static(&self) -> Result<Arc<dyn ChannelPool>> {
        match (&self.pool, &self.provider_addresses) {
            (Some(_), Some(_)) => Err(Error::config(
                "set either a channel pool or provider addresses, not both",
            )),
            (Some(pool), None) => Ok(pool.clone()),
            (None, Some(addresses)) => {
                let pool = StaticChannelPool::new();
                for address in UnresolvedAddress::parse_list(addresses)? {
                    pool.add_provider(&self.service, address, 1);
                }
                Ok(Arc::new(pool))
            }
            (None, None) => Err(Error::config(format!(
                "no channel pool or provider addresses for {}",
                self.service
            ))),
        }
    }
}
