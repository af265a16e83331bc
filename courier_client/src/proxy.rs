use std::{
    any::type_name,
    future::Future,
    pin::Pin,
    sync::Arc,
    task::{Context, Poll},
};

use courier_protocol::{Error, ErrorKind, Param, RequestEnvelope, Result, ServiceDescriptor};
use strum_macros::{Display, EnumIter, EnumString};
use tokio::{runtime::Handle, task::JoinHandle};

use super::{
    dispatcher::{ChannelOutcome, Dispatch, Dispatcher},
    failover::FailoverStrategy,
    method::MethodTable,
};

#[derive(Debug, Copy, Clone, Display, PartialEq, Eq, EnumIter, EnumString)]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum InvokeType {
    // the caller waits for the result
    Sync,
    // the caller gets a future right away
    Async,
}

impl Default for InvokeType {
    fn default() -> Self {
        InvokeType::Sync
    }
}

#[derive(Debug, Copy, Clone, Display, PartialEq, Eq, EnumIter, EnumString)]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum DispatchType {
    // one selected provider
    Unicast,
    // every available provider
    Multicast,
}

impl Default for DispatchType {
    fn default() -> Self {
        DispatchType::Unicast
    }
}

/// Completion of an asynchronous invocation. Resolves on whichever runtime
/// worker finishes the dispatch.
#[derive(Debug)]
pub struct InvokeFuture<T> {
    handle: JoinHandle<Result<T>>,
}

impl<T> InvokeFuture<T> {
    fn new(handle: JoinHandle<Result<T>>) -> Self {
        InvokeFuture { handle }
    }
}

impl<T> Future for InvokeFuture<T> {
    type Output = Result<T>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match Pin::new(&mut self.handle).poll(cx) {
            Poll::Ready(Ok(result)) => Poll::Ready(result),
            Poll::Ready(Err(err)) => Poll::Ready(Err(Error::new(ErrorKind::Cancelled, err))),
            Poll::Pending => Poll::Pending,
        }
    }
}

/// What `invoke` hands back, by invoke type and dispatch type.
#[derive(Debug)]
pub enum Invoked<T> {
    /// sync unicast
    Value(T),
    /// async unicast
    Future(InvokeFuture<T>),
    /// sync multicast
    Outcomes(Vec<ChannelOutcome<T>>),
    /// async multicast
    PendingOutcomes(InvokeFuture<Vec<ChannelOutcome<T>>>),
}

impl<T> Invoked<T> {
    /// The single reply of a unicast call, waiting for it if needed.
    pub async fn value(self) -> Result<T> {
        match self {
            Invoked::Value(v) => Ok(v),
            Invoked::Future(f) => f.await,
            Invoked::Outcomes(_) | Invoked::PendingOutcomes(_) => Err(Error::new(
                ErrorKind::WrongDispatchType,
                "a multicast call has no single reply",
            )),
        }
    }

    /// The per-channel view of a multicast call, waiting for it if needed.
    pub async fn outcomes(self) -> Result<Vec<ChannelOutcome<T>>> {
        match self {
            Invoked::Outcomes(o) => Ok(o),
            Invoked::PendingOutcomes(f) => f.await,
            Invoked::Value(_) | Invoked::Future(_) => Err(Error::new(
                ErrorKind::WrongDispatchType,
                "a unicast call has no per-channel outcomes",
            )),
        }
    }
}

/// Client-side stand-in for a remote service.
///
/// Built by `ProxyBuilder`; its configuration never changes afterwards, so one
/// proxy can be shared by any number of concurrent callers.
pub struct InvocationProxy {
    dispatcher: Arc<Dispatcher>,
    failover: Option<Arc<FailoverStrategy>>,
    methods: MethodTable,
    invoke_type: InvokeType,
    dispatch_type: DispatchType,
    runtime: Handle,
}

impl InvocationProxy {
    pub(crate) fn new(
        dispatcher: Arc<Dispatcher>,
        failover: Option<Arc<FailoverStrategy>>,
        methods: MethodTable,
        invoke_type: InvokeType,
        dispatch_type: DispatchType,
        runtime: Handle,
    ) -> Self {
        InvocationProxy {
            dispatcher,
            failover,
            methods,
            invoke_type,
            dispatch_type,
            runtime,
        }
    }

    pub fn service(&self) -> &ServiceDescriptor {
        self.dispatcher.service()
    }

    pub fn dispatcher(&self) -> &Arc<Dispatcher> {
        &self.dispatcher
    }

    pub fn methods(&self) -> &MethodTable {
        &self.methods
    }

    pub fn invoke_type(&self) -> InvokeType {
        self.invoke_type
    }

    pub fn dispatch_type(&self) -> DispatchType {
        self.dispatch_type
    }

    /// Calls a registered method.
    ///
    /// A synchronous unicast call returns its error here; an asynchronous one
    /// reports it through the returned future. Multicast failures only show up
    /// in the per-channel outcomes.
    pub async fn invoke<A, R>(&self, method: &str, args: A) -> Result<Invoked<R>>
    where
        A: Param + 'static,
        R: Param + Default + 'static,
    {
        self.methods.lookup::<A, R>(method)?;
        let envelope = RequestEnvelope::new(
            self.dispatcher.service().clone(),
            method,
            Arc::new(args),
            type_name::<R>(),
        );

        let invoked = match (self.invoke_type, self.dispatch_type) {
            (InvokeType::Sync, DispatchType::Unicast) => {
                Invoked::Value(self.unicast::<R>(&envelope).await?)
            }
            (InvokeType::Async, DispatchType::Unicast) => {
                let dispatcher = self.dispatcher.clone();
                let handle = self
                    .runtime
                    .spawn(async move { dispatcher.dispatch::<R>(&envelope).await });
                Invoked::Future(InvokeFuture::new(handle))
            }
            (InvokeType::Sync, DispatchType::Multicast) => {
                Invoked::Outcomes(self.dispatcher.multicast::<R>(&envelope).await)
            }
            (InvokeType::Async, DispatchType::Multicast) => {
                let dispatcher = self.dispatcher.clone();
                let handle = self
                    .runtime
                    .spawn(async move { Ok(dispatcher.multicast::<R>(&envelope).await) });
                Invoked::PendingOutcomes(InvokeFuture::new(handle))
            }
        };
        Ok(invoked)
    }

    /// `invoke` for callers outside the runtime. Panics when called from
    /// within an asynchronous context, like `Handle::block_on`.
    pub fn invoke_blocking<A, R>(&self, method: &str, args: A) -> Result<Invoked<R>>
    where
        A: Param + 'static,
        R: Param + Default + 'static,
    {
        self.runtime.block_on(self.invoke(method, args))
    }

    async fn unicast<R>(&self, envelope: &RequestEnvelope) -> Result<R>
    where
        R: Param + Default + 'static,
    {
        match &self.failover {
            Some(failover) => failover.dispatch(envelope).await,
            None => self.dispatcher.dispatch(envelope).await,
        }
    }
}
