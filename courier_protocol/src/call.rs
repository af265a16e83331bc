use std::{
    collections::{hash_map::Entry, HashMap},
    future::Future,
    pin::Pin,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc, Mutex, MutexGuard, PoisonError,
    },
    task::{Context, Poll},
};

use futures::FutureExt;
use tokio::sync::oneshot;

use crate::{Error, ErrorKind, Response, Result};

type CallMap = HashMap<u64, Waiter>;

#[derive(Debug)]
struct Waiter {
    token: u64,
    tx: oneshot::Sender<Result<Response>>,
}

/// Outstanding requests on one connection, keyed by correlation id.
///
/// A transport registers each request before writing it and completes it when
/// the matching response frame arrives, in whatever order frames arrive.
#[derive(Debug, Default, Clone)]
pub struct PendingCalls {
    calls: Arc<Mutex<CallMap>>,
    next_token: Arc<AtomicU64>,
}

impl PendingCalls {
    pub fn new() -> Self {
        Default::default()
    }

    fn lock(&self) -> MutexGuard<'_, CallMap> {
        self.calls.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Fails with `DuplicateSeq` while another call still waits on `seq`;
    /// the waiting call is left untouched.
    pub fn register(&self, seq: u64) -> Result<CallFuture> {
        let (tx, rx) = oneshot::channel();
        let token = self.next_token.fetch_add(1, Ordering::Relaxed);
        match self.lock().entry(seq) {
            Entry::Occupied(_) => {
                return Err(Error::new(
                    ErrorKind::DuplicateSeq,
                    format!("call {} is already in flight", seq),
                ))
            }
            Entry::Vacant(slot) => {
                slot.insert(Waiter { token, tx });
            }
        }
        Ok(CallFuture {
            seq,
            token,
            rx,
            calls: self.calls.clone(),
        })
    }

    /// Delivers a response. Returns `false` when nobody waits for `seq` any more,
    /// e.g. the caller already timed out; the response is dropped.
    pub fn complete(&self, seq: u64, response: Response) -> bool {
        self.finish(seq, Ok(response))
    }

    pub fn fail(&self, seq: u64, err: Error) -> bool {
        self.finish(seq, Err(err))
    }

    /// Fails every outstanding call, used when the connection goes away.
    pub fn fail_all(&self, err: Error) -> usize {
        let drained: Vec<_> = self.lock().drain().collect();
        let count = drained.len();
        for (_, waiter) in drained {
            let _ = waiter.tx.send(Err(err.clone()));
        }
        count
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn finish(&self, seq: u64, result: Result<Response>) -> bool {
        let waiter = self.lock().remove(&seq);
        match waiter {
            Some(waiter) => waiter.tx.send(result).is_ok(),
            None => false,
        }
    }
}

/// Resolves with the response registered under one correlation id.
///
/// Dropping it unregisters the id, so a late response is discarded. An entry
/// registered again under the same id by someone else is left alone.
#[derive(Debug)]
pub struct CallFuture {
    seq: u64,
    token: u64,
    rx: oneshot::Receiver<Result<Response>>,
    calls: Arc<Mutex<CallMap>>,
}

impl CallFuture {
    pub fn seq(&self) -> u64 {
        self.seq
    }
}

impl Future for CallFuture {
    type Output = Result<Response>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match self.rx.poll_unpin(cx) {
            Poll::Ready(Ok(result)) => Poll::Ready(result),
            Poll::Ready(Err(_)) => Poll::Ready(Err(Error::connection_lost(format!(
                "call {} dropped by transport",
                self.seq
            )))),
            Poll::Pending => Poll::Pending,
        }
    }
}

impl Drop for CallFuture {
    fn drop(&mut self) {
        let mut calls = self.calls.lock().unwrap_or_else(PoisonError::into_inner);
        if calls.get(&self.seq).map(|w| w.token) == Some(self.token) {
            calls.remove(&self.seq);
        }
    }
}
