use std::{
    collections::{HashMap, HashSet},
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc, PoisonError, RwLock,
    },
    time::Duration,
};

use async_trait::async_trait;
use courier_protocol::{Channel, ServiceDescriptor, UnresolvedAddress};
use log::{debug, info};
use tokio::time;

/// Live connections to the providers of each service.
///
/// Pools are owned by the transport side; the dispatch path only reads them.
pub trait ChannelPool: Send + Sync {
    fn channels_for(&self, service: &ServiceDescriptor) -> Vec<Channel>;
    fn is_available(&self, channel: &Channel) -> bool;
}

/// Setup-time helper that blocks until a service has at least one usable channel.
#[async_trait]
pub trait ConnectionManager: Send + Sync {
    async fn wait_for_available(&self, timeout: Duration) -> bool;
}

/// A pool built from an explicit list of provider addresses.
#[derive(Debug, Default)]
pub struct StaticChannelPool {
    next_id: AtomicU64,
    servers: RwLock<HashMap<ServiceDescriptor, Vec<Channel>>>,
    down: RwLock<HashSet<u64>>,
}

impl StaticChannelPool {
    pub fn new() -> Self {
        Default::default()
    }

    pub fn add_provider(
        &self,
        service: &ServiceDescriptor,
        address: UnresolvedAddress,
        weight: u32,
    ) -> Channel {
        let channel = Channel::new(
            self.next_id.fetch_add(1, Ordering::SeqCst),
            address,
            weight,
        );
        debug!("add provider {} for {}", channel, service);
        self.servers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(service.clone())
            .or_insert_with(Vec::new)
            .push(channel.clone());
        channel
    }

    /// Replaces the provider list of `service`, keeping channels whose address
    /// is still listed.
    pub fn update_servers(
        &self,
        service: &ServiceDescriptor,
        addresses: &[UnresolvedAddress],
    ) -> Vec<Channel> {
        let mut servers = self.servers.write().unwrap_or_else(PoisonError::into_inner);
        let current = servers.remove(service).unwrap_or_default();
        let updated: Vec<Channel> = addresses
            .iter()
            .map(|addr| {
                current
                    .iter()
                    .find(|c| c.address() == addr)
                    .cloned()
                    .unwrap_or_else(|| {
                        Channel::new(self.next_id.fetch_add(1, Ordering::SeqCst), addr.clone(), 1)
                    })
            })
            .collect();
        info!("{} providers now: {}", service, updated.len());
        servers.insert(service.clone(), updated.clone());
        updated
    }

    pub fn set_available(&self, channel: &Channel, available: bool) {
        let mut down = self.down.write().unwrap_or_else(PoisonError::into_inner);
        if available {
            down.remove(&channel.id());
        } else {
            down.insert(channel.id());
        }
    }
}

impl ChannelPool for StaticChannelPool {
    fn channels_for(&self, service: &ServiceDescriptor) -> Vec<Channel> {
        self.servers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(service)
            .cloned()
            .unwrap_or_default()
    }

    fn is_available(&self, channel: &Channel) -> bool {
        !self
            .down
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(&channel.id())
    }
}

const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Waits on a pool by polling it for a usable channel of one service.
pub struct PoolConnectionManager {
    pool: Arc<dyn ChannelPool>,
    service: ServiceDescriptor,
}

impl PoolConnectionManager {
    pub fn new(pool: Arc<dyn ChannelPool>, service: ServiceDescriptor) -> Self {
        PoolConnectionManager { pool, service }
    }

    fn any_available(&self) -> bool {
        self.pool
            .channels_for(&self.service)
            .iter()
            .any(|c| self.pool.is_available(c))
    }
}

#[async_trait]
impl ConnectionManager for PoolConnectionManager {
    async fn wait_for_available(&self, timeout: Duration) -> bool {
        let wait = async {
            while !self.any_available() {
                time::sleep(POLL_INTERVAL).await;
            }
        };
        time::timeout(timeout, wait).await.is_ok()
    }
}
