use std::sync::atomic::{AtomicUsize, Ordering};

use courier_protocol::{Channel, Error, ErrorKind, RequestEnvelope, Result};
use rand::{distributions::WeightedIndex, prelude::*};
use strum_macros::{Display, EnumIter, EnumString};

use super::discovery::ChannelPool;

#[derive(Debug, Copy, Clone, Display, PartialEq, Eq, EnumIter, EnumString)]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum SelectMode {
    //RandomSelect is selecting randomly
    #[strum(serialize = "random_select", serialize = "random")]
    RandomSelect,
    //RoundRobin is selecting by round robin
    RoundRobin,
    //WeightedRoundRobin is selecting by round robin over channel weights
    WeightedRoundRobin,
    //WeightedRandom is selecting randomly with probability proportional to weight
    WeightedRandom,
}

impl Default for SelectMode {
    fn default() -> Self {
        SelectMode::RoundRobin
    }
}

impl SelectMode {
    pub fn selector(self) -> Box<dyn Selector> {
        match self {
            SelectMode::RandomSelect => Box::new(RandomSelector),
            SelectMode::RoundRobin => Box::new(RoundRobinSelector::new()),
            SelectMode::WeightedRoundRobin => Box::new(WeightedRoundRobinSelector::new()),
            SelectMode::WeightedRandom => Box::new(WeightedRandomSelector),
        }
    }
}

/// A selection policy over the channels that are eligible for one call.
///
/// Called concurrently from every calling task, so any cursor it keeps must be
/// updated atomically.
pub trait Selector: Send + Sync {
    fn select<'a>(&self, candidates: &'a [Channel], envelope: &RequestEnvelope)
        -> Option<&'a Channel>;
}

#[derive(Debug, Default)]
pub struct RandomSelector;

impl Selector for RandomSelector {
    fn select<'a>(&self, candidates: &'a [Channel], _: &RequestEnvelope) -> Option<&'a Channel> {
        candidates.choose(&mut thread_rng())
    }
}

#[derive(Debug, Default)]
pub struct RoundRobinSelector {
    cursor: AtomicUsize,
}

impl RoundRobinSelector {
    pub fn new() -> Self {
        Default::default()
    }
}

impl Selector for RoundRobinSelector {
    fn select<'a>(&self, candidates: &'a [Channel], _: &RequestEnvelope) -> Option<&'a Channel> {
        if candidates.is_empty() {
            return None;
        }
        let i = self.cursor.fetch_add(1, Ordering::Relaxed);
        candidates.get(i % candidates.len())
    }
}

/// Round robin where a channel of weight `w` takes `w` consecutive turns per cycle.
/// A weight of zero counts as one.
#[derive(Debug, Default)]
pub struct WeightedRoundRobinSelector {
    cursor: AtomicUsize,
}

impl WeightedRoundRobinSelector {
    pub fn new() -> Self {
        Default::default()
    }
}

impl Selector for WeightedRoundRobinSelector {
    fn select<'a>(&self, candidates: &'a [Channel], _: &RequestEnvelope) -> Option<&'a Channel> {
        if candidates.is_empty() {
            return None;
        }
        let turns = |c: &Channel| c.weight().max(1) as usize;
        let total: usize = candidates.iter().map(turns).sum();
        let mut pos = self.cursor.fetch_add(1, Ordering::Relaxed) % total;
        candidates.iter().find(|c| {
            let w = turns(*c);
            if pos < w {
                true
            } else {
                pos -= w;
                false
            }
        })
    }
}

#[derive(Debug, Default)]
pub struct WeightedRandomSelector;

impl Selector for WeightedRandomSelector {
    fn select<'a>(&self, candidates: &'a [Channel], _: &RequestEnvelope) -> Option<&'a Channel> {
        let mut rng = thread_rng();
        match WeightedIndex::new(candidates.iter().map(|c| c.weight())) {
            Ok(dist) => candidates.get(dist.sample(&mut rng)),
            // empty, or every weight is zero
            Err(_) => candidates.choose(&mut rng),
        }
    }
}

/// Picks one healthy channel for a call under a configurable policy.
pub struct LoadBalancer {
    selector: Box<dyn Selector>,
}

impl LoadBalancer {
    pub fn new(selector: Box<dyn Selector>) -> Self {
        LoadBalancer { selector }
    }

    /// Selects among the pool's available channels for the envelope's service,
    /// never returning one listed in `excluding`.
    pub fn select(
        &self,
        pool: &dyn ChannelPool,
        envelope: &RequestEnvelope,
        excluding: &[Channel],
    ) -> Result<Channel> {
        let candidates: Vec<Channel> = pool
            .channels_for(envelope.service())
            .into_iter()
            .filter(|c| pool.is_available(c) && !excluding.contains(c))
            .collect();

        self.selector
            .select(&candidates, envelope)
            .cloned()
            .ok_or_else(|| {
                Error::new(
                    ErrorKind::NoAvailableChannel,
                    format!(
                        "{} ({} excluded)",
                        envelope.service(),
                        excluding.len()
                    ),
                )
            })
    }
}

impl From<SelectMode> for LoadBalancer {
    fn from(mode: SelectMode) -> Self {
        LoadBalancer::new(mode.selector())
    }
}

#[cfg(test)]
mod tests {
    use std::{collections::HashMap, sync::Arc, thread};

    use super::*;
    use crate::discovery::StaticChannelPool;
    use courier_protocol::{ServiceDescriptor, UnresolvedAddress};

    fn envelope() -> RequestEnvelope {
        RequestEnvelope::new(ServiceDescriptor::new("Arith"), "Mul", Arc::new(1u64), "u64")
    }

    fn pool_of(weights: &[u32]) -> (StaticChannelPool, Vec<Channel>) {
        let pool = StaticChannelPool::new();
        let service = ServiceDescriptor::new("Arith");
        let channels = weights
            .iter()
            .enumerate()
            .map(|(i, w)| {
                pool.add_provider(&service, UnresolvedAddress::new("127.0.0.1", 9000 + i as u16), *w)
            })
            .collect();
        (pool, channels)
    }

    #[test]
    fn round_robin_cycles_in_order() {
        let (pool, channels) = pool_of(&[1, 1, 1]);
        let lb = LoadBalancer::from(SelectMode::RoundRobin);
        let picked: Vec<Channel> = (0..6)
            .map(|_| lb.select(&pool, &envelope(), &[]).unwrap())
            .collect();
        assert_eq!(channels[..], picked[..3]);
        assert_eq!(channels[..], picked[3..]);
    }

    #[test]
    fn excluded_channels_are_never_selected() {
        let (pool, channels) = pool_of(&[1, 1, 1]);
        for mode in &[
            SelectMode::RandomSelect,
            SelectMode::RoundRobin,
            SelectMode::WeightedRoundRobin,
            SelectMode::WeightedRandom,
        ] {
            let lb = LoadBalancer::from(*mode);
            for _ in 0..50 {
                let c = lb.select(&pool, &envelope(), &channels[..2]).unwrap();
                assert_eq!(channels[2], c, "{}", mode);
            }
        }
    }

    #[test]
    fn excluding_everything_fails() {
        let (pool, channels) = pool_of(&[1, 2]);
        let lb = LoadBalancer::from(SelectMode::RandomSelect);
        let err = lb.select(&pool, &envelope(), &channels).unwrap_err();
        assert_eq!(ErrorKind::NoAvailableChannel, err.kind());
    }

    #[test]
    fn empty_pool_fails() {
        let (pool, _) = pool_of(&[]);
        let lb = LoadBalancer::from(SelectMode::RoundRobin);
        let err = lb.select(&pool, &envelope(), &[]).unwrap_err();
        assert_eq!(ErrorKind::NoAvailableChannel, err.kind());
    }

    #[test]
    fn unhealthy_channels_are_invisible() {
        let (pool, channels) = pool_of(&[1, 1]);
        pool.set_available(&channels[0], false);
        let lb = LoadBalancer::from(SelectMode::RoundRobin);
        for _ in 0..4 {
            assert_eq!(channels[1], lb.select(&pool, &envelope(), &[]).unwrap());
        }
        pool.set_available(&channels[1], false);
        assert!(lb.select(&pool, &envelope(), &[]).is_err());
    }

    #[test]
    fn weighted_round_robin_follows_weights() {
        let (pool, channels) = pool_of(&[3, 1, 0]);
        let lb = LoadBalancer::from(SelectMode::WeightedRoundRobin);
        let mut counts: HashMap<u64, usize> = HashMap::new();
        for _ in 0..50 {
            let c = lb.select(&pool, &envelope(), &[]).unwrap();
            *counts.entry(c.id()).or_default() += 1;
        }
        assert_eq!(30, counts[&channels[0].id()]);
        assert_eq!(10, counts[&channels[1].id()]);
        assert_eq!(10, counts[&channels[2].id()]);
    }

    #[test]
    fn weighted_random_skips_zero_weights() {
        let (pool, channels) = pool_of(&[0, 5]);
        let lb = LoadBalancer::from(SelectMode::WeightedRandom);
        for _ in 0..50 {
            assert_eq!(channels[1], lb.select(&pool, &envelope(), &[]).unwrap());
        }
    }

    #[test]
    fn round_robin_is_fair_under_concurrent_callers() {
        let (pool, channels) = pool_of(&[1, 1, 1, 1]);
        let pool = Arc::new(pool);
        let lb = Arc::new(LoadBalancer::from(SelectMode::RoundRobin));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let pool = pool.clone();
                let lb = lb.clone();
                thread::spawn(move || {
                    (0..100)
                        .map(|_| lb.select(&*pool, &envelope(), &[]).unwrap().id())
                        .collect::<Vec<u64>>()
                })
            })
            .collect();

        let mut counts: HashMap<u64, usize> = HashMap::new();
        for h in handles {
            for id in h.join().unwrap() {
                *counts.entry(id).or_default() += 1;
            }
        }
        for c in &channels {
            assert_eq!(200, counts[&c.id()]);
        }
    }

    #[test]
    fn parse_select_mode() {
        assert_eq!(SelectMode::RoundRobin, "round_robin".parse().unwrap());
        assert_eq!(SelectMode::RandomSelect, "random".parse().unwrap());
        assert_eq!(SelectMode::WeightedRoundRobin, "Weighted_Round_Robin".parse().unwrap());
    }
}
