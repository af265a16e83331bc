use std::{fmt, str::FromStr, sync::Arc};

use serde::{Deserialize, Serialize};

use crate::{Error, ErrorKind, Result};

pub const DEFAULT_GROUP: &str = "default";
pub const DEFAULT_VERSION: &str = "1.0.0";

/// Identifies a logical service independent of where its providers run.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ServiceDescriptor {
    pub name: String,
    pub group: String,
    pub version: String,
}

impl ServiceDescriptor {
    pub fn new(name: &str) -> Self {
        ServiceDescriptor {
            name: name.to_owned(),
            group: DEFAULT_GROUP.to_owned(),
            version: DEFAULT_VERSION.to_owned(),
        }
    }

    pub fn with_group(mut self, group: &str) -> Self {
        self.group = group.to_owned();
        self
    }

    pub fn with_version(mut self, version: &str) -> Self {
        self.version = version.to_owned();
        self
    }
}

impl fmt::Display for ServiceDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}:{}", self.group, self.name, self.version)
    }
}

/// A provider address as written in configuration, `host:port`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct UnresolvedAddress {
    pub host: String,
    pub port: u16,
}

impl UnresolvedAddress {
    pub fn new(host: &str, port: u16) -> Self {
        UnresolvedAddress {
            host: host.to_owned(),
            port,
        }
    }

    /// Parses a comma separated list such as `"10.0.0.1:18090,10.0.0.2:18090"`.
    pub fn parse_list(s: &str) -> Result<Vec<UnresolvedAddress>> {
        let addresses = s
            .split(',')
            .map(str::trim)
            .filter(|item| !item.is_empty())
            .map(str::parse)
            .collect::<Result<Vec<UnresolvedAddress>>>()?;
        if addresses.is_empty() {
            return Err(Error::config("provider addresses could not be empty"));
        }
        Ok(addresses)
    }
}

impl FromStr for UnresolvedAddress {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let mut items = s.rsplitn(2, ':');
        let port = items.next().unwrap_or_default();
        let host = items
            .next()
            .filter(|host| !host.is_empty())
            .ok_or_else(|| Error::new(ErrorKind::Config, format!("missing host in {:?}", s)))?;
        let port = port
            .parse::<u16>()
            .map_err(|err| Error::new(ErrorKind::Config, format!("bad port in {:?}: {}", s, err)))?;
        Ok(UnresolvedAddress::new(host, port))
    }
}

impl fmt::Display for UnresolvedAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

#[derive(Debug)]
struct ChannelInner {
    id: u64,
    address: UnresolvedAddress,
    weight: u32,
}

/// Handle to one established connection to a provider.
///
/// Owned by a channel pool; clones are cheap and refer to the same connection.
/// Two handles are equal when they name the same connection id.
#[derive(Debug, Clone)]
pub struct Channel {
    inner: Arc<ChannelInner>,
}

impl Channel {
    pub fn new(id: u64, address: UnresolvedAddress, weight: u32) -> Self {
        Channel {
            inner: Arc::new(ChannelInner {
                id,
                address,
                weight,
            }),
        }
    }

    pub fn id(&self) -> u64 {
        self.inner.id
    }

    pub fn address(&self) -> &UnresolvedAddress {
        &self.inner.address
    }

    pub fn weight(&self) -> u32 {
        self.inner.weight
    }
}

impl PartialEq for Channel {
    fn eq(&self, other: &Self) -> bool {
        self.inner.id == other.inner.id
    }
}

impl Eq for Channel {}

impl std::hash::Hash for Channel {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.inner.id.hash(state)
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}@{}", self.inner.id, self.inner.address)
    }
}
