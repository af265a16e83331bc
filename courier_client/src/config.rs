use std::{collections::HashMap, str::FromStr, time::Duration};

use courier_protocol::{Error, Result, SerializeType, ServiceDescriptor};
use serde::Deserialize;
use tokio::{fs, io::AsyncReadExt};

use super::{failover::FailMode, proxy::DispatchType, proxy::InvokeType, selector::SelectMode};

/// Consumer settings as they appear in a TOML file.
///
/// ```toml
/// [service]
/// name = "Arith"
///
/// [consumer]
/// invoke = "async"
/// fail_mode = "failover"
/// timeout_millis = 1000
/// provider_addresses = "127.0.0.1:8972,127.0.0.1:8973"
///
/// [methods.Mul]
/// timeout_millis = 50
/// ```
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ConsumerConfig {
    pub service: ServiceSection,
    #[serde(default)]
    pub consumer: ConsumerSection,
    #[serde(default)]
    pub methods: HashMap<String, MethodSection>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ServiceSection {
    pub name: String,
    #[serde(default)]
    pub group: Option<String>,
    #[serde(default)]
    pub version: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ConsumerSection {
    pub serializer: Option<String>,
    pub select_mode: Option<String>,
    pub invoke: Option<String>,
    pub dispatch: Option<String>,
    pub fail_mode: Option<String>,
    pub retries: Option<u32>,
    pub timeout_millis: Option<u64>,
    pub overall_deadline_millis: Option<u64>,
    pub wait_for_available_millis: Option<u64>,
    pub provider_addresses: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct MethodSection {
    #[serde(default)]
    pub timeout_millis: Option<u64>,
}

impl ConsumerConfig {
    pub fn from_toml_str(s: &str) -> Result<Self> {
        toml::from_str::<ConsumerConfig>(s).map_err(|err| Error::config(err))
    }

    pub async fn from_path(path: &str) -> Result<Self> {
        let mut file = fs::File::open(path)
            .await
            .map_err(|err| Error::config(format!("{}: {}", path, err)))?;
        let mut s = String::new();
        file.read_to_string(&mut s)
            .await
            .map_err(|err| Error::config(format!("{}: {}", path, err)))?;
        Self::from_toml_str(&s)
    }

    pub fn service_descriptor(&self) -> ServiceDescriptor {
        let mut service = ServiceDescriptor::new(&self.service.name);
        if let Some(group) = &self.service.group {
            service = service.with_group(group);
        }
        if let Some(version) = &self.service.version {
            service = service.with_version(version);
        }
        service
    }

    pub fn serializer(&self) -> Result<Option<SerializeType>> {
        parse_field("serializer", &self.consumer.serializer)
    }

    pub fn select_mode(&self) -> Result<Option<SelectMode>> {
        parse_field("select_mode", &self.consumer.select_mode)
    }

    pub fn invoke_type(&self) -> Result<Option<InvokeType>> {
        parse_field("invoke", &self.consumer.invoke)
    }

    pub fn dispatch_type(&self) -> Result<Option<DispatchType>> {
        parse_field("dispatch", &self.consumer.dispatch)
    }

    pub fn fail_mode(&self) -> Result<Option<FailMode>> {
        parse_field("fail_mode", &self.consumer.fail_mode)
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.consumer.timeout_millis.map(Duration::from_millis)
    }

    pub fn overall_deadline(&self) -> Option<Duration> {
        self.consumer
            .overall_deadline_millis
            .map(Duration::from_millis)
    }

    pub fn method_timeouts(&self) -> impl Iterator<Item = (&str, Duration)> {
        self.methods.iter().filter_map(|(name, method)| {
            method
                .timeout_millis
                .map(|ms| (name.as_str(), Duration::from_millis(ms)))
        })
    }
}

fn parse_field<T: FromStr>(field: &str, value: &Option<String>) -> Result<Option<T>> {
    match value {
        None => Ok(None),
        Some(s) => s
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|_| Error::config(format!("invalid {}: {:?}", field, s))),
    }
}
