use std::{collections::HashMap, time::Duration};

/// Used when neither a method override nor a global default is configured.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(3000);

/// Per-method timeout lookup. Frozen once the proxy is built.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TimeoutResolver {
    default: Option<Duration>,
    methods: HashMap<String, Duration>,
}

impl TimeoutResolver {
    /// Zero durations are treated as unset.
    pub fn new(default: Option<Duration>, methods: HashMap<String, Duration>) -> Self {
        TimeoutResolver {
            default: default.filter(|d| !d.is_zero()),
            methods: methods.into_iter().filter(|(_, d)| !d.is_zero()).collect(),
        }
    }

    pub fn resolve(&self, method: &str) -> Duration {
        self.methods
            .get(method)
            .copied()
            .or(self.default)
            .unwrap_or(DEFAULT_TIMEOUT)
    }

    pub fn default_timeout(&self) -> Duration {
        self.default.unwrap_or(DEFAULT_TIMEOUT)
    }
}
