pub mod builder;
pub mod config;
pub mod discovery;
pub mod dispatcher;
pub mod failover;
pub mod hook;
pub mod method;
pub mod proxy;
pub mod selector;
pub mod timeout;
pub mod transport;

#[cfg(test)]
mod testing;

pub use builder::*;
pub use config::*;
pub use discovery::*;
pub use dispatcher::*;
pub use failover::*;
pub use hook::*;
pub use method::*;
pub use proxy::*;
pub use selector::*;
pub use timeout::*;
pub use transport::*;
