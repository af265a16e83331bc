pub mod call;
pub mod error;
pub mod message;
pub mod param;
pub mod serializer;
pub mod service;

pub use call::*;
pub use error::*;
pub use message::*;
pub use param::*;
pub use serializer::*;
pub use service::*;
