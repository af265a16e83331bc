pub use courier_client::*;
pub use courier_derive::*;
pub use courier_protocol::*;
