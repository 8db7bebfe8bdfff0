pub mod sink_forwarder;
pub mod worker;

pub use sink_forwarder::*;
pub use worker::*;
