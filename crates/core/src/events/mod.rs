pub mod builder;
pub mod event;
pub mod facet;

pub use builder::*;
pub use event::*;
pub use facet::*;
