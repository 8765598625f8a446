//! Platform API entity and service implementations.

mod activities;
mod addresses;
mod comments;
mod environments;
mod payment_sources;
mod regions;
mod two_factor;

pub use activities::*;
pub use addresses::*;
pub use comments::*;
pub use environments::*;
pub use payment_sources::*;
pub use regions::*;
pub use two_factor::*;
