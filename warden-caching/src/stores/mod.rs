//! Cache store implementations

#[cfg(feature = "moka")]
pub mod moka;
#[cfg(feature = "ttl")]
pub mod ttl;

#[cfg(feature = "moka")]
pub use moka::{MokaCache, MokaCacheBuilder};
#[cfg(feature = "ttl")]
pub use ttl::TtlCache;
