//! Provider Routing
//!
//! The engine never talks to a metadata service directly. Hosts inject one
//! [`ProviderClient`](bridge_traits::ProviderClient) per service and
//! [`MultiProviderSearch`] decides which of them to ask, in what order, and
//! for how long.

pub mod multi;

pub use multi::{MultiProviderSearch, ProviderCallConfig};
