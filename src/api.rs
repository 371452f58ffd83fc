//! Sisu API access: a disk cache of raw responses plus a blocking HTTP
//! client that consults it before touching the network.

pub mod cache;
pub mod client;

pub use cache::{Cache, CacheError};
pub use client::{ApiError, SisuApi, SisuClient};
