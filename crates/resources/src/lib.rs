//! On-demand store for the typed, numbered assets of SCI-era game data:
//! locating resources through versioned map files, decoding the packed
//! volume records they point at, overriding individual resources with loose
//! patch files, and keeping decoded copies in a bounded LRU cache.
//!
//! The public surface is [`ResourceManager`]: open a game directory, then
//! [`ResourceManager::find`] decoded resource bytes by [`ResourceId`].

mod cache;
mod compression;
mod error;
mod file;
mod ids;
mod manager;
mod source;
mod version;

pub use error::Error;
pub use ids::{ResourceId, ResourceType, TypeConversionError};
pub use manager::{ResourceManager, ResourceManagerOptions};
pub use version::ResVersion;
