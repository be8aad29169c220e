//! Cadenza Core - Media item identity cache
//!
//! This crate keeps a single shared instance per media item id, merges
//! field updates from independent sources by certainty, and persists
//! changed items through a pluggable store.

pub mod artist;
pub mod codec;
pub mod download;
pub mod field;
pub mod item;
pub mod layout;
pub mod registry;
pub mod settings;
pub mod store;
pub mod subscription;

pub use artist::{ Artist, ArtistField };
pub use field::{ Field, FieldState, SupplyMode };
pub use item::{ ChangeEvent, ChangeListener, MediaItem };
pub use layout::{ LayoutType, MediaItemLayout };
pub use registry::{ Registry, RegistryError };
pub use store::{ ItemKey, ItemStore, JsonFileStore, MemoryStore, StoreError };
pub use subscription::{ ApiError, SubscriptionApi, SubscriptionError };
