//! pdrive-cache: local metadata cache of the drive client
//!
//! All access goes through a [`CacheContext`], which serializes blocks over a
//! transactional [`CacheStore`] and notifies observers after each commit.
//!
//! ```text
//! MovedNodesUpdateRepository ─┐
//! AlbumsUpdater / AlbumFactory ├─perform─► CacheStore ──save_or_rollback──► CacheBackend
//! NodeCryptoMaterialReader ───┘                 │                          (json | memory | rocksdb)
//!                                               └─ generation ─► FetchedResultsObserver
//!                                                                   └─► PhotosShareStateObserver
//! ```

pub mod album;
pub mod backend;
pub mod context;
pub mod crypto_material;
pub mod moved_nodes;
pub mod observer;
pub mod photos_share;
pub mod records;
pub mod store;

pub use album::{AlbumFactory, AlbumsUpdater};
pub use backend::{open_backend, CacheBackend, JsonFileBackend, MemoryBackend};
#[cfg(feature = "rocksdb")]
pub use backend::RocksDbBackend;
pub use context::CacheContext;
pub use crypto_material::{read_node_in, NodeCryptoMaterial, NodeCryptoMaterialReader};
pub use moved_nodes::MovedNodesUpdateRepository;
pub use observer::FetchedResultsObserver;
pub use photos_share::{PhotosShareState, PhotosShareStateObserver, PhotosShareStateStream};
pub use records::{
    AlbumListingRecord, AlbumRecord, NodeKind, NodeRecord, PhotoListingRecord, RevisionRecord,
    ShareRecord, VolumeRecord,
};
pub use store::{CacheStore, CacheTables};
