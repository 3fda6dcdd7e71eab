//! Fixed-capacity bucket pools and the containers built on them.
//!
//! A [`FixedPool`] reserves `N` equally sized, equally aligned buckets once
//! and hands them out and back with a bitmap, never touching the system
//! allocator again. [`TypedPool`] runs constructors and destructors on top of
//! it, and [`RbTree`] / [`StaticMap`] keep their nodes in a typed pool, so
//! their capacity is fixed at compile time.
//!
//! ```
//! use bucket_tree::RbTree;
//!
//! let mut tree: RbTree<u32, 4> = RbTree::new();
//! tree.insert(3).unwrap();
//! tree.insert(1).unwrap();
//! assert_eq!(tree.search(&3), Some(&3));
//! assert_eq!(tree.search(&2), None);
//! ```
//!
//! # Heap use
//!
//! Pools do use the heap, but only in their constructors: the bucket arena
//! (`N * stride` bytes) plus an `N`-bit occupancy bitmap, and for a
//! [`TypedPool`] (and so every tree and map) a second `N`-bit bitmap.
//! Nothing allocates afterwards, including `allocate`, `deallocate`, tree
//! inserts and `clear`. On targets where the heap must stay untouched at run
//! time, create pools and trees during start-up.
//!
//! None of the types synchronise internally; share them across threads or
//! interrupt contexts only behind the caller's own lock.

pub(crate) mod collections;
pub(crate) mod memory;

// pools
pub use memory::bucket_pool::{
    Align1, Align2, Align4, Align8, Align16, Align32, Align64, Align128, Bucket, BucketAllocator,
    BucketShape, BytePool, FixedPool,
};
pub use memory::typed_pool::TypedPool;

// containers
pub use collections::key_pair::KeyPair;
pub use collections::rb_tree::{Iter, RbTree};
pub use collections::static_map::StaticMap;

// stats
pub use memory::stats::{PoolStats, snapshot as stats_snapshot};

// errors
pub use memory::error::{AllocError, CapacityError};

#[cfg(test)]
mod proptests;
