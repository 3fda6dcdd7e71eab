use super::error::AllocError;
use super::stats;
use fixedbitset::FixedBitSet;
use std::alloc::{self, Layout};
use std::fmt;
use std::marker::PhantomData;
use std::mem::{self, MaybeUninit};
use std::ptr::NonNull;

macro_rules! align_markers {
    ($($name:ident => $align:literal),* $(,)?) => {
        $(
            #[doc = concat!("Zero-sized marker forcing ", stringify!($align), "-byte bucket alignment.")]
            #[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
            #[repr(align($align))]
            pub struct $name;
        )*
    };
}

align_markers! {
    Align1 => 1,
    Align2 => 2,
    Align4 => 4,
    Align8 => 8,
    Align16 => 16,
    Align32 => 32,
    Align64 => 64,
    Align128 => 128,
}

/// Raw storage for one byte bucket: `SIZE` bytes aligned like `A`.
///
/// The size of a `Bucket` is `SIZE` rounded up to the alignment, which is
/// also the stride between neighbouring buckets in the arena.
#[repr(C)]
pub struct Bucket<const SIZE: usize, A = usize> {
    _align: [A; 0],
    _bytes: [MaybeUninit<u8>; SIZE],
}

/// Untyped pool of `N` buckets, each `SIZE` bytes aligned like `A`.
pub type BytePool<const SIZE: usize, const N: usize, A = usize> = FixedPool<Bucket<SIZE, A>, N>;

/// Bucket shapes that can serve raw byte requests.
///
/// `BYTES` is the request limit checked by [`FixedPool::allocate`]. It may be
/// smaller than `size_of::<Self>()`, which also counts alignment padding.
pub trait BucketShape {
    const BYTES: usize;
}

impl<const SIZE: usize, A> BucketShape for Bucket<SIZE, A> {
    const BYTES: usize = SIZE;
}

impl<T, const M: usize> BucketShape for [T; M] {
    const BYTES: usize = mem::size_of::<Self>();
}

macro_rules! whole_buckets {
    ($($ty:ty),* $(,)?) => {
        $(
            impl BucketShape for $ty {
                const BYTES: usize = mem::size_of::<$ty>();
            }
        )*
    };
}

whole_buckets!(u8, u16, u32, u64, u128, usize, i8, i16, i32, i64, i128, isize);

/// A pool of `N` fixed-size buckets shaped like `B`, tracked by a bitmap.
///
/// The arena is reserved once by [`FixedPool::new`] and released on drop;
/// allocating and deallocating never touch the system allocator. Bucket
/// addresses stay stable if the pool value itself is moved.
///
/// The pool never reads or writes bucket contents. Whatever is stored in a
/// bucket is the caller's business (see [`TypedPool`](super::typed_pool::TypedPool)
/// for a pool that owns typed values).
pub struct FixedPool<B, const N: usize> {
    base: NonNull<MaybeUninit<B>>,
    /// Bit set = bucket allocated
    live_mask: FixedBitSet,
    live_count: usize,
    _owns: PhantomData<MaybeUninit<B>>,
}

// Safety: FixedPool owns its arena exclusively; buckets only hold `B`.
unsafe impl<B: Send, const N: usize> Send for FixedPool<B, N> {}
// Safety: no `&self` method mutates the arena or the bitmap.
unsafe impl<B: Sync, const N: usize> Sync for FixedPool<B, N> {}

impl<B, const N: usize> FixedPool<B, N> {
    const SHAPE_OK: () = {
        assert!(N > 0, "FixedPool needs at least one bucket");
        assert!(mem::size_of::<B>() > 0, "FixedPool buckets must not be zero-sized");
    };

    /// Reserve the arena with every bucket free.
    ///
    /// This and the bitmap sized next to it are the only heap allocations a
    /// pool ever makes.
    ///
    /// # Panics
    ///
    /// Panics if `N * size_of::<B>()` overflows `isize`. Aborts through
    /// [`alloc::handle_alloc_error`] if the arena cannot be reserved.
    #[must_use]
    pub fn new() -> Self {
        let () = Self::SHAPE_OK;
        let layout = Self::arena_layout();
        // Safety: SHAPE_OK guarantees a non-zero layout size.
        let raw = unsafe { alloc::alloc(layout) };
        let Some(base) = NonNull::new(raw.cast::<MaybeUninit<B>>()) else {
            alloc::handle_alloc_error(layout);
        };

        stats::POOL_ARENA_BYTES.add(layout.size());

        Self {
            base,
            live_mask: FixedBitSet::with_capacity(N),
            live_count: 0,
            _owns: PhantomData,
        }
    }

    fn arena_layout() -> Layout {
        match Layout::array::<B>(N) {
            Ok(layout) => layout,
            Err(_) => panic!("FixedPool arena of {N} buckets overflows isize"),
        }
    }

    /// Return a bucket to the pool.
    ///
    /// Null pointers, pointers outside the arena, pointers that are not on a
    /// bucket boundary and buckets that are already free are all ignored; the
    /// bitmap is only touched for a live bucket of this pool.
    pub fn deallocate(&mut self, ptr: *const u8) {
        if ptr.is_null() {
            return;
        }
        match self.index_of(ptr) {
            Some(index) => {
                self.release_index(index);
            }
            None => stats::POOL_REJECTED_FREES.add(1),
        }
    }

    /// Index of the bucket starting at `ptr`, if `ptr` lies inside the arena
    /// exactly on a bucket boundary.
    #[must_use]
    pub fn index_of(&self, ptr: *const u8) -> Option<usize> {
        if ptr.is_null() {
            return None;
        }
        let offset = ptr.addr().checked_sub(self.base.as_ptr().addr())?;

        // Range check
        if offset >= N * Self::stride() {
            return None;
        }
        // Alignment check
        if !offset.is_multiple_of(Self::stride()) {
            return None;
        }
        Some(offset / Self::stride())
    }

    /// Whether `ptr` is the start of a currently allocated bucket.
    #[must_use]
    pub fn is_allocated(&self, ptr: *const u8) -> bool {
        self.index_of(ptr)
            .is_some_and(|index| self.live_mask.contains(index))
    }

    /// Free every bucket at once.
    pub fn reset(&mut self) {
        self.live_mask.clear();
        stats::POOL_LIVE_BUCKETS.sub(self.live_count);
        self.live_count = 0;
    }

    pub(crate) fn reserve_index(&mut self) -> Result<usize, AllocError> {
        let Some(index) = self.live_mask.zeroes().next() else {
            stats::POOL_ALLOC_FAILURES.add(1);
            return Err(AllocError::Exhausted { capacity: N });
        };

        self.live_mask.insert(index);
        self.live_count += 1;
        stats::POOL_LIVE_BUCKETS.add(1);
        debug_assert_eq!(self.live_count, self.live_mask.count_ones(..));

        Ok(index)
    }

    /// Clear the bit for `index`. Returns `false` (and changes nothing) if the
    /// bucket was not allocated.
    pub(crate) fn release_index(&mut self, index: usize) -> bool {
        if index >= N || !self.live_mask.contains(index) {
            stats::POOL_REJECTED_FREES.add(1);
            return false;
        }

        self.live_mask.set(index, false);
        self.live_count -= 1;
        stats::POOL_LIVE_BUCKETS.sub(1);
        true
    }

    #[inline]
    pub(crate) fn is_live(&self, index: usize) -> bool {
        index < N && self.live_mask.contains(index)
    }

    #[inline]
    pub(crate) fn bucket_ptr(&self, index: usize) -> NonNull<MaybeUninit<B>> {
        debug_assert!(index < N, "bucket index {index} out of range for {N} buckets");
        // Safety: index < N keeps the offset inside the arena allocation.
        unsafe { self.base.add(index) }
    }

    /// Number of free buckets.
    #[must_use]
    pub fn available(&self) -> usize {
        N - self.live_count
    }

    /// Number of allocated buckets.
    #[must_use]
    pub fn reserved(&self) -> usize {
        self.live_count
    }

    #[must_use]
    pub const fn capacity(&self) -> usize {
        N
    }

    #[must_use]
    pub fn is_full(&self) -> bool {
        self.live_count == N
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.live_count == 0
    }

    #[must_use]
    pub const fn bucket_align() -> usize {
        mem::align_of::<B>()
    }

    /// Distance in bytes between the starts of neighbouring buckets.
    #[must_use]
    pub const fn stride() -> usize {
        // Rust sizes are always a multiple of the alignment.
        mem::size_of::<B>()
    }

    /// Start of the arena (the address of bucket 0).
    #[must_use]
    pub fn base(&self) -> NonNull<u8> {
        self.base.cast()
    }
}

impl<B: BucketShape, const N: usize> FixedPool<B, N> {
    const LIMIT_OK: () = assert!(
        B::BYTES <= mem::size_of::<B>(),
        "bucket request limit exceeds the bucket itself"
    );

    /// Allocate one bucket for a block of `size` bytes.
    ///
    /// The lowest-index free bucket is always chosen.
    ///
    /// # Errors
    ///
    /// Returns [`AllocError::TooLarge`] if `size` exceeds [`Self::bucket_size`]
    /// and [`AllocError::Exhausted`] if every bucket is allocated.
    pub fn allocate(&mut self, size: usize) -> Result<NonNull<u8>, AllocError> {
        let () = Self::LIMIT_OK;
        if size > Self::bucket_size() {
            stats::POOL_ALLOC_FAILURES.add(1);
            return Err(AllocError::TooLarge {
                size,
                bucket_size: Self::bucket_size(),
            });
        }
        let index = self.reserve_index()?;
        Ok(self.bucket_ptr(index).cast())
    }

    /// Largest request a bucket can satisfy, in bytes. Padding up to
    /// [`Self::stride`] is not usable.
    #[must_use]
    pub const fn bucket_size() -> usize {
        B::BYTES
    }
}

/// Byte-level allocator interface, so pools of different shapes and
/// capacities can be driven through one `&mut dyn BucketAllocator`.
pub trait BucketAllocator {
    /// See [`FixedPool::allocate`].
    ///
    /// # Errors
    ///
    /// [`AllocError::TooLarge`] or [`AllocError::Exhausted`].
    fn allocate(&mut self, size: usize) -> Result<NonNull<u8>, AllocError>;

    /// See [`FixedPool::deallocate`].
    fn deallocate(&mut self, ptr: *const u8);

    fn available(&self) -> usize;

    fn reserved(&self) -> usize;

    fn capacity(&self) -> usize;

    /// Largest request one bucket can satisfy.
    fn bucket_size(&self) -> usize;
}

impl<B: BucketShape, const N: usize> BucketAllocator for FixedPool<B, N> {
    fn allocate(&mut self, size: usize) -> Result<NonNull<u8>, AllocError> {
        FixedPool::allocate(self, size)
    }

    fn deallocate(&mut self, ptr: *const u8) {
        FixedPool::deallocate(self, ptr);
    }

    fn available(&self) -> usize {
        FixedPool::available(self)
    }

    fn reserved(&self) -> usize {
        FixedPool::reserved(self)
    }

    fn capacity(&self) -> usize {
        N
    }

    fn bucket_size(&self) -> usize {
        B::BYTES
    }
}

impl<B, const N: usize> Default for FixedPool<B, N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<B, const N: usize> fmt::Debug for FixedPool<B, N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FixedPool")
            .field("capacity", &N)
            .field("reserved", &self.live_count)
            .field("stride", &Self::stride())
            .field("bucket_align", &Self::bucket_align())
            .finish()
    }
}

impl<B, const N: usize> Drop for FixedPool<B, N> {
    fn drop(&mut self) {
        let layout = Self::arena_layout();
        // Safety: base was returned by alloc::alloc with this exact layout.
        unsafe {
            alloc::dealloc(self.base.as_ptr().cast(), layout);
        }
        stats::POOL_ARENA_BYTES.sub(layout.size());
        stats::POOL_LIVE_BUCKETS.sub(self.live_count);
    }
}
