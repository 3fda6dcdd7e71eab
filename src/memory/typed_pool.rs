use super::bucket_pool::FixedPool;
use super::error::{AllocError, CapacityError};
use fixedbitset::FixedBitSet;
use std::fmt;
use std::marker::PhantomData;
use std::mem::MaybeUninit;
use std::ops::{Index, IndexMut};
use std::ptr::{self, NonNull};

/// A [`FixedPool`] whose buckets hold values of type `T`.
///
/// Values are moved into a bucket by [`store`](Self::store),
/// [`emplace`](Self::emplace) or [`insert`](Self::insert) and are dropped when
/// their bucket is deallocated, when the pool is cleared, or when the pool
/// itself is dropped.
///
/// Buckets can be named either by pointer (as handed out by `store`) or by
/// index (as handed out by `insert`); [`index_of`](Self::index_of) converts
/// the former into the latter.
pub struct TypedPool<T, const N: usize> {
    pool: FixedPool<T, N>,
    /// Bit set = bucket holds an initialised `T`
    init_mask: FixedBitSet,
    _owns: PhantomData<T>,
}

impl<T, const N: usize> TypedPool<T, N> {
    #[must_use]
    pub fn new() -> Self {
        Self {
            pool: FixedPool::new(),
            init_mask: FixedBitSet::with_capacity(N),
            _owns: PhantomData,
        }
    }

    /// Reserve a bucket without putting a value in it.
    ///
    /// The bucket counts as allocated but is not dropped or readable until
    /// [`assume_init`](Self::assume_init) is called for it.
    ///
    /// # Errors
    ///
    /// Returns [`AllocError::Exhausted`] if every bucket is allocated.
    pub fn allocate(&mut self) -> Result<NonNull<MaybeUninit<T>>, AllocError> {
        let index = self.pool.reserve_index()?;
        Ok(self.pool.bucket_ptr(index))
    }

    /// Mark a bucket returned by [`allocate`](Self::allocate) as initialised.
    ///
    /// Returns `None` if `ptr` is not an allocated bucket of this pool.
    ///
    /// # Safety
    /// A valid `T` must have been written to `ptr`.
    pub unsafe fn assume_init(&mut self, ptr: NonNull<MaybeUninit<T>>) -> Option<NonNull<T>> {
        let index = self.pool.index_of(ptr.as_ptr().cast::<u8>())?;
        if !self.pool.is_live(index) {
            return None;
        }
        self.init_mask.insert(index);
        Some(ptr.cast())
    }

    /// Move `value` into a free bucket and return its index.
    ///
    /// # Errors
    ///
    /// Returns the value inside a [`CapacityError`] if the pool is full.
    pub fn insert(&mut self, value: T) -> Result<usize, CapacityError<T>> {
        let Ok(index) = self.pool.reserve_index() else {
            return Err(CapacityError::new(value, N));
        };

        // Safety: freshly reserved bucket inside the arena, nothing else points at it.
        unsafe {
            self.pool.bucket_ptr(index).as_ptr().write(MaybeUninit::new(value));
        }
        self.init_mask.insert(index);

        Ok(index)
    }

    /// Move `value` into a free bucket and return a pointer to it.
    ///
    /// The pointer stays valid until the bucket is deallocated or the pool
    /// is cleared or dropped.
    ///
    /// # Errors
    ///
    /// Returns the value inside a [`CapacityError`] if the pool is full.
    pub fn store(&mut self, value: T) -> Result<NonNull<T>, CapacityError<T>> {
        let index = self.insert(value)?;
        Ok(self.pool.bucket_ptr(index).cast())
    }

    /// Construct a value in place. `make` only runs once a bucket is reserved.
    ///
    /// # Errors
    ///
    /// Returns [`AllocError::Exhausted`] if every bucket is allocated.
    pub fn emplace(&mut self, make: impl FnOnce() -> T) -> Result<NonNull<T>, AllocError> {
        let index = self.pool.reserve_index()?;
        let slot = self.pool.bucket_ptr(index);
        // Safety: freshly reserved bucket, nothing else points at it.
        unsafe {
            slot.as_ptr().write(MaybeUninit::new(make()));
        }
        self.init_mask.insert(index);

        Ok(slot.cast())
    }

    /// Drop the value at `ptr` and free its bucket.
    ///
    /// Pointers that are not the start of an allocated bucket of this pool are
    /// ignored. A bucket reserved by [`allocate`](Self::allocate) but never
    /// initialised is freed without dropping anything.
    pub fn deallocate(&mut self, ptr: *const T) {
        if let Some(index) = self.pool.index_of(ptr.cast()) {
            self.drop_slot(index);
            self.pool.release_index(index);
        }
    }

    /// Move the value at `index` out of the pool and free its bucket.
    pub fn remove(&mut self, index: usize) -> Option<T> {
        if !self.init_mask.contains(index) {
            return None;
        }
        self.init_mask.set(index, false);
        // Safety: the init bit guaranteed a live value; clearing it first means
        // it will never be read or dropped again.
        let value = unsafe { self.pool.bucket_ptr(index).as_ptr().read().assume_init() };
        self.pool.release_index(index);
        Some(value)
    }

    #[must_use]
    pub fn get(&self, index: usize) -> Option<&T> {
        if !self.init_mask.contains(index) {
            return None;
        }
        // Safety: init bit set, so the bucket holds a valid T.
        Some(unsafe { self.pool.bucket_ptr(index).as_ref().assume_init_ref() })
    }

    #[must_use]
    pub fn get_mut(&mut self, index: usize) -> Option<&mut T> {
        if !self.init_mask.contains(index) {
            return None;
        }
        // Safety: init bit set and `&mut self` gives exclusive access.
        Some(unsafe { self.pool.bucket_ptr(index).as_mut().assume_init_mut() })
    }

    /// Index of the bucket that `ptr` points at, if it belongs to this pool.
    #[must_use]
    pub fn index_of(&self, ptr: *const T) -> Option<usize> {
        self.pool.index_of(ptr.cast())
    }

    /// Whether bucket `index` holds a value.
    #[must_use]
    pub fn contains(&self, index: usize) -> bool {
        self.init_mask.contains(index)
    }

    /// Values in bucket order, with their indices.
    pub fn iter(&self) -> impl Iterator<Item = (usize, &T)> + '_ {
        self.init_mask.ones().map(|index| {
            // Safety: init bit set, so the bucket holds a valid T.
            (index, unsafe {
                self.pool.bucket_ptr(index).as_ref().assume_init_ref()
            })
        })
    }

    /// Drop every value and free every bucket.
    pub fn clear(&mut self) {
        self.drop_all();
        self.pool.reset();
    }

    fn drop_slot(&mut self, index: usize) {
        if self.init_mask.contains(index) {
            self.init_mask.set(index, false);
            // Safety: the bucket held a valid T and its init bit is now clear.
            unsafe { ptr::drop_in_place(self.pool.bucket_ptr(index).as_ptr().cast::<T>()) };
        }
    }

    fn drop_all(&mut self) {
        for index in self.init_mask.ones() {
            // Safety: init bit set, so the bucket holds a valid T.
            unsafe { ptr::drop_in_place(self.pool.bucket_ptr(index).as_ptr().cast::<T>()) };
        }
        self.init_mask.clear();
    }

    #[must_use]
    pub fn available(&self) -> usize {
        self.pool.available()
    }

    #[must_use]
    pub fn reserved(&self) -> usize {
        self.pool.reserved()
    }

    #[must_use]
    pub const fn capacity(&self) -> usize {
        N
    }

    #[must_use]
    pub fn is_full(&self) -> bool {
        self.pool.is_full()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pool.is_empty()
    }
}

impl<T, const N: usize> Default for TypedPool<T, N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T, const N: usize> Drop for TypedPool<T, N> {
    fn drop(&mut self) {
        self.drop_all();
    }
}

impl<T, const N: usize> Index<usize> for TypedPool<T, N> {
    type Output = T;

    fn index(&self, index: usize) -> &T {
        match self.get(index) {
            Some(value) => value,
            None => panic!("no value in bucket {index}"),
        }
    }
}

impl<T, const N: usize> IndexMut<usize> for TypedPool<T, N> {
    fn index_mut(&mut self, index: usize) -> &mut T {
        match self.get_mut(index) {
            Some(value) => value,
            None => panic!("no value in bucket {index}"),
        }
    }
}

impl<T: fmt::Debug, const N: usize> fmt::Debug for TypedPool<T, N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.iter()).finish()
    }
}
