use std::fmt;

/// Reasons a bucket could not be handed out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AllocError {
    /// The request does not fit in a single bucket.
    TooLarge { size: usize, bucket_size: usize },
    /// Every bucket is already allocated.
    Exhausted { capacity: usize },
}

impl fmt::Display for AllocError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AllocError::TooLarge { size, bucket_size } => write!(
                f,
                "Allocation too large for bucket: size {size} exceeds bucket size {bucket_size}"
            ),
            AllocError::Exhausted { capacity } => {
                write!(f, "Pool exhausted: all {capacity} buckets are allocated")
            }
        }
    }
}

impl std::error::Error for AllocError {}

/// A value that could not be stored because its container is full.
///
/// The rejected value is handed back so the caller keeps ownership of it.
#[derive(Clone, PartialEq, Eq)]
pub struct CapacityError<T> {
    value: T,
    capacity: usize,
}

impl<T> CapacityError<T> {
    pub(crate) fn new(value: T, capacity: usize) -> Self {
        Self { value, capacity }
    }

    /// Capacity of the container that rejected the value.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Recover the rejected value.
    pub fn into_inner(self) -> T {
        self.value
    }

    pub(crate) fn map<U>(self, f: impl FnOnce(T) -> U) -> CapacityError<U> {
        CapacityError {
            value: f(self.value),
            capacity: self.capacity,
        }
    }
}

// Manual impl so `T` does not need to be `Debug`.
impl<T> fmt::Debug for CapacityError<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CapacityError")
            .field("capacity", &self.capacity)
            .finish_non_exhaustive()
    }
}

impl<T> fmt::Display for CapacityError<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Container full: capacity of {} exhausted", self.capacity)
    }
}

impl<T> std::error::Error for CapacityError<T> {}

impl<T> From<CapacityError<T>> for AllocError {
    fn from(e: CapacityError<T>) -> Self {
        AllocError::Exhausted {
            capacity: e.capacity,
        }
    }
}
