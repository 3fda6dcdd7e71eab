pub(crate) mod bucket_pool;
pub(crate) mod error;
pub(crate) mod stats;
pub(crate) mod typed_pool;

#[cfg(test)]
pub(crate) static TEST_MUTEX: std::sync::RwLock<()> = std::sync::RwLock::new(());
