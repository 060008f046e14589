/// Helper macro for locking items.
///
/// A poisoned mutex still hands out its guard: every structure guarded this way is
/// published atomically (snapshot swap or single store), so a panicking writer cannot
/// leave it half-updated.
///
/// ```rust, ignore
///  let mut data = lock!(my_mutex);
///  data.some_field = 42;
/// ```
macro_rules! lock {
    ($lock:expr) => {
        $lock
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    };
}

/// Helper macro for locking items where contention must surface as an error
///
/// ```rust, ignore
///  let data = try_lock!(my_mutex)?;
/// ```
macro_rules! try_lock {
    ($lock:expr) => {
        $lock.lock().map_err(|_| crate::Error::LockError)
    };
}
