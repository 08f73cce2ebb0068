//! Lock aliases used across the workspace.
//!
//! Everything goes through `parking_lot`: no poisoning, and guards are cheap
//! enough to take on every queue operation.

/// A synchronous read-write lock.
pub type SyncRwLock<T> = parking_lot::RwLock<T>;
/// A synchronous mutex.
pub type SyncMutex<T> = parking_lot::Mutex<T>;
