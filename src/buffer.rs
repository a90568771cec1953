//! Reference-counted, pool-backed sample buffers (component A).
//!
//! Each channel is dispatched cooperatively on a single thread, so the pool
//! is plain `Rc<RefCell<_>>` rather than anything atomic: storage is handed
//! out on `acquire`, released back to the pool when the last user calls
//! `decrement_user_count`, and never shared across threads.

use std::cell::RefCell;
use std::rc::Rc;

use num_complex::Complex32;

/// Pool of reusable sample storage, generic over the sample type.
#[derive(Clone)]
pub struct BufferPool<T> {
    free: Rc<RefCell<Vec<Vec<T>>>>,
}

impl<T: Clone + Default> BufferPool<T> {
    pub fn new() -> Self {
        Self {
            free: Rc::new(RefCell::new(Vec::new())),
        }
    }

    /// Check out a buffer of `len` samples, zero-filled, with a user count of 1.
    pub fn acquire(&self, len: usize) -> ReusableBuffer<T> {
        let mut storage = self.free.borrow_mut().pop().unwrap_or_default();
        storage.clear();
        storage.resize(len, T::default());
        ReusableBuffer {
            pool: Rc::clone(&self.free),
            samples: Some(storage),
            user_count: 1,
        }
    }

    /// Number of blocks currently idle in the pool, for diagnostics and tests.
    pub fn idle_count(&self) -> usize {
        self.free.borrow().len()
    }
}

impl<T: Clone + Default> Default for BufferPool<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// A sample buffer checked out from a `BufferPool`, released back to it once
/// every stage that incremented the user count has decremented it again.
///
/// Calling `samples`/`samples_mut` after the buffer has been released is a
/// programmer error, not a recoverable condition, and panics.
pub struct ReusableBuffer<T> {
    pool: Rc<RefCell<Vec<Vec<T>>>>,
    samples: Option<Vec<T>>,
    user_count: u32,
}

impl<T> ReusableBuffer<T> {
    /// A downstream stage that will hold onto this buffer independently of
    /// its producer must call this before the producer releases its own hold.
    pub fn increment_user_count(&mut self) {
        debug_assert!(self.samples.is_some(), "increment on a released buffer");
        self.user_count += 1;
    }

    /// Release this stage's hold on the buffer. Returns the storage to the
    /// pool once the last user has called this.
    pub fn decrement_user_count(&mut self) {
        debug_assert!(self.samples.is_some(), "decrement on a released buffer");
        debug_assert!(self.user_count > 0, "user count underflow");
        self.user_count -= 1;
        if self.user_count == 0 {
            if let Some(storage) = self.samples.take() {
                self.pool.borrow_mut().push(storage);
            }
        }
    }

    pub fn user_count(&self) -> u32 {
        self.user_count
    }

    pub fn sample_count(&self) -> usize {
        self.samples.as_ref().map(Vec::len).unwrap_or(0)
    }

    pub fn samples(&self) -> &[T] {
        self.samples
            .as_deref()
            .expect("access to a released ReusableBuffer")
    }

    pub fn samples_mut(&mut self) -> &mut [T] {
        self.samples
            .as_deref_mut()
            .expect("access to a released ReusableBuffer")
    }
}

pub type ComplexBuffer = ReusableBuffer<Complex32>;
pub type RealBuffer = ReusableBuffer<f32>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn acquired_buffer_is_zero_filled_at_requested_length() {
        let pool: BufferPool<f32> = BufferPool::new();
        let buf = pool.acquire(128);
        assert_eq!(buf.sample_count(), 128);
        assert!(buf.samples().iter().all(|&s| s == 0.0));
        assert_eq!(buf.user_count(), 1);
    }

    #[test]
    fn storage_returns_to_pool_when_last_user_releases() {
        let pool: BufferPool<f32> = BufferPool::new();
        assert_eq!(pool.idle_count(), 0);
        let mut buf = pool.acquire(64);
        buf.increment_user_count();
        assert_eq!(buf.user_count(), 2);
        buf.decrement_user_count();
        assert_eq!(pool.idle_count(), 0);
        buf.decrement_user_count();
        assert_eq!(pool.idle_count(), 1);
    }

    #[test]
    fn reacquired_storage_is_cleared_of_prior_contents() {
        let pool: BufferPool<f32> = BufferPool::new();
        let mut first = pool.acquire(4);
        first.samples_mut().copy_from_slice(&[1.0, 2.0, 3.0, 4.0]);
        first.decrement_user_count();
        let second = pool.acquire(4);
        assert_eq!(second.samples(), &[0.0, 0.0, 0.0, 0.0]);
    }

    #[test]
    #[should_panic]
    fn access_after_release_panics() {
        let pool: BufferPool<f32> = BufferPool::new();
        let mut buf = pool.acquire(4);
        buf.decrement_user_count();
        buf.samples();
    }
}
