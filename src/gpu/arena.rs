use std::cell::RefCell;
use std::collections::HashMap;
use std::ops::{Deref, DerefMut};
use std::rc::{Rc, Weak};

use bytemuck::Pod;
use tracing::debug;

struct PoolInner<T> {
    label: &'static str,
    free: HashMap<usize, Vec<Vec<T>>>,
    allocated: usize,
}

/// Scratch buffers grouped by power-of-two size class.
///
/// `acquire` hands out a [`PooledBuffer`] lease. Dropping the lease returns the
/// storage to its size class, so buffers are recycled on every exit path,
/// including leases parked inside pending readbacks.
pub struct BufferPool<T: Pod> {
    inner: Rc<RefCell<PoolInner<T>>>,
}

impl<T: Pod> BufferPool<T> {
    pub fn new(label: &'static str) -> Self {
        Self {
            inner: Rc::new(RefCell::new(PoolInner {
                label,
                free: HashMap::new(),
                allocated: 0,
            })),
        }
    }

    pub fn size_class(count: usize) -> usize {
        count.max(1).next_power_of_two()
    }

    /// Leases a zeroed buffer holding at least `count` elements.
    pub fn acquire(&self, count: usize) -> PooledBuffer<T> {
        let class = Self::size_class(count);
        let mut inner = self.inner.borrow_mut();
        let data = match inner.free.get_mut(&class).and_then(|list| list.pop()) {
            Some(mut data) => {
                data.fill(T::zeroed());
                data
            }
            None => {
                inner.allocated += 1;
                debug!(
                    "{} pool: allocating buffer of {} elements ({} total)",
                    inner.label, class, inner.allocated
                );
                vec![T::zeroed(); class]
            }
        };

        PooledBuffer {
            data,
            len: count,
            pool: Rc::downgrade(&self.inner),
        }
    }

    /// Buffers created over the pool's lifetime.
    pub fn allocated(&self) -> usize {
        self.inner.borrow().allocated
    }

    /// Buffers currently sitting unused in the pool.
    pub fn available(&self) -> usize {
        self.inner.borrow().free.values().map(Vec::len).sum()
    }

    /// Buffers currently leased out.
    pub fn in_use(&self) -> usize {
        self.allocated() - self.available()
    }
}

/// Lease on a pool buffer. Derefs to the first `len` elements.
pub struct PooledBuffer<T: Pod> {
    data: Vec<T>,
    len: usize,
    pool: Weak<RefCell<PoolInner<T>>>,
}

impl<T: Pod> PooledBuffer<T> {
    pub fn capacity(&self) -> usize {
        self.data.len()
    }
}

impl<T: Pod> Deref for PooledBuffer<T> {
    type Target = [T];

    fn deref(&self) -> &Self::Target {
        &self.data[..self.len]
    }
}

impl<T: Pod> DerefMut for PooledBuffer<T> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.data[..self.len]
    }
}

impl<T: Pod> Drop for PooledBuffer<T> {
    fn drop(&mut self) {
        if let Some(pool) = self.pool.upgrade() {
            let data = std::mem::take(&mut self.data);
            let class = data.len();
            pool.borrow_mut().free.entry(class).or_default().push(data);
        }
    }
}
