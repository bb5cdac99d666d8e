//! Index-addressed object store with free-slot recycling.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};

/// Highest index a collection accepts from outside input.
pub const MAX_INDEX: u32 = u16::MAX as u32;

/// Shared handle to an object owned by a [`Collection`].
pub type Handle<T> = Arc<RwLock<T>>;

/// Object that knows the index it was stored under.
pub trait GameObject: Send + Sync + 'static {
    /// Index of the object within its collection.
    fn index(&self) -> u32;
}

/// Errors raised when an index does not resolve to a live object.
#[derive(Clone, Copy, Debug, PartialEq, Eq, thiserror::Error)]
pub enum CollectionError {
    /// No object lives at the index.
    #[error("no {kind} at index {index}")]
    Missing {
        /// Collection name.
        kind: &'static str,
        /// Requested index.
        index: u32,
    },
    /// The index lies above [`MAX_INDEX`].
    #[error("{kind} index {index} exceeds {max}", max = MAX_INDEX)]
    OutOfRange {
        /// Collection name.
        kind: &'static str,
        /// Rejected index.
        index: u32,
    },
}

#[derive(Debug)]
struct Slots<T> {
    objects: BTreeMap<u32, Handle<T>>,
    first_free: u32,
    free: BTreeSet<u32>,
}

impl<T> Default for Slots<T> {
    fn default() -> Self {
        Self {
            objects: BTreeMap::new(),
            first_free: 0,
            free: BTreeSet::new(),
        }
    }
}

/// Slot allocator owning every object of one kind.
///
/// Objects are created by the factory passed to [`Collection::new`] and live
/// behind [`Handle`]s. The slot table sits behind one coarse lock that is only
/// held while indices and handles are copied, never while object contents are
/// read or written.
pub struct Collection<T> {
    kind: &'static str,
    factory: fn(u32) -> T,
    slots: Mutex<Slots<T>>,
}

impl<T: GameObject> Collection<T> {
    /// Creates an empty collection building objects with `factory`.
    #[must_use]
    pub fn new(kind: &'static str, factory: fn(u32) -> T) -> Self {
        Self {
            kind,
            factory,
            slots: Mutex::new(Slots::default()),
        }
    }

    /// Name used in logs and errors.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        self.kind
    }

    /// Creates an object at the lowest free index.
    pub fn allocate(&self) -> Handle<T> {
        let mut slots = self.slots.lock();
        let index = match slots.free.pop_first() {
            Some(index) => index,
            None => {
                let index = slots.first_free;
                slots.first_free += 1;
                index
            }
        };
        let handle = Arc::new(RwLock::new((self.factory)(index)));
        let _ = slots.objects.insert(index, Arc::clone(&handle));
        handle
    }

    /// Returns the object at `index`, creating it when absent.
    ///
    /// Indices skipped between the previous high-water mark and `index` are
    /// recorded as free. Indices above [`MAX_INDEX`] are refused.
    pub fn get_or_insert(&self, index: u32) -> Result<Handle<T>, CollectionError> {
        self.check_index(index)?;
        let mut slots = self.slots.lock();
        if let Some(handle) = slots.objects.get(&index) {
            return Ok(Arc::clone(handle));
        }
        if index >= slots.first_free {
            let skipped = slots.first_free..index;
            slots.free.extend(skipped);
            slots.first_free = index + 1;
        } else {
            let _ = slots.free.remove(&index);
        }
        let handle = Arc::new(RwLock::new((self.factory)(index)));
        let _ = slots.objects.insert(index, Arc::clone(&handle));
        Ok(handle)
    }

    /// Fails with [`CollectionError::OutOfRange`] above [`MAX_INDEX`].
    pub fn check_index(&self, index: u32) -> Result<(), CollectionError> {
        if index > MAX_INDEX {
            return Err(CollectionError::OutOfRange {
                kind: self.kind,
                index,
            });
        }
        Ok(())
    }

    /// Removes the object at `index`, returning whether one was stored.
    pub fn erase(&self, index: u32) -> bool {
        let mut slots = self.slots.lock();
        if slots.objects.remove(&index).is_none() {
            return false;
        }
        if index.checked_add(1) == Some(slots.first_free) {
            slots.first_free = index;
        } else {
            let _ = slots.free.insert(index);
        }
        true
    }

    /// Object at `index`, if any.
    #[must_use]
    pub fn get(&self, index: u32) -> Option<Handle<T>> {
        self.slots.lock().objects.get(&index).cloned()
    }

    /// Object at `index`, or an error naming the collection.
    pub fn require(&self, index: u32) -> Result<Handle<T>, CollectionError> {
        self.get(index).ok_or(CollectionError::Missing {
            kind: self.kind,
            index,
        })
    }

    /// Reports whether an object lives at `index`.
    #[must_use]
    pub fn contains(&self, index: u32) -> bool {
        self.slots.lock().objects.contains_key(&index)
    }

    /// Number of live objects.
    #[must_use]
    pub fn len(&self) -> usize {
        self.slots.lock().objects.len()
    }

    /// Reports whether the collection holds no objects.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.slots.lock().objects.is_empty()
    }

    /// Live indices in ascending order.
    #[must_use]
    pub fn indices(&self) -> Vec<u32> {
        self.slots.lock().objects.keys().copied().collect()
    }

    /// Snapshot of every live handle in ascending index order.
    #[must_use]
    pub fn to_list(&self) -> Vec<Handle<T>> {
        self.slots.lock().objects.values().cloned().collect()
    }

    /// Recycled indices in ascending order.
    #[must_use]
    pub fn free_indices(&self) -> Vec<u32> {
        self.slots.lock().free.iter().copied().collect()
    }

    /// Replaces the free set, recomputing the high-water mark.
    ///
    /// The mark ends one past the highest live or free index, or at zero for
    /// an empty store. A free index above [`MAX_INDEX`] leaves the store
    /// untouched.
    pub fn set_free_indices<I>(&self, free: I) -> Result<(), CollectionError>
    where
        I: IntoIterator<Item = u32>,
    {
        let free: BTreeSet<u32> = free.into_iter().collect();
        if let Some(&highest) = free.last() {
            self.check_index(highest)?;
        }
        let mut slots = self.slots.lock();
        slots.free = free;
        let highest_live = slots.objects.keys().next_back().copied();
        let highest_free = slots.free.last().copied();
        slots.first_free = highest_live
            .max(highest_free)
            .map_or(0, |highest| highest.saturating_add(1));
        Ok(())
    }

    /// Index the next sequential allocation would use.
    #[must_use]
    pub fn first_free(&self) -> u32 {
        self.slots.lock().first_free
    }

    /// Removes every object and free slot.
    pub fn clear(&self) {
        *self.slots.lock() = Slots::default();
    }
}

impl<T> fmt::Debug for Collection<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let slots = self.slots.lock();
        f.debug_struct("Collection")
            .field("kind", &self.kind)
            .field("len", &slots.objects.len())
            .field("first_free", &slots.first_free)
            .field("free", &slots.free)
            .finish()
    }
}
