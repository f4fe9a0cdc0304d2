use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HeapError {
    #[error("heap is full (capacity {capacity})")]
    Full { capacity: usize },
    #[error("key {key} is outside the key space of {key_space}")]
    KeyOutOfRange { key: usize, key_space: usize },
    #[error("key {key} is already queued")]
    AlreadyQueued { key: usize },
}

const NOT_QUEUED: usize = usize::MAX;

/// Binary min-heap over small integer keys with O(1) membership checks.
///
/// Every key maps to its slot in `items`, so a queued key can have its priority
/// changed in place without a linear search.
#[derive(Debug, Clone)]
pub struct IndexedHeap<P> {
    items: Vec<(usize, P)>,
    slots: Vec<usize>,
    capacity: usize,
}

impl<P: Ord + Copy> IndexedHeap<P> {
    pub fn new(key_space: usize, capacity: usize) -> Self {
        Self {
            items: Vec::with_capacity(capacity.min(key_space)),
            slots: vec![NOT_QUEUED; key_space],
            capacity,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn contains(&self, key: usize) -> bool {
        self.slots.get(key).is_some_and(|slot| *slot != NOT_QUEUED)
    }

    pub fn priority(&self, key: usize) -> Option<P> {
        let slot = *self.slots.get(key)?;
        if slot == NOT_QUEUED {
            return None;
        }
        Some(self.items[slot].1)
    }

    pub fn push(&mut self, key: usize, priority: P) -> Result<(), HeapError> {
        if key >= self.slots.len() {
            return Err(HeapError::KeyOutOfRange {
                key,
                key_space: self.slots.len(),
            });
        }
        if self.contains(key) {
            return Err(HeapError::AlreadyQueued { key });
        }
        if self.items.len() >= self.capacity {
            return Err(HeapError::Full {
                capacity: self.capacity,
            });
        }
        let slot = self.items.len();
        self.items.push((key, priority));
        self.slots[key] = slot;
        self.sift_up(slot);
        Ok(())
    }

    pub fn pop(&mut self) -> Option<(usize, P)> {
        if self.items.is_empty() {
            return None;
        }
        let last = self.items.len() - 1;
        self.swap(0, last);
        let (key, priority) = self.items.pop()?;
        self.slots[key] = NOT_QUEUED;
        if !self.items.is_empty() {
            self.sift_down(0);
        }
        Some((key, priority))
    }

    /// Replace the priority of a queued key and restore heap order.
    pub fn update(&mut self, key: usize, priority: P) -> Result<(), HeapError> {
        let Some(&slot) = self.slots.get(key) else {
            return Err(HeapError::KeyOutOfRange {
                key,
                key_space: self.slots.len(),
            });
        };
        if slot == NOT_QUEUED {
            return self.push(key, priority);
        }
        let previous = self.items[slot].1;
        self.items[slot].1 = priority;
        if priority < previous {
            self.sift_up(slot);
        } else {
            self.sift_down(slot);
        }
        Ok(())
    }

    pub fn clear(&mut self) {
        for (key, _) in self.items.drain(..) {
            self.slots[key] = NOT_QUEUED;
        }
    }

    fn sift_up(&mut self, mut slot: usize) {
        while slot > 0 {
            let parent = (slot - 1) / 2;
            if self.items[slot].1 >= self.items[parent].1 {
                break;
            }
            self.swap(slot, parent);
            slot = parent;
        }
    }

    fn sift_down(&mut self, mut slot: usize) {
        let len = self.items.len();
        loop {
            let left = slot * 2 + 1;
            let right = left + 1;
            let mut smallest = slot;
            if left < len && self.items[left].1 < self.items[smallest].1 {
                smallest = left;
            }
            if right < len && self.items[right].1 < self.items[smallest].1 {
                smallest = right;
            }
            if smallest == slot {
                break;
            }
            self.swap(slot, smallest);
            slot = smallest;
        }
    }

    fn swap(&mut self, a: usize, b: usize) {
        if a == b {
            return;
        }
        self.items.swap(a, b);
        self.slots[self.items[a].0] = a;
        self.slots[self.items[b].0] = b;
    }
}
