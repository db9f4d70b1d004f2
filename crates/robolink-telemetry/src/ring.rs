/// Fixed-capacity FIFO that overwrites its oldest entry when full.
#[derive(Debug, Clone)]
pub struct RingBuffer<T> {
    slots: Vec<Option<T>>,
    write_index: usize,
    len: usize,
}

impl<T> RingBuffer<T> {
    /// A capacity of zero is raised to one.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        let mut slots = Vec::with_capacity(capacity);
        slots.resize_with(capacity, || None);
        Self {
            slots,
            write_index: 0,
            len: 0,
        }
    }

    /// Insert `item`, returning the entry it evicted, if any.
    pub fn push(&mut self, item: T) -> Option<T> {
        let evicted = self.slots[self.write_index].replace(item);
        self.write_index = (self.write_index + 1) % self.capacity();
        if self.len < self.capacity() {
            self.len += 1;
        }
        evicted
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn is_full(&self) -> bool {
        self.len == self.capacity()
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Slot the next push will write to.
    pub fn write_index(&self) -> usize {
        self.write_index
    }

    /// Entries from oldest to newest.
    pub fn iter(&self) -> impl Iterator<Item = &T> + '_ {
        let cap = self.capacity();
        let start = (self.write_index + cap - self.len) % cap;
        (0..self.len).filter_map(move |i| self.slots[(start + i) % cap].as_ref())
    }

    /// The `n` newest entries, oldest first.
    pub fn recent(&self, n: usize) -> impl Iterator<Item = &T> + '_ {
        self.iter().skip(self.len.saturating_sub(n))
    }

    /// Drop every entry and rewind the write index.
    pub fn clear(&mut self) {
        self.slots.iter_mut().for_each(|slot| *slot = None);
        self.write_index = 0;
        self.len = 0;
    }
}
