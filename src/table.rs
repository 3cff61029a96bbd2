use std::ops::Index;

use log::debug;

use crate::utils::MyHash;

#[derive(Clone, Default)]
struct Entry<T> {
    value: T,
    next: usize,
    occupied: bool,
}

/// Hash-consing table: chained buckets over a growable slab of entries.
///
/// Index 0 is a permanently occupied sentry and doubles as the end-of-chain
/// marker. Indices of live entries never move, so handles stay valid across
/// [`Table::retain`].
pub struct Table<T> {
    data: Vec<Entry<T>>,
    buckets: Vec<usize>,
    bitmask: u64,
    /// Dropped cells available for reuse.
    free: Vec<usize>,
    /// Number of occupied cells (sentry excluded).
    real_size: usize,
}

impl<T> Table<T>
where
    T: Default,
{
    /// Create a new table with `2^bits` buckets.
    pub fn new(bits: usize) -> Self {
        assert!(bits <= 31, "Table bits should be in the range 0..=31");

        let sentry = Entry {
            occupied: true,
            ..Entry::default()
        };
        let buckets_size = 1usize << bits;

        Self {
            data: vec![sentry],
            buckets: vec![0; buckets_size],
            bitmask: (buckets_size - 1) as u64,
            free: Vec::new(),
            real_size: 0,
        }
    }

    /// Allocate a new cell in the table and return its index.
    ///
    /// The cell is not linked into any bucket.
    pub fn alloc(&mut self) -> usize {
        self.real_size += 1;
        if let Some(index) = self.free.pop() {
            self.data[index].occupied = true;
            self.data[index].next = 0;
            return index;
        }
        self.data.push(Entry {
            occupied: true,
            ..Entry::default()
        });
        self.data.len() - 1
    }
}

impl<T> Table<T> {
    /// Number of allocated slots, including dropped ones awaiting reuse.
    pub fn capacity(&self) -> usize {
        self.data.len() - 1
    }
    /// Get the number of occupied cells.
    pub fn real_size(&self) -> usize {
        self.real_size
    }
    pub fn num_buckets(&self) -> usize {
        self.buckets.len()
    }

    /// Get the reference to the value at the given index.
    pub fn value(&self, index: usize) -> &T {
        assert_ne!(index, 0, "Index is 0");
        debug_assert!(self.data[index].occupied, "Index {} is not occupied", index);
        &self.data[index].value
    }

    pub fn is_occupied(&self, index: usize) -> bool {
        self.data.get(index).is_some_and(|e| e.occupied)
    }

    /// Drop the value at the given index. The caller unlinks it from its bucket.
    fn drop(&mut self, index: usize) {
        assert_ne!(index, 0, "Index is 0");
        self.data[index].occupied = false;
        self.data[index].next = 0;
        self.free.push(index);
        self.real_size -= 1;
    }
}

impl<T> Table<T>
where
    T: MyHash + Eq + Default,
{
    fn bucket_index(&self, value: &T) -> usize {
        (value.hash() & self.bitmask) as usize
    }

    /// Put a value into the table and return its index.
    ///
    /// Equal values always resolve to the same index.
    pub fn put(&mut self, value: T) -> usize {
        let bucket = self.bucket_index(&value);
        let mut index = self.buckets[bucket];

        while index != 0 {
            if self.data[index].value == value {
                return index;
            }
            index = self.data[index].next;
        }

        let i = self.alloc();
        self.data[i].value = value;
        self.data[i].next = self.buckets[bucket];
        self.buckets[bucket] = i;

        if self.real_size > 2 * self.buckets.len() && self.buckets.len() < (1 << 31) {
            self.rehash(self.buckets.len() * 2);
        }

        i
    }

    /// Keep only the bucketed entries for which `keep` returns true.
    ///
    /// Entries that were allocated but never bucketed (the terminal) are left
    /// alone. Returns the number of dropped entries.
    pub fn retain(&mut self, keep: impl Fn(usize) -> bool) -> usize {
        let mut dropped = 0;
        for bucket in 0..self.buckets.len() {
            let mut index = self.buckets[bucket];
            let mut head = 0;
            let mut tail = 0;
            while index != 0 {
                let next = self.data[index].next;
                if keep(index) {
                    if tail == 0 {
                        head = index;
                    } else {
                        self.data[tail].next = index;
                    }
                    tail = index;
                } else {
                    self.drop(index);
                    dropped += 1;
                }
                index = next;
            }
            if tail != 0 {
                self.data[tail].next = 0;
            }
            self.buckets[bucket] = head;
        }
        dropped
    }

    fn rehash(&mut self, new_size: usize) {
        debug!("Rehashing table: {} -> {} buckets", self.buckets.len(), new_size);
        let old = std::mem::replace(&mut self.buckets, vec![0; new_size]);
        self.bitmask = (new_size - 1) as u64;
        for head in old {
            let mut index = head;
            while index != 0 {
                let next = self.data[index].next;
                let bucket = self.bucket_index(&self.data[index].value);
                self.data[index].next = self.buckets[bucket];
                self.buckets[bucket] = index;
                index = next;
            }
        }
    }
}

impl<T> Index<usize> for Table<T> {
    type Output = T;

    fn index(&self, index: usize) -> &Self::Output {
        self.value(index)
    }
}
