//! A MapReduce (lite) anagram sorter.
//!
//! Words are read one per line, grouped into anagram classes by their
//! sorted-character signature, and written out largest class first. The
//! job runs as two chained MapReduce stages on a local, multi-threaded
//! standalone engine (see [`standalone::engine`]).

use bytes::Bytes;
use std::hash::Hasher;

pub mod error;
pub mod standalone;
pub mod utils;
pub mod workload;

/////////////////////////////////////////////////////////////////////////////
// MapReduce application types
/////////////////////////////////////////////////////////////////////////////

/// The output of an application map function.
///
/// There are 2 layers of [`anyhow::Result`]s here. The outer layer
/// accounts for errors that arise while creating the iterator.
/// The inner layer accounts for errors that occur during iteration.
///
/// This accomodates both batch (all keys emitted at once) and lazy
/// (keys only emitted when the iterator is consumed) map operations.
pub type MapOutput = anyhow::Result<Box<dyn Iterator<Item = anyhow::Result<KeyValue>>>>;

/// A map function takes a key-value pair and returns an iterator that
/// yields new key-value pairs.
pub type MapFn = fn(kv: KeyValue) -> MapOutput;

/// A combine function takes in a key and an iterator over the values seen
/// for that key within one input split. It returns a single partial value.
///
/// Combiners cannot change the key: the engine re-attaches the original key
/// to the combined value before the shuffle.
pub type CombineFn =
    fn(key: Bytes, values: Box<dyn Iterator<Item = Bytes> + '_>) -> anyhow::Result<Bytes>;

/// A reduce function takes in a key and an iterator over values for that
/// key. It returns an [`anyhow::Result`] containing a single output record,
/// which may carry a different key than the one it was called with.
pub type ReduceFn =
    fn(key: Bytes, values: Box<dyn Iterator<Item = Bytes> + '_>) -> anyhow::Result<KeyValue>;

/// How the output of a stage's map tasks is spread over reducers.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Partitioning {
    /// Hash keys over the job's configured number of reducers.
    Hashed,
    /// Send every record to one reducer, regardless of the job's setting.
    Single,
}

/// A map reduce application stage.
#[derive(Copy, Clone)]
pub struct Workload {
    pub name: &'static str,
    pub map_fn: MapFn,
    pub combine_fn: Option<CombineFn>,
    pub reduce_fn: ReduceFn,
    pub partitioning: Partitioning,
}

impl Workload {
    /// Number of reduce buckets this stage uses when the job asks for `n_reduce`.
    pub fn reducers(&self, n_reduce: u32) -> u32 {
        match self.partitioning {
            Partitioning::Hashed => n_reduce.max(1),
            Partitioning::Single => 1,
        }
    }
}

/////////////////////////////////////////////////////////////////////////////
// Key-value pairs
/////////////////////////////////////////////////////////////////////////////

/// A single key-value pair.
#[derive(Clone, Eq, PartialEq, Hash, Debug)]
pub struct KeyValue {
    /// The key.
    pub key: Bytes,
    /// The value.
    pub value: Bytes,
}

impl KeyValue {
    /// Construct a new key-value pair from the given key and value.
    pub fn new(key: Bytes, value: Bytes) -> Self {
        Self { key, value }
    }

    /// Get the key of this key-value pair.
    ///
    /// This method is cheap, since [`Bytes`] are cheaply cloneable.
    #[inline]
    pub fn key(&self) -> Bytes {
        self.key.clone()
    }

    /// Get the value of this key-value pair.
    ///
    /// This method is cheap, since [`Bytes`] are cheaply cloneable.
    #[inline]
    pub fn value(&self) -> Bytes {
        self.value.clone()
    }

    /// Consumes the key-value pair and returns the value.
    #[inline]
    pub fn into_value(self) -> Bytes {
        self.value
    }
}

/// Hashes an intermediate key. Compute a reduce bucket for a given key
/// by calculating `ihash(key) % n_reduce`.
pub fn ihash(key: &[u8]) -> u32 {
    let mut hasher = fnv::FnvHasher::with_key(0);
    hasher.write(key);
    // masked to 31 bits, always fits
    (hasher.finish() & 0x7fffffff) as u32
}
