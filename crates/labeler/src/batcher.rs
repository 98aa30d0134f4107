use crate::types::Record;
use std::num::NonZeroUsize;
use std::slice::Chunks;

pub const DEFAULT_BATCH_SIZE: NonZeroUsize = match NonZeroUsize::new(30) {
    Some(size) => size,
    None => unreachable!(),
};

/// Contiguous, ordered group of records sent in one request
#[derive(Debug, Clone, Copy)]
pub struct Batch<'a> {
    /// 1-based position among the batches of a task
    pub index: usize,
    pub total: usize,
    pub records: &'a [Record],
}

impl<'a> Batch<'a> {
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'a, Record> {
        self.records.iter()
    }
}

/// Lazy iterator over the batches of a record list
#[derive(Debug, Clone)]
pub struct Batches<'a> {
    chunks: Chunks<'a, Record>,
    next_index: usize,
    total: usize,
}

/// Split `records` into batches of `batch_size`, preserving order. The last
/// batch may be shorter.
pub fn batches(records: &[Record], batch_size: NonZeroUsize) -> Batches<'_> {
    Batches {
        chunks: records.chunks(batch_size.get()),
        next_index: 1,
        total: records.len().div_ceil(batch_size.get()),
    }
}

impl<'a> Iterator for Batches<'a> {
    type Item = Batch<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        let records = self.chunks.next()?;
        let batch = Batch {
            index: self.next_index,
            total: self.total,
            records,
        };
        self.next_index += 1;
        Some(batch)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.chunks.size_hint()
    }
}

impl ExactSizeIterator for Batches<'_> {}
