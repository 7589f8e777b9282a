use std::num::NonZeroUsize;

use crate::record::{Batch, Record};

/// Splits `records` into consecutive batches of at most `max_batch_size` records.
///
/// Order is preserved: concatenating the batches yields the input. Every batch except possibly the last holds exactly
/// `max_batch_size` records, and empty input yields no batches at all.
pub fn partition(records: Vec<Record>, max_batch_size: NonZeroUsize) -> Vec<Batch> {
    let max_batch_size = max_batch_size.get();
    let mut batches = Vec::with_capacity(records.len().div_ceil(max_batch_size));

    let mut records = records.into_iter().peekable();
    while records.peek().is_some() {
        batches.push(Batch::new(records.by_ref().take(max_batch_size).collect()));
    }

    batches
}
