//! 批次划分 - 业务能力层

use std::num::NonZeroUsize;

use crate::models::{Batch, Chunk};

/// 按固定大小把有序分块划分为批次
///
/// 保持分块顺序，最后一批可以更小；每个分块恰好出现在一个批次中。
pub struct Batcher {
    batch_size: NonZeroUsize,
}

impl Batcher {
    pub fn new(batch_size: NonZeroUsize) -> Self {
        Self { batch_size }
    }

    pub fn batch(&self, chunks: &[Chunk]) -> Vec<Batch> {
        chunks
            .chunks(self.batch_size.get())
            .enumerate()
            .map(|(batch_index, group)| Batch {
                batch_index,
                chunk_indices: group.iter().map(|c| c.index).collect(),
            })
            .collect()
    }
}
