use rustc_hash::FxHashMap;

use super::AttachmentId;
use crate::mesh::TargetId;

/// All attachments queued against one target mesh this frame. A member's
/// `offset_in_batch` is its index in `members`; assignment order is queue
/// order, never sorted.
#[derive(Debug)]
pub struct ResolveBatch {
    pub target: TargetId,
    pub members: Vec<AttachmentId>,
}

/// Groups queued attachments into one batch per target for the current
/// frame. Membership is transient: batches are taken at resolve time and
/// the grouping starts empty next frame.
#[derive(Debug, Default)]
pub struct ResolveBatcher {
    batches: Vec<ResolveBatch>,
    by_target: FxHashMap<TargetId, usize>,
}

impl ResolveBatcher {
    pub fn begin_frame(&mut self) {
        self.batches.clear();
        self.by_target.clear();
    }

    /// Add a member to its target's batch, creating the batch on first use,
    /// and return the member's offset into the batch.
    pub fn enqueue(&mut self, target: TargetId, id: AttachmentId) -> u32 {
        let batch_index = *self.by_target.entry(target).or_insert_with(|| {
            self.batches.push(ResolveBatch {
                target,
                members: Vec::new(),
            });
            self.batches.len() - 1
        });
        let batch = &mut self.batches[batch_index];
        batch.members.push(id);
        (batch.members.len() - 1) as u32
    }

    pub fn is_empty(&self) -> bool {
        self.batches.is_empty()
    }

    /// Drain the frame's batches for resolution.
    pub fn take_batches(&mut self) -> Vec<ResolveBatch> {
        self.by_target.clear();
        std::mem::take(&mut self.batches)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn offsets_follow_queue_order_per_target() {
        let mut batcher = ResolveBatcher::default();
        batcher.begin_frame();

        assert_eq!(batcher.enqueue(TargetId(0), AttachmentId(10)), 0);
        assert_eq!(batcher.enqueue(TargetId(1), AttachmentId(11)), 0);
        assert_eq!(batcher.enqueue(TargetId(0), AttachmentId(12)), 1);
        assert_eq!(batcher.enqueue(TargetId(0), AttachmentId(13)), 2);

        let batches = batcher.take_batches();
        assert_eq!(batches.len(), 2);
        assert_eq!(batches[0].target, TargetId(0));
        assert_eq!(
            batches[0].members,
            vec![AttachmentId(10), AttachmentId(12), AttachmentId(13)]
        );
        assert_eq!(batches[1].members, vec![AttachmentId(11)]);
        assert!(batcher.is_empty());
    }
}
