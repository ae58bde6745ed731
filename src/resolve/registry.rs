use std::sync::Arc;

use crossbeam_channel::{unbounded, Receiver, Sender};
use glam::{Mat4, Vec3};
use rustc_hash::FxHashMap;

use super::batcher::ResolveBatcher;
use super::cpu;
use super::gpu::{BatchGpuInput, GpuResolver};
use super::readback::ReadbackGate;
use crate::attachment::{
    AttachmentItem, Pose, ResolveNotification, SchedulingMode, TransformAttachment,
};
use crate::mesh::{MeshSnapshotProvider, TargetId};

/// Handle to an attachment stored in a registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AttachmentId(pub u64);

/// Resolve-completion message, one per attachment per resolved frame.
/// Drained from [`AttachmentRegistry::resolve_events`] by interested hosts.
#[derive(Debug, Clone)]
pub struct ResolveEvent {
    pub attachment: AttachmentId,
    pub target: TargetId,
    pub offset_in_batch: u32,
    /// CPU-path world position; `None` for GPU-scheduled attachments whose
    /// result stays on the device until read back.
    pub world_position: Option<Vec3>,
    pub frame: u64,
}

struct GpuContext {
    device: Arc<wgpu::Device>,
    queue: Arc<wgpu::Queue>,
    resolver: GpuResolver,
    readback: ReadbackGate,
}

struct Entry {
    id: AttachmentId,
    attachment: TransformAttachment,
}

struct BatchOutput {
    target: TargetId,
    members: Vec<AttachmentId>,
    cpu: Vec<Vec3>,
    gpu_results: Option<Arc<wgpu::Buffer>>,
}

/// Owns every attachment and drives the per-frame resolve pipeline.
///
/// Explicitly constructed and explicitly owned: the host creates one,
/// passes it wherever attachments are managed, and calls [`tick`] then
/// [`resolve_queued`] once per frame:
///
/// 1. `tick(provider)` starts the frame and queues every attached,
///    continuously-scheduled attachment.
/// 2. explicit-mode attachments call [`queue_for_resolve`] themselves.
/// 3. `resolve_queued(provider)` resolves each target's batch exactly once,
///    notifies members, submits GPU work, and runs requested readbacks.
///
/// [`tick`]: AttachmentRegistry::tick
/// [`resolve_queued`]: AttachmentRegistry::resolve_queued
/// [`queue_for_resolve`]: AttachmentRegistry::queue_for_resolve
pub struct AttachmentRegistry {
    entries: Vec<Entry>,
    index_of: FxHashMap<AttachmentId, usize>,
    next_id: u64,
    batcher: ResolveBatcher,
    gpu: Option<GpuContext>,
    events_tx: Sender<ResolveEvent>,
    events_rx: Receiver<ResolveEvent>,
    frame: u64,
}

impl AttachmentRegistry {
    /// CPU-only registry. GPU-scheduled attachments fall back to the CPU
    /// path with a warning.
    pub fn new() -> Self {
        let (events_tx, events_rx) = unbounded();
        Self {
            entries: Vec::new(),
            index_of: FxHashMap::default(),
            next_id: 0,
            batcher: ResolveBatcher::default(),
            gpu: None,
            events_tx,
            events_rx,
            frame: 0,
        }
    }

    pub fn with_gpu(device: Arc<wgpu::Device>, queue: Arc<wgpu::Queue>) -> Self {
        let mut registry = Self::new();
        registry.gpu = Some(GpuContext {
            resolver: GpuResolver::new(device.clone()),
            readback: ReadbackGate::new(device.clone(), queue.clone()),
            device,
            queue,
        });
        registry
    }

    pub fn has_gpu(&self) -> bool {
        self.gpu.is_some()
    }

    pub fn add(&mut self, attachment: TransformAttachment) -> AttachmentId {
        let id = AttachmentId(self.next_id);
        self.next_id += 1;
        self.index_of.insert(id, self.entries.len());
        self.entries.push(Entry { id, attachment });
        id
    }

    pub fn remove(&mut self, id: AttachmentId) -> Option<TransformAttachment> {
        let index = self.index_of.remove(&id)?;
        let entry = self.entries.remove(index);
        for moved in &self.entries[index..] {
            if let Some(slot) = self.index_of.get_mut(&moved.id) {
                *slot -= 1;
            }
        }
        Some(entry.attachment)
    }

    pub fn get(&self, id: AttachmentId) -> Option<&TransformAttachment> {
        let index = *self.index_of.get(&id)?;
        Some(&self.entries[index].attachment)
    }

    pub fn get_mut(&mut self, id: AttachmentId) -> Option<&mut TransformAttachment> {
        let index = *self.index_of.get(&id)?;
        Some(&mut self.entries[index].attachment)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Resolve-completion events. Drain once per frame with `try_iter`.
    pub fn resolve_events(&self) -> &Receiver<ResolveEvent> {
        &self.events_rx
    }

    /// Start a new frame: invalidate last frame's batch offsets and result
    /// handles, then queue every attached, continuously-scheduled
    /// attachment. Attachments whose target no longer resolves are skipped
    /// silently; that is the continuous-scheduling contract.
    pub fn tick(&mut self, provider: &dyn MeshSnapshotProvider) {
        self.frame += 1;
        self.batcher.begin_frame();

        for entry in &mut self.entries {
            entry.attachment.offset_in_batch = None;
            entry.attachment.current_gpu_results = None;
        }

        let ids: Vec<AttachmentId> = self
            .entries
            .iter()
            .filter(|entry| !entry.attachment.settings.explicit_scheduling)
            .map(|entry| entry.id)
            .collect();
        for id in ids {
            self.enqueue_if_valid(id, provider);
        }
    }

    /// Queue one explicitly-scheduled attachment for this frame's resolve.
    /// Calling this on a continuously-scheduled attachment is a scheduling
    /// misuse: a visible error is logged and nothing is queued.
    pub fn queue_for_resolve(
        &mut self,
        id: AttachmentId,
        provider: &dyn MeshSnapshotProvider,
    ) -> bool {
        let Some(attachment) = self.get(id) else {
            log::error!(
                "[AttachmentRegistry] queue_for_resolve on unknown attachment {:?}; skipping",
                id
            );
            return false;
        };
        if !attachment.settings.explicit_scheduling {
            log::error!(
                "[AttachmentRegistry] queue_for_resolve called for {:?} but explicit scheduling \
                 is not enabled; skipping",
                id
            );
            return false;
        }
        if !attachment.has_valid_state(provider) {
            log::error!(
                "[AttachmentRegistry] queue_for_resolve called for {:?} in an invalid or \
                 detached state; skipping",
                id
            );
            return false;
        }
        self.enqueue_if_valid(id, provider)
    }

    fn enqueue_if_valid(&mut self, id: AttachmentId, provider: &dyn MeshSnapshotProvider) -> bool {
        let Some(&index) = self.index_of.get(&id) else {
            return false;
        };
        if !self.entries[index].attachment.has_valid_state(provider) {
            return false;
        }
        if self.entries[index].attachment.offset_in_batch.is_some() {
            // already queued this frame
            return true;
        }

        let attachment = &self.entries[index].attachment;
        if attachment.settings.scheduling_mode == SchedulingMode::Gpu && self.gpu.is_none() {
            log::warn!(
                "[AttachmentRegistry] {:?} is GPU-scheduled but the registry has no GPU \
                 context; resolving on the CPU",
                id
            );
        }

        let target = attachment.target();
        let offset = self.batcher.enqueue(target, id);
        self.entries[index].attachment.offset_in_batch = Some(offset);
        true
    }

    /// Resolve every batch queued since the last call, exactly once each:
    /// CPU results are computed synchronously, GPU dispatches are recorded
    /// and submitted, members are notified in offset order, and attachments
    /// that asked for a GPU readback get their transform synchronized before
    /// this returns.
    pub fn resolve_queued(&mut self, provider: &dyn MeshSnapshotProvider) {
        let batches = self.batcher.take_batches();
        if batches.is_empty() {
            return;
        }

        let gpu = self.gpu.take();
        let mut encoder = gpu.as_ref().map(|context| {
            context
                .device
                .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                    label: Some("Attachment Resolve Encoder"),
                })
        });

        let mut outputs: Vec<BatchOutput> = Vec::with_capacity(batches.len());

        for batch in batches {
            let Some(snapshot) = provider.target_mesh_info(batch.target) else {
                log::warn!(
                    "[AttachmentRegistry] target {:?} lost its snapshot before resolve; \
                     skipping batch of {} attachments",
                    batch.target,
                    batch.members.len()
                );
                continue;
            };

            let target_to_world = snapshot.target_to_world();
            let mut cpu_results = vec![Vec3::ZERO; batch.members.len()];
            let mut wants_gpu = false;
            let mut gpu_poses: Vec<Pose> = Vec::new();
            let mut gpu_items: Vec<AttachmentItem> = Vec::with_capacity(batch.members.len());

            for (offset, id) in batch.members.iter().enumerate() {
                let Some(&index) = self.index_of.get(id) else {
                    // removed between queue and resolve
                    gpu_items.push(AttachmentItem {
                        pose_start: 0,
                        pose_count: 0,
                    });
                    continue;
                };
                let attachment = &self.entries[index].attachment;

                if attachment.settings.scheduling_mode == SchedulingMode::Gpu {
                    wants_gpu = true;
                }

                match attachment.baked_poses_and_item() {
                    Some((poses, _)) => {
                        gpu_items.push(AttachmentItem {
                            pose_start: gpu_poses.len() as u32,
                            pose_count: poses.len() as u32,
                        });
                        gpu_poses.extend_from_slice(poses);

                        cpu_results[offset] = cpu::resolve_poses_world(
                            poses,
                            &snapshot.buffers,
                            target_to_world,
                        )
                        .or(attachment.last_resolved_position)
                        .unwrap_or(attachment.transform.position);
                    }
                    None => {
                        gpu_items.push(AttachmentItem {
                            pose_start: 0,
                            pose_count: 0,
                        });
                        cpu_results[offset] = attachment.transform.position;
                    }
                }
            }

            let gpu_results = match (&gpu, encoder.as_mut()) {
                (Some(context), Some(encoder))
                    if wants_gpu && snapshot.has_triangles() && !gpu_items.is_empty() =>
                {
                    let packed_positions = snapshot.buffers.packed_positions();
                    Some(context.resolver.resolve_batch(
                        encoder,
                        &BatchGpuInput {
                            poses: &gpu_poses,
                            items: &gpu_items,
                            packed_positions: &packed_positions,
                            triangles: &snapshot.buffers.triangles,
                            target_to_world: Mat4::from(target_to_world),
                        },
                    ))
                }
                _ => None,
            };

            outputs.push(BatchOutput {
                target: batch.target,
                members: batch.members,
                cpu: cpu_results,
                gpu_results,
            });
        }

        // notification pass, before submission so callbacks can record
        // further GPU work into the frame's command stream
        for output in &outputs {
            for (offset, id) in output.members.iter().enumerate() {
                let Some(&index) = self.index_of.get(id) else {
                    continue;
                };
                let attachment = &mut self.entries[index].attachment;

                attachment.current_gpu_results = output.gpu_results.clone();

                let resolves_on_cpu = attachment.settings.scheduling_mode == SchedulingMode::Cpu
                    || output.gpu_results.is_none();
                let world_position = resolves_on_cpu.then(|| output.cpu[offset]);
                if let Some(position) = world_position {
                    attachment.transform.position = position;
                    attachment.last_resolved_position = Some(position);
                }

                let notification = ResolveNotification {
                    target: output.target,
                    offset_in_batch: offset as u32,
                    positions_cpu: &output.cpu,
                    positions_gpu: output.gpu_results.as_deref(),
                    world_position,
                };
                for callback in attachment.resolved_callbacks.iter_mut() {
                    callback(&notification, encoder.as_mut());
                }

                let _ = self.events_tx.send(ResolveEvent {
                    attachment: *id,
                    target: output.target,
                    offset_in_batch: offset as u32,
                    world_position,
                    frame: self.frame,
                });
            }
        }

        if let (Some(context), Some(encoder)) = (&gpu, encoder.take()) {
            context.queue.submit(Some(encoder.finish()));
        }

        // post pass: blocking readbacks for attachments that asked for one
        if let Some(context) = &gpu {
            for output in &outputs {
                let Some(results) = &output.gpu_results else {
                    continue;
                };
                for (offset, id) in output.members.iter().enumerate() {
                    let Some(&index) = self.index_of.get(id) else {
                        continue;
                    };
                    let attachment = &mut self.entries[index].attachment;
                    if attachment.settings.scheduling_mode != SchedulingMode::Gpu
                        || !attachment.settings.readback_from_gpu
                    {
                        continue;
                    }
                    match context.readback.read_slot(results, offset as u32) {
                        Ok(Some(position)) => {
                            attachment.transform.position = position;
                            attachment.last_resolved_position = Some(position);
                        }
                        Ok(None) => {}
                        Err(error) => {
                            log::error!(
                                "[AttachmentRegistry] readback failed for {:?}: {}",
                                id,
                                error
                            );
                        }
                    }
                }
            }
        }

        self.gpu = gpu;
    }
}

impl Default for AttachmentRegistry {
    fn default() -> Self {
        Self::new()
    }
}
