use std::sync::Arc;

use glam::Vec3;

use crate::constants::TRANSFORM_RESULT_STRIDE;
use crate::error::{AttachmentError, AttachmentResult};

/// Blocking GPU-to-CPU synchronization of a single result slot.
///
/// This is the pipeline's one deliberate stall: copy 12 bytes from the
/// batch results buffer into a staging buffer, then block the calling
/// thread until the map completes. Callers use it at most once per
/// attachment per frame, and only when CPU-visible state must reflect the
/// GPU result within the same frame.
pub struct ReadbackGate {
    device: Arc<wgpu::Device>,
    queue: Arc<wgpu::Queue>,
}

impl ReadbackGate {
    pub fn new(device: Arc<wgpu::Device>, queue: Arc<wgpu::Queue>) -> Self {
        Self { device, queue }
    }

    /// Read the slot at `offset_in_batch` from `results`. Returns `Ok(None)`
    /// when the slot lies outside the buffer (stale offset against a buffer
    /// from another frame); the caller keeps its last known position.
    pub fn read_slot(
        &self,
        results: &wgpu::Buffer,
        offset_in_batch: u32,
    ) -> AttachmentResult<Option<Vec3>> {
        let offset = offset_in_batch as u64 * TRANSFORM_RESULT_STRIDE;
        if offset + TRANSFORM_RESULT_STRIDE > results.size() {
            return Ok(None);
        }

        let staging = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Attachment Readback Staging Buffer"),
            size: TRANSFORM_RESULT_STRIDE,
            usage: wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Attachment Readback Encoder"),
            });
        encoder.copy_buffer_to_buffer(results, offset, &staging, 0, TRANSFORM_RESULT_STRIDE);
        self.queue.submit(Some(encoder.finish()));

        let slice = staging.slice(..);
        let (tx, rx) = futures::channel::oneshot::channel();
        slice.map_async(wgpu::MapMode::Read, move |result| {
            let _ = tx.send(result);
        });

        self.device.poll(wgpu::Maintain::Wait);

        match pollster::block_on(rx) {
            Ok(Ok(())) => {}
            Ok(Err(error)) => {
                return Err(AttachmentError::GpuReadbackFailed {
                    message: error.to_string(),
                })
            }
            Err(_) => {
                return Err(AttachmentError::GpuReadbackFailed {
                    message: "map_async callback dropped without completing".to_string(),
                })
            }
        }

        let data = slice.get_mapped_range();
        let floats: [f32; 3] = bytemuck::pod_read_unaligned(&data);
        drop(data);
        staging.unmap();

        Ok(Some(Vec3::from(floats)))
    }
}
