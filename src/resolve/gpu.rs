use std::sync::Arc;

use bytemuck::Zeroable;
use glam::Mat4;
use wgpu::util::DeviceExt;

use crate::attachment::{AttachmentItem, Pose};
use crate::constants::{RESOLVE_WORKGROUP_SIZE, TRANSFORM_RESULT_STRIDE};

/// Uniform block of one resolve dispatch.
#[repr(C)]
#[derive(Copy, Clone, Debug, bytemuck::Pod, bytemuck::Zeroable)]
struct ResolveParams {
    target_to_world: [[f32; 4]; 4],
    item_count: u32,
    _padding: [u32; 3],
}

/// One batch's inputs for the resolve shader. Poses are the batch members'
/// ranges concatenated with `pose_start` remapped into the concatenation;
/// `items` holds one entry per batch slot, in offset order.
pub struct BatchGpuInput<'a> {
    pub poses: &'a [Pose],
    pub items: &'a [AttachmentItem],
    /// Current target-local vertex positions, packed `[x, y, z, ..]`.
    pub packed_positions: &'a [f32],
    pub triangles: &'a [u32],
    pub target_to_world: Mat4,
}

/// Dispatches the position-resolve computation for a batch, writing packed
/// 12-byte result slots into a batch-sized GPU buffer.
pub struct GpuResolver {
    device: Arc<wgpu::Device>,
    pipeline: wgpu::ComputePipeline,
    bind_group_layout: wgpu::BindGroupLayout,
}

impl GpuResolver {
    pub fn new(device: Arc<wgpu::Device>) -> Self {
        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Attachment Resolve Shader"),
            source: wgpu::ShaderSource::Wgsl(
                include_str!("shaders/resolve_attachments.wgsl").into(),
            ),
        });

        let bind_group_layout =
            device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                label: Some("Attachment Resolve Bind Group Layout"),
                entries: &[
                    // Params
                    wgpu::BindGroupLayoutEntry {
                        binding: 0,
                        visibility: wgpu::ShaderStages::COMPUTE,
                        ty: wgpu::BindingType::Buffer {
                            ty: wgpu::BufferBindingType::Uniform,
                            has_dynamic_offset: false,
                            min_binding_size: None,
                        },
                        count: None,
                    },
                    // Poses
                    wgpu::BindGroupLayoutEntry {
                        binding: 1,
                        visibility: wgpu::ShaderStages::COMPUTE,
                        ty: wgpu::BindingType::Buffer {
                            ty: wgpu::BufferBindingType::Storage { read_only: true },
                            has_dynamic_offset: false,
                            min_binding_size: None,
                        },
                        count: None,
                    },
                    // Items
                    wgpu::BindGroupLayoutEntry {
                        binding: 2,
                        visibility: wgpu::ShaderStages::COMPUTE,
                        ty: wgpu::BindingType::Buffer {
                            ty: wgpu::BufferBindingType::Storage { read_only: true },
                            has_dynamic_offset: false,
                            min_binding_size: None,
                        },
                        count: None,
                    },
                    // Triangle indices
                    wgpu::BindGroupLayoutEntry {
                        binding: 3,
                        visibility: wgpu::ShaderStages::COMPUTE,
                        ty: wgpu::BindingType::Buffer {
                            ty: wgpu::BufferBindingType::Storage { read_only: true },
                            has_dynamic_offset: false,
                            min_binding_size: None,
                        },
                        count: None,
                    },
                    // Vertex positions
                    wgpu::BindGroupLayoutEntry {
                        binding: 4,
                        visibility: wgpu::ShaderStages::COMPUTE,
                        ty: wgpu::BindingType::Buffer {
                            ty: wgpu::BufferBindingType::Storage { read_only: true },
                            has_dynamic_offset: false,
                            min_binding_size: None,
                        },
                        count: None,
                    },
                    // Results
                    wgpu::BindGroupLayoutEntry {
                        binding: 5,
                        visibility: wgpu::ShaderStages::COMPUTE,
                        ty: wgpu::BindingType::Buffer {
                            ty: wgpu::BufferBindingType::Storage { read_only: false },
                            has_dynamic_offset: false,
                            min_binding_size: None,
                        },
                        count: None,
                    },
                ],
            });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Attachment Resolve Pipeline Layout"),
            bind_group_layouts: &[&bind_group_layout],
            push_constant_ranges: &[],
        });

        let pipeline = device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
            label: Some("Attachment Resolve Pipeline"),
            layout: Some(&pipeline_layout),
            module: &shader,
            entry_point: "resolve_attachments",
        });

        Self {
            device,
            pipeline,
            bind_group_layout,
        }
    }

    /// Record one batch's resolve dispatch. Returns the results buffer:
    /// `items.len()` slots of 3 packed floats, readable after the encoder's
    /// commands are submitted and either the device has synchronized or a
    /// readback has completed.
    pub fn resolve_batch(
        &self,
        encoder: &mut wgpu::CommandEncoder,
        input: &BatchGpuInput<'_>,
    ) -> Arc<wgpu::Buffer> {
        let params = ResolveParams {
            target_to_world: input.target_to_world.to_cols_array_2d(),
            item_count: input.items.len() as u32,
            _padding: [0; 3],
        };
        let params_buffer = self
            .device
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("Attachment Resolve Params"),
                contents: bytemuck::bytes_of(&params),
                usage: wgpu::BufferUsages::UNIFORM,
            });

        // zero-length storage bindings are invalid; a batch whose members all
        // lost their poses still dispatches with one zeroed pose
        let zeroed = [Pose::zeroed()];
        let poses: &[Pose] = if input.poses.is_empty() {
            &zeroed
        } else {
            input.poses
        };
        let pose_buffer = self
            .device
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("Attachment Pose Buffer"),
                contents: bytemuck::cast_slice(poses),
                usage: wgpu::BufferUsages::STORAGE,
            });

        let item_buffer = self
            .device
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("Attachment Item Buffer"),
                contents: bytemuck::cast_slice(input.items),
                usage: wgpu::BufferUsages::STORAGE,
            });

        let triangle_buffer = self
            .device
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("Attachment Triangle Index Buffer"),
                contents: bytemuck::cast_slice(input.triangles),
                usage: wgpu::BufferUsages::STORAGE,
            });

        let position_buffer = self
            .device
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("Attachment Vertex Position Buffer"),
                contents: bytemuck::cast_slice(input.packed_positions),
                usage: wgpu::BufferUsages::STORAGE,
            });

        let results_buffer = Arc::new(self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Attachment Results Buffer"),
            size: input.items.len() as u64 * TRANSFORM_RESULT_STRIDE,
            usage: wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_SRC,
            mapped_at_creation: false,
        }));

        let bind_group = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Attachment Resolve Bind Group"),
            layout: &self.bind_group_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: params_buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: pose_buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: item_buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 3,
                    resource: triangle_buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 4,
                    resource: position_buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 5,
                    resource: results_buffer.as_entire_binding(),
                },
            ],
        });

        {
            let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                label: Some("Attachment Resolve Pass"),
                timestamp_writes: None,
            });
            pass.set_pipeline(&self.pipeline);
            pass.set_bind_group(0, &bind_group, &[]);

            let workgroups =
                (input.items.len() as u32 + RESOLVE_WORKGROUP_SIZE - 1) / RESOLVE_WORKGROUP_SIZE;
            pass.dispatch_workgroups(workgroups.max(1), 1, 1);
        }

        results_buffer
    }
}
