/// Attachment pipeline integration tests
///
/// End-to-end coverage of bake → batch → resolve → notify on the CPU path,
/// plus CPU/GPU agreement and single-slot readback when a GPU is available.

use std::sync::Arc;

use glam::{Affine3A, Quat, Vec3};

use skin_attachment::{
    AttachmentRegistry, AttachmentSettings, MeshBuffers, MeshSnapshot, MeshSnapshotCache,
    ReadbackGate, SchedulingMode, Transform, TransformAttachment,
};

/// Tolerance for CPU/GPU agreement, in world units
const CPU_GPU_TOLERANCE: f32 = 1e-4;

/// Initialize GPU context for tests
fn init_gpu() -> Option<(Arc<wgpu::Device>, Arc<wgpu::Queue>)> {
    let instance = wgpu::Instance::new(wgpu::InstanceDescriptor {
        backends: wgpu::Backends::all(),
        ..Default::default()
    });

    let adapter = pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions {
        power_preference: wgpu::PowerPreference::HighPerformance,
        compatible_surface: None,
        force_fallback_adapter: false,
    }))?;

    let (device, queue) = pollster::block_on(adapter.request_device(
        &wgpu::DeviceDescriptor {
            label: Some("Attachment Test Device"),
            required_features: wgpu::Features::empty(),
            required_limits: wgpu::Limits::default(),
        },
        None,
    ))
    .ok()?;

    Some((Arc::new(device), Arc::new(queue)))
}

fn grid_mesh(width: usize, height: usize) -> MeshBuffers {
    let mut positions = Vec::new();
    for y in 0..=height {
        for x in 0..=width {
            positions.push(Vec3::new(x as f32, y as f32, 0.0));
        }
    }
    let stride = (width + 1) as u32;
    let mut triangles = Vec::new();
    for y in 0..height as u32 {
        for x in 0..width as u32 {
            let v = y * stride + x;
            triangles.extend_from_slice(&[v, v + 1, v + stride]);
            triangles.extend_from_slice(&[v + 1, v + stride + 1, v + stride]);
        }
    }
    MeshBuffers::new(positions, Vec::new(), triangles)
}

#[test]
fn cpu_pipeline_follows_rigid_motion_exactly() {
    let mut cache = MeshSnapshotCache::new();
    let target = cache.insert(MeshSnapshot::new(grid_mesh(4, 4), Affine3A::IDENTITY));
    let mut registry = AttachmentRegistry::new();

    let attach_points = [
        Vec3::new(0.4, 0.3, 0.0),
        Vec3::new(2.5, 1.5, 0.0),
        Vec3::new(3.7, 3.2, 0.0),
    ];
    let ids: Vec<_> = attach_points
        .iter()
        .map(|point| {
            let id = registry.add(TransformAttachment::new(
                target,
                Transform::from_position(*point),
                AttachmentSettings::default(),
            ));
            registry.get_mut(id).unwrap().attach(&cache, true).unwrap();
            id
        })
        .collect();

    // rigid motion applied to the vertex buffer itself
    let motion = Affine3A::from_rotation_translation(
        Quat::from_rotation_z(0.4),
        Vec3::new(2.0, -1.0, 3.0),
    );
    let moved: Vec<Vec3> = grid_mesh(4, 4)
        .positions
        .iter()
        .map(|p| motion.transform_point3(*p))
        .collect();
    cache.get_mut(target).unwrap().update_positions(&moved);

    registry.tick(&cache);
    registry.resolve_queued(&cache);

    for (point, id) in attach_points.iter().zip(&ids) {
        let resolved = registry.get(*id).unwrap().transform.position;
        let expected = motion.transform_point3(*point);
        assert!(
            resolved.distance(expected) < 1e-4,
            "expected {expected:?}, resolved {resolved:?}"
        );
    }
}

#[test]
fn moving_the_target_transform_moves_attachments() {
    let mut cache = MeshSnapshotCache::new();
    let target = cache.insert(MeshSnapshot::new(grid_mesh(2, 2), Affine3A::IDENTITY));
    let mut registry = AttachmentRegistry::new();

    let point = Vec3::new(1.2, 0.7, 0.0);
    let id = registry.add(TransformAttachment::new(
        target,
        Transform::from_position(point),
        AttachmentSettings::default(),
    ));
    registry.get_mut(id).unwrap().attach(&cache, true).unwrap();

    // the target renderer moves; vertex data stays in target-local space
    let target_to_world = Affine3A::from_translation(Vec3::new(0.0, 10.0, 0.0));
    cache
        .get_mut(target)
        .unwrap()
        .set_target_to_world(target_to_world);

    registry.tick(&cache);
    registry.resolve_queued(&cache);

    let resolved = registry.get(id).unwrap().transform.position;
    assert!(resolved.distance(target_to_world.transform_point3(point)) < 1e-5);
}

#[test]
fn events_cover_every_member_once_per_frame() {
    let mut cache = MeshSnapshotCache::new();
    let target_a = cache.insert(MeshSnapshot::new(grid_mesh(2, 2), Affine3A::IDENTITY));
    let target_b = cache.insert(MeshSnapshot::new(grid_mesh(3, 3), Affine3A::IDENTITY));
    let mut registry = AttachmentRegistry::new();

    let mut ids = Vec::new();
    for (target, x) in [(target_a, 0.5), (target_a, 1.5), (target_b, 2.5)] {
        let id = registry.add(TransformAttachment::new(
            target,
            Transform::from_position(Vec3::new(x, 0.5, 0.0)),
            AttachmentSettings::default(),
        ));
        registry.get_mut(id).unwrap().attach(&cache, true).unwrap();
        ids.push(id);
    }

    registry.tick(&cache);
    registry.resolve_queued(&cache);

    let mut events: Vec<_> = registry.resolve_events().try_iter().collect();
    assert_eq!(events.len(), 3);
    events.sort_by_key(|event| event.attachment.0);
    for (event, id) in events.iter().zip(&ids) {
        assert_eq!(event.attachment, *id);
        assert!(event.world_position.is_some());
    }
    // one target, one batch: members of target_a share a batch
    let offsets: Vec<u32> = events
        .iter()
        .filter(|event| event.target == target_a)
        .map(|event| event.offset_in_batch)
        .collect();
    assert_eq!(offsets, vec![0, 1]);
}

#[test]
fn gpu_resolution_agrees_with_cpu() {
    let Some((device, queue)) = init_gpu() else {
        println!("Skipping GPU test - no GPU available");
        return;
    };

    let mut cache = MeshSnapshotCache::new();
    let target = cache.insert(MeshSnapshot::new(grid_mesh(4, 4), Affine3A::IDENTITY));
    let mut registry = AttachmentRegistry::with_gpu(device, queue);

    let attach_points = [
        Vec3::new(0.4, 0.3, 0.0),
        Vec3::new(2.5, 1.5, 0.0),
        Vec3::new(3.1, 2.8, 0.0),
    ];
    let mut pairs = Vec::new();
    for point in attach_points {
        let cpu_id = registry.add(TransformAttachment::new(
            target,
            Transform::from_position(point),
            AttachmentSettings::default(),
        ));
        registry
            .get_mut(cpu_id)
            .unwrap()
            .attach(&cache, true)
            .unwrap();

        let gpu_id = registry.add(TransformAttachment::new(
            target,
            Transform::from_position(point),
            AttachmentSettings {
                scheduling_mode: SchedulingMode::Gpu,
                readback_from_gpu: true,
                ..AttachmentSettings::default()
            },
        ));
        registry
            .get_mut(gpu_id)
            .unwrap()
            .attach(&cache, true)
            .unwrap();

        pairs.push((cpu_id, gpu_id));
    }

    // deform: bend the grid out of plane
    let bent: Vec<Vec3> = grid_mesh(4, 4)
        .positions
        .iter()
        .map(|p| Vec3::new(p.x, p.y, (p.x * 1.3).sin() * 0.5 + (p.y * 0.7).cos() * 0.25))
        .collect();
    cache.get_mut(target).unwrap().update_positions(&bent);

    registry.tick(&cache);
    registry.resolve_queued(&cache);

    for (cpu_id, gpu_id) in pairs {
        let cpu_pos = registry.get(cpu_id).unwrap().transform.position;
        let gpu_pos = registry.get(gpu_id).unwrap().transform.position;
        assert!(
            cpu_pos.distance(gpu_pos) < CPU_GPU_TOLERANCE,
            "CPU {cpu_pos:?} vs GPU {gpu_pos:?}"
        );
    }
}

#[test]
fn readback_gate_reads_single_slots_and_skips_stale_offsets() {
    let Some((device, queue)) = init_gpu() else {
        println!("Skipping GPU test - no GPU available");
        return;
    };

    let mut cache = MeshSnapshotCache::new();
    let target = cache.insert(MeshSnapshot::new(grid_mesh(3, 3), Affine3A::IDENTITY));
    let mut registry = AttachmentRegistry::with_gpu(device.clone(), queue.clone());

    let points = [Vec3::new(0.3, 0.4, 0.0), Vec3::new(2.2, 1.6, 0.0)];
    let ids: Vec<_> = points
        .iter()
        .map(|point| {
            let id = registry.add(TransformAttachment::new(
                target,
                Transform::from_position(*point),
                AttachmentSettings {
                    scheduling_mode: SchedulingMode::Gpu,
                    ..AttachmentSettings::default()
                },
            ));
            registry.get_mut(id).unwrap().attach(&cache, true).unwrap();
            id
        })
        .collect();

    registry.tick(&cache);
    registry.resolve_queued(&cache);

    let gate = ReadbackGate::new(device, queue);
    for (point, id) in points.iter().zip(&ids) {
        let attachment = registry.get(*id).unwrap();
        let buffer = attachment
            .gpu_results_buffer()
            .expect("GPU batch should have produced a results buffer");
        let offset = attachment.offset_in_batch().unwrap();

        let position = gate.read_slot(buffer, offset).unwrap().unwrap();
        assert!(
            position.distance(*point) < CPU_GPU_TOLERANCE,
            "slot {offset}: read {position:?}, expected {point:?}"
        );
    }

    // offset beyond the batch: stale, skipped without error
    let buffer = registry
        .get(ids[0])
        .unwrap()
        .gpu_results_buffer()
        .unwrap()
        .clone();
    assert!(gate.read_slot(&buffer, 99).unwrap().is_none());

    // an attachment that never resolved this frame has no buffer to read
    let mut idle = TransformAttachment::new(
        target,
        Transform::from_position(Vec3::ZERO),
        AttachmentSettings::default(),
    );
    idle.attach(&cache, true).unwrap();
    assert!(idle.gpu_results_buffer().is_none());
}
