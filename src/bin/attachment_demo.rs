//! Attaches a few transforms to a waving ribbon mesh and prints their
//! resolved positions for a handful of frames. Runs the CPU path always and
//! the GPU path (with readback) when an adapter is available.

use std::sync::Arc;

use anyhow::Result;
use glam::{Affine3A, Vec3};

use skin_attachment::{
    AttachmentRegistry, AttachmentSettings, MeshBuffers, MeshSnapshot, MeshSnapshotCache,
    SchedulingMode, Transform, TransformAttachment,
};

const RIBBON_SEGMENTS: usize = 16;

fn ribbon_positions(phase: f32) -> Vec<Vec3> {
    let mut positions = Vec::with_capacity((RIBBON_SEGMENTS + 1) * 2);
    for i in 0..=RIBBON_SEGMENTS {
        let x = i as f32 / RIBBON_SEGMENTS as f32 * 4.0;
        let z = (x * 2.0 + phase).sin() * 0.3;
        positions.push(Vec3::new(x, 0.0, z));
        positions.push(Vec3::new(x, 1.0, z));
    }
    positions
}

fn ribbon_mesh() -> MeshBuffers {
    let positions = ribbon_positions(0.0);
    let mut triangles = Vec::new();
    for i in 0..RIBBON_SEGMENTS as u32 {
        let base = i * 2;
        triangles.extend_from_slice(&[base, base + 2, base + 1]);
        triangles.extend_from_slice(&[base + 1, base + 2, base + 3]);
    }
    MeshBuffers::new(positions, Vec::new(), triangles)
}

async fn try_create_gpu() -> Option<(Arc<wgpu::Device>, Arc<wgpu::Queue>)> {
    let instance = wgpu::Instance::new(wgpu::InstanceDescriptor {
        backends: wgpu::Backends::all(),
        ..Default::default()
    });
    let adapter = instance
        .request_adapter(&wgpu::RequestAdapterOptions {
            power_preference: wgpu::PowerPreference::HighPerformance,
            force_fallback_adapter: false,
            compatible_surface: None,
        })
        .await?;
    let (device, queue) = adapter
        .request_device(
            &wgpu::DeviceDescriptor {
                label: Some("Attachment Demo Device"),
                required_features: wgpu::Features::empty(),
                required_limits: wgpu::Limits::default(),
            },
            None,
        )
        .await
        .ok()?;
    Some((Arc::new(device), Arc::new(queue)))
}

fn main() -> Result<()> {
    env_logger::init();

    let mut cache = MeshSnapshotCache::new();
    let target = cache.insert(MeshSnapshot::new(ribbon_mesh(), Affine3A::IDENTITY));

    let gpu = pollster::block_on(try_create_gpu());
    let mut registry = match &gpu {
        Some((device, queue)) => {
            log::info!("[AttachmentDemo] GPU adapter found, running both resolve paths");
            AttachmentRegistry::with_gpu(device.clone(), queue.clone())
        }
        None => {
            log::info!("[AttachmentDemo] no GPU adapter, running CPU path only");
            AttachmentRegistry::new()
        }
    };

    let cpu_id = registry.add(TransformAttachment::new(
        target,
        Transform::from_position(Vec3::new(1.0, 0.5, 0.0)),
        AttachmentSettings::default(),
    ));
    registry.get_mut(cpu_id).unwrap().attach(&cache, true)?;

    let gpu_id = registry.has_gpu().then(|| {
        let id = registry.add(TransformAttachment::new(
            target,
            Transform::from_position(Vec3::new(3.0, 0.5, 0.0)),
            AttachmentSettings {
                scheduling_mode: SchedulingMode::Gpu,
                readback_from_gpu: true,
                ..AttachmentSettings::default()
            },
        ));
        registry
            .get_mut(id)
            .unwrap()
            .attach(&cache, true)
            .expect("GPU attachment bake failed");
        id
    });

    for frame in 0..8 {
        let phase = frame as f32 * 0.4;
        let positions = ribbon_positions(phase);
        cache.get_mut(target).unwrap().update_positions(&positions);

        registry.tick(&cache);
        registry.resolve_queued(&cache);

        let cpu_pos = registry.get(cpu_id).unwrap().transform.position;
        print!("frame {frame}: cpu {cpu_pos:.3?}");
        if let Some(id) = gpu_id {
            let gpu_pos = registry.get(id).unwrap().transform.position;
            print!("  gpu-readback {gpu_pos:.3?}");
        }
        println!();

        for event in registry.resolve_events().try_iter() {
            log::debug!("[AttachmentDemo] resolve event: {:?}", event);
        }
    }

    Ok(())
}
