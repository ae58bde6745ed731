//! Per-frame batched resolution
//!
//! Queued attachments are grouped into one batch per target mesh, each
//! member gets a stable offset into the batch's result buffers, and the
//! batch resolves exactly once per frame: synchronously on the CPU, or as
//! a compute dispatch whose results stay on the GPU until a blocking
//! readback is requested.

mod batcher;
pub mod cpu;
mod gpu;
mod readback;
mod registry;

pub use batcher::{ResolveBatch, ResolveBatcher};
pub use gpu::{BatchGpuInput, GpuResolver};
pub use readback::ReadbackGate;
pub use registry::{AttachmentId, AttachmentRegistry, ResolveEvent};
