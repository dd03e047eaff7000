/// "Internals" refers to low-level objects the frame loop is built from.

pub mod command_buffers;
pub mod queue;
pub mod swapchain;
pub mod sync;
