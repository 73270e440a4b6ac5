//! Render device abstraction and the recording dummy implementation

pub mod dummy;
pub mod traits;
pub mod types;

pub use dummy::{DeviceCall, DummyDevice};
pub use traits::{BackendError, BackendResult, BufferHandle, RenderDevice};
pub use types::{
    BlendMode, BufferDescriptor, BufferUsage, ColorWrites, CompareFunction, CullMode, IndexFormat,
    RenderState, StencilFaceState, StencilOperation, StencilState, VolumeVertex,
};
