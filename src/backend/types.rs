//! Common types shared with render device implementations

use bitflags::bitflags;
use bytemuck::{Pod, Zeroable};
use glam::Vec3;

/// Index format for indexed drawing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IndexFormat {
    Uint16,
    Uint32,
}

impl IndexFormat {
    /// Size in bytes of one index
    pub fn size(&self) -> u64 {
        match self {
            IndexFormat::Uint16 => 2,
            IndexFormat::Uint32 => 4,
        }
    }
}

bitflags! {
    /// Buffer usage flags
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct BufferUsage: u32 {
        const VERTEX = 1 << 0;
        const INDEX = 1 << 1;
        const COPY_DST = 1 << 2;
    }
}

bitflags! {
    /// Color channel write mask
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ColorWrites: u32 {
        const RED = 1 << 0;
        const GREEN = 1 << 1;
        const BLUE = 1 << 2;
        const ALPHA = 1 << 3;
        const ALL = Self::RED.bits()
            | Self::GREEN.bits()
            | Self::BLUE.bits()
            | Self::ALPHA.bits();
    }
}

/// Buffer descriptor
#[derive(Debug, Clone)]
pub struct BufferDescriptor {
    pub label: Option<String>,
    pub size: u64,
    pub usage: BufferUsage,
}

impl BufferDescriptor {
    pub fn new(size: u64, usage: BufferUsage) -> Self {
        Self {
            label: None,
            size,
            usage,
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }
}

/// Comparison function for depth and stencil tests
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CompareFunction {
    Never,
    Less,
    Equal,
    LessEqual,
    Greater,
    NotEqual,
    GreaterEqual,
    Always,
}

/// Stencil buffer operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StencilOperation {
    Keep,
    Zero,
    Replace,
    Invert,
    IncrementClamp,
    DecrementClamp,
    IncrementWrap,
    DecrementWrap,
}

/// Stencil behavior for one face orientation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StencilFaceState {
    pub compare: CompareFunction,
    pub fail_op: StencilOperation,
    pub depth_fail_op: StencilOperation,
    pub pass_op: StencilOperation,
}

impl StencilFaceState {
    pub const IGNORE: Self = Self {
        compare: CompareFunction::Always,
        fail_op: StencilOperation::Keep,
        depth_fail_op: StencilOperation::Keep,
        pass_op: StencilOperation::Keep,
    };
}

/// Full stencil state for a draw
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StencilState {
    pub front: StencilFaceState,
    pub back: StencilFaceState,
    pub reference: u32,
    pub read_mask: u32,
    pub write_mask: u32,
}

impl Default for StencilState {
    fn default() -> Self {
        Self {
            front: StencilFaceState::IGNORE,
            back: StencilFaceState::IGNORE,
            reference: 0,
            read_mask: !0,
            write_mask: !0,
        }
    }
}

/// Face culling mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CullMode {
    None,
    Front,
    Back,
}

/// Framebuffer blend mode
///
/// `Modulate` multiplies the existing framebuffer color by the blend
/// constant; geometry drawn with it carries no color of its own.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BlendMode {
    Opaque,
    Alpha,
    Modulate,
}

/// Complete fixed-function state for a draw
///
/// Draws always consume triangle lists; there is no topology selector.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderState {
    pub cull_mode: CullMode,
    pub depth_compare: CompareFunction,
    pub depth_write_enabled: bool,
    pub color_writes: ColorWrites,
    pub blend: BlendMode,
    pub blend_constant: [f32; 4],
    pub stencil: Option<StencilState>,
}

impl Default for RenderState {
    fn default() -> Self {
        Self {
            cull_mode: CullMode::Back,
            depth_compare: CompareFunction::LessEqual,
            depth_write_enabled: true,
            color_writes: ColorWrites::ALL,
            blend: BlendMode::Opaque,
            blend_constant: [1.0, 1.0, 1.0, 1.0],
            stencil: None,
        }
    }
}

/// Vertex layout of shadow-volume geometry: position only
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct VolumeVertex {
    pub position: [f32; 3],
}

impl VolumeVertex {
    pub fn new(position: Vec3) -> Self {
        Self {
            position: position.to_array(),
        }
    }

    pub fn position(&self) -> Vec3 {
        Vec3::from_array(self.position)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn index_format_sizes() {
        assert_eq!(IndexFormat::Uint16.size(), 2);
        assert_eq!(IndexFormat::Uint32.size(), 4);
    }

    #[test]
    fn color_writes_all_covers_every_channel() {
        assert!(ColorWrites::ALL.contains(ColorWrites::RED));
        assert!(ColorWrites::ALL.contains(ColorWrites::ALPHA));
        assert!(ColorWrites::empty().is_empty());
    }

    #[test]
    fn volume_vertex_is_tightly_packed() {
        assert_eq!(std::mem::size_of::<VolumeVertex>(), 12);
        let v = VolumeVertex::new(Vec3::new(1.0, 2.0, 3.0));
        assert_eq!(v.position(), Vec3::new(1.0, 2.0, 3.0));
    }

    #[test]
    fn default_render_state_writes_color_and_depth() {
        let state = RenderState::default();
        assert_eq!(state.color_writes, ColorWrites::ALL);
        assert!(state.depth_write_enabled);
        assert!(state.stencil.is_none());
    }
}
