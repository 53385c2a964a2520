use bytemuck::{Pod, Zeroable};

/// Bits of [`ModifyState::mask`].
pub mod mask {
    /// The vertex was sculpted and `mandate` holds the sculpted height.
    pub const SCULPTED: u32 = 1;
    /// `minimum` is an active lower bound.
    pub const FLOOR: u32 = 2;
    /// `maximum` is an active upper bound.
    pub const CEILING: u32 = 4;
    /// A mandate contributor pins the surface.
    pub const MANDATED: u32 = 8;
    /// Every bit owned by projection.
    pub const PROJECTED: u32 = FLOOR | CEILING | MANDATED;
}

/// Per-vertex edit state. This is the record persisted by saves.
#[repr(C)]
#[derive(Debug, Default, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct ModifyState {
    pub mandate: f32,
    pub minimum: f32,
    pub maximum: f32,
    pub mask: u32,
}

impl ModifyState {
    pub const BYTES: usize = std::mem::size_of::<ModifyState>();

    pub fn is_clear(&self) -> bool {
        self.mask == 0
    }

    pub fn has(&self, bit: u32) -> bool {
        self.mask & bit != 0
    }

    /// Sculpted height if any, otherwise the prototype ground.
    pub fn base(&self, ground: f32) -> f32 {
        if self.has(mask::SCULPTED) {
            self.mandate
        } else {
            ground
        }
    }

    /// Final surface height. The floor wins when bounds cross.
    pub fn resolve(&self, ground: f32) -> f32 {
        let mut height = self.base(ground);
        if self.has(mask::CEILING) {
            height = height.min(self.maximum);
        }
        if self.has(mask::FLOOR) {
            height = height.max(self.minimum);
        }
        height
    }

    pub fn to_le_bytes(&self) -> [u8; Self::BYTES] {
        let mut out = [0u8; Self::BYTES];
        out[0..4].copy_from_slice(&self.mandate.to_le_bytes());
        out[4..8].copy_from_slice(&self.minimum.to_le_bytes());
        out[8..12].copy_from_slice(&self.maximum.to_le_bytes());
        out[12..16].copy_from_slice(&self.mask.to_le_bytes());
        out
    }

    pub fn from_le_bytes(bytes: &[u8; Self::BYTES]) -> Self {
        let word = |i: usize| [bytes[i], bytes[i + 1], bytes[i + 2], bytes[i + 3]];
        Self {
            mandate: f32::from_le_bytes(word(0)),
            minimum: f32::from_le_bytes(word(4)),
            maximum: f32::from_le_bytes(word(8)),
            mask: u32::from_le_bytes(word(12)),
        }
    }
}

#[repr(C)]
#[derive(Debug, Default, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct Vertex {
    /// Chunk-local position. `y` is the resolved surface height.
    pub position: [f32; 3],
    pub normal: [f32; 3],
    /// Height before projection bounds are applied.
    pub base: f32,
    pub modify: ModifyState,
}

impl Vertex {
    pub fn height(&self) -> f32 {
        self.position[1]
    }

    /// Re-derives `base` and `position.y` from the modify state.
    pub fn resolve(&mut self, ground: f32) {
        self.base = self.modify.base(ground);
        self.position[1] = self.modify.resolve(ground);
    }
}
