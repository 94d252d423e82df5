use crate::error::{CtpError, Result};

/// CAN ID type
pub type CanId = u32;

/// Largest identifier an extended (29-bit) CAN frame can carry
pub const MAX_CAN_ID: CanId = 0x1FFF_FFFF;

/// Payload capacity of the largest link frame (CAN FD)
pub const MAX_FRAME_LEN: usize = 64;

/// Raw link frame exchanged with a link adapter.
///
/// Storage is fixed at the FD frame size; `len` says how many bytes are valid.
/// `data[0]` always carries the CTP frame kind tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawFrame {
    pub id: CanId,
    pub data: [u8; MAX_FRAME_LEN],
    pub len: u8,
    pub is_fd: bool,
}

impl RawFrame {
    /// Builds a frame from a byte slice. Fails if the slice does not fit a link frame.
    pub fn new(id: CanId, bytes: &[u8]) -> Result<Self> {
        if bytes.len() > MAX_FRAME_LEN {
            return Err(CtpError::InvalidParameter);
        }
        let mut data = [0u8; MAX_FRAME_LEN];
        data[..bytes.len()].copy_from_slice(bytes);
        Ok(Self {
            id,
            data,
            len: bytes.len() as u8,
            is_fd: bytes.len() > 8,
        })
    }

    /// Valid bytes of the frame. A `len` past the storage is clamped.
    pub fn bytes(&self) -> &[u8] {
        &self.data[..(self.len as usize).min(MAX_FRAME_LEN)]
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

impl Default for RawFrame {
    fn default() -> Self {
        Self {
            id: 0,
            data: [0; MAX_FRAME_LEN],
            len: 0,
            is_fd: false,
        }
    }
}

/// Configuration trait that must be implemented by all protocol configurations
pub trait Config: Send + Sync {
    fn validate(&self) -> Result<()>;
}

/// Port trait that must be implemented by platform-specific code.
///
/// `read` is non-blocking: `Ok(None)` means the receive queue is empty.
pub trait Port: Send {
    fn write(&mut self, frame: &RawFrame) -> Result<()>;
    fn read(&mut self) -> Result<Option<RawFrame>>;
}
