//! Mode parameters.
//!
//! Every capacity the codec and the engines use is derived from the active
//! [`Mode`], so both wire layouts (1-byte and 2-byte length header) share one
//! code path.
//!
//! | Mode     | Link | START hdr | START | CONSECUTIVE | END | Max transfer |
//! |----------|------|-----------|-------|-------------|-----|--------------|
//! | Classic  | 8    | 2         | 6     | 6           | 7   | 255          |
//! | Extended | 64   | 3         | 61    | 62          | 63  | 15934        |

/// Bytes taken by the frame kind tag
pub const TAG_SIZE: usize = 1;

/// Bytes taken by the CONSECUTIVE sequence field
pub const SEQUENCE_SIZE: usize = 1;

/// Link capacity profile
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Mode {
    /// Classic CAN, 8-byte frames, 1-byte length field
    #[default]
    Classic,
    /// CAN FD, 64-byte frames, 2-byte big-endian length field
    Extended,
}

impl Mode {
    /// Total bytes per raw frame
    pub const fn link_capacity(self) -> usize {
        match self {
            Mode::Classic => 8,
            Mode::Extended => 64,
        }
    }

    /// Width of the START frame's total length field
    pub const fn length_field_size(self) -> usize {
        match self {
            Mode::Classic => 1,
            Mode::Extended => 2,
        }
    }

    pub const fn start_header_size(self) -> usize {
        TAG_SIZE + self.length_field_size()
    }

    pub const fn consecutive_header_size(self) -> usize {
        TAG_SIZE + SEQUENCE_SIZE
    }

    pub const fn end_header_size(self) -> usize {
        TAG_SIZE
    }

    pub const fn start_capacity(self) -> usize {
        self.link_capacity() - self.start_header_size()
    }

    pub const fn consecutive_capacity(self) -> usize {
        self.link_capacity() - self.consecutive_header_size()
    }

    pub const fn end_capacity(self) -> usize {
        self.link_capacity() - self.end_header_size()
    }

    /// Largest sequence count a single transfer may use before a new START
    pub const fn max_sequence(self) -> usize {
        u8::MAX as usize
    }

    /// Largest value the START length field can encode
    pub const fn max_total_length(self) -> usize {
        match self {
            Mode::Classic => u8::MAX as usize,
            Mode::Extended => u16::MAX as usize,
        }
    }

    /// Largest payload one START..END transfer can carry.
    ///
    /// Bounded both by frame addressing and by the length field width.
    pub const fn max_transfer_len(self) -> usize {
        let by_frames = self.start_capacity()
            + self.max_sequence() * self.consecutive_capacity()
            + self.end_capacity();
        let by_header = self.max_total_length();
        if by_frames < by_header {
            by_frames
        } else {
            by_header
        }
    }

    /// Whether raw frames of this mode need an FD link
    pub const fn is_fd(self) -> bool {
        matches!(self, Mode::Extended)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classic_capacities() {
        let mode = Mode::Classic;
        assert_eq!(mode.link_capacity(), 8);
        assert_eq!(mode.start_capacity(), 6);
        assert_eq!(mode.consecutive_capacity(), 6);
        assert_eq!(mode.end_capacity(), 7);
        assert_eq!(mode.max_transfer_len(), 255);
    }

    #[test]
    fn extended_capacities() {
        let mode = Mode::Extended;
        assert_eq!(mode.link_capacity(), 64);
        assert_eq!(mode.start_capacity(), 61);
        assert_eq!(mode.consecutive_capacity(), 62);
        assert_eq!(mode.end_capacity(), 63);
        assert_eq!(mode.max_transfer_len(), 61 + 255 * 62 + 63);
        assert!(mode.max_transfer_len() <= mode.max_total_length());
    }
}
