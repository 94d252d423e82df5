//! Link layer for the CAN transport protocol.
//!
//! The transport core needs exactly two primitives from a link: transmit one
//! addressed raw frame, and poll for the next received one without blocking.
//! This module defines that seam and ships two adapters:
//! - [`loopback::Loopback`], an in-memory queue that feeds transmitted frames
//!   back to the receiver
//! - [`can::CanLink`], a CAN controller shell over a platform [`Port`](crate::types::Port)
//!
//! # Examples
//!
//! ```rust
//! use libctp::physical::{loopback::Loopback, LinkAdapter};
//! use libctp::types::RawFrame;
//!
//! let mut link = Loopback::new();
//! let frame = RawFrame::new(0x123, &[2, 0xAA]).unwrap();
//! assert!(link.transmit(&frame));
//! assert_eq!(link.poll_receive(), Some(frame));
//! assert_eq!(link.poll_receive(), None);
//! ```

pub mod can;
pub mod loopback;

use crate::types::RawFrame;

/// Link adapter trait implemented by hardware drivers and test links
pub trait LinkAdapter: Send {
    /// Best-effort send of one raw frame. `false` signals a link-level failure.
    fn transmit(&mut self, frame: &RawFrame) -> bool;

    /// Non-blocking receive. `None` means no frame is currently available.
    fn poll_receive(&mut self) -> Option<RawFrame>;
}

impl<L: LinkAdapter + ?Sized> LinkAdapter for &mut L {
    fn transmit(&mut self, frame: &RawFrame) -> bool {
        (**self).transmit(frame)
    }

    fn poll_receive(&mut self) -> Option<RawFrame> {
        (**self).poll_receive()
    }
}

impl<L: LinkAdapter + ?Sized> LinkAdapter for Box<L> {
    fn transmit(&mut self, frame: &RawFrame) -> bool {
        (**self).transmit(frame)
    }

    fn poll_receive(&mut self) -> Option<RawFrame> {
        (**self).poll_receive()
    }
}
