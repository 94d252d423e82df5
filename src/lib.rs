// Layer modules
pub mod physical; // Link adapters: loopback, CAN controller shell
pub mod transport; // CTP codec, segmentation and reassembly

// Re-exports for convenience
pub use physical::{can, loopback, LinkAdapter};
pub use transport::ctp::{Ctp, CtpConfig};
pub use transport::mode::Mode;
pub use transport::reassembly::{receive, receive_bytes};
pub use transport::segment::{send, send_transfer};

// Common types and traits
pub mod error;
pub mod types;

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_is_valid() {
        assert!(!VERSION.is_empty());
    }
}
