pub mod ctp;
pub mod frame;
pub mod mode;
pub mod reassembly;
pub mod segment;


use crate::error::Result;
use crate::types::Config;

/// Transport layer trait implemented by [`ctp::Ctp`]
pub trait TransportLayer: Send {
    type Config: Config;

    fn open(&mut self) -> Result<()>;
    fn close(&mut self) -> Result<()>;
    /// Sends `data` and returns the number of bytes sent
    fn send(&mut self, data: &[u8]) -> Result<usize>;
    /// Receives one transfer into `buffer` and returns its length
    fn receive(&mut self, buffer: &mut [u8]) -> Result<usize>;
    /// Receives exactly `length` bytes spread over one or more transfers
    fn receive_bytes(&mut self, buffer: &mut [u8], length: usize) -> Result<usize>;
    fn set_timeout(&mut self, timeout_ms: Option<u32>) -> Result<()>;
}
