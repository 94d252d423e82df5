use std::time::{Duration, Instant};

use tracing::debug;

use super::mode::Mode;
use super::reassembly::{receive_bytes_until, receive_until, Reassembler, Step};
use super::segment;
use super::TransportLayer;
use crate::error::{CtpError, Result};
use crate::physical::LinkAdapter;
use crate::types::{CanId, Config, MAX_CAN_ID};

/// CTP configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CtpConfig {
    pub mode: Mode,
    /// Destination id for outgoing transfers
    pub tx_id: CanId,
    /// Only accept transfers from this id. `None` locks onto the first START seen.
    pub rx_id: Option<CanId>,
    /// Upper bound for one `receive` call. `None` polls until the transfer ends.
    pub timeout_ms: Option<u32>,
}

impl Default for CtpConfig {
    fn default() -> Self {
        Self {
            mode: Mode::Classic,
            tx_id: 0,
            rx_id: None,
            timeout_ms: None,
        }
    }
}

impl Config for CtpConfig {
    fn validate(&self) -> Result<()> {
        if self.tx_id > MAX_CAN_ID || self.rx_id.map_or(false, |id| id > MAX_CAN_ID) {
            return Err(CtpError::InvalidParameter);
        }
        if self.timeout_ms == Some(0) {
            return Err(CtpError::InvalidParameter);
        }
        Ok(())
    }
}

/// CTP endpoint over a link adapter
pub struct Ctp<L: LinkAdapter> {
    config: CtpConfig,
    link: L,
    reassembler: Reassembler,
    is_open: bool,
}

impl<L: LinkAdapter> Ctp<L> {
    /// Creates a new CTP endpoint with the given link
    pub fn with_link(config: CtpConfig, link: L) -> Self {
        let reassembler = Reassembler::new(config.mode, config.rx_id);
        Self {
            config,
            link,
            reassembler,
            is_open: false,
        }
    }

    pub fn config(&self) -> &CtpConfig {
        &self.config
    }

    pub fn link(&self) -> &L {
        &self.link
    }

    pub fn link_mut(&mut self) -> &mut L {
        &mut self.link
    }

    pub fn into_link(self) -> L {
        self.link
    }

    /// Sends `data` to an explicit id instead of the configured `tx_id`
    pub fn send_to(&mut self, id: CanId, data: &[u8]) -> Result<usize> {
        if !self.is_open {
            return Err(CtpError::NotInitialized);
        }
        segment::send(&mut self.link, id, data, self.config.mode)
    }

    /// Runs one reassembly step. Partial state is kept between calls, so
    /// `buffer` must be the same for every step of a transfer.
    pub fn poll_once(&mut self, buffer: &mut [u8]) -> Result<Step> {
        if !self.is_open {
            return Err(CtpError::NotInitialized);
        }
        self.reassembler.poll_once(&mut self.link, buffer)
    }

    fn deadline(&self) -> Option<Instant> {
        self.config
            .timeout_ms
            .map(|ms| Instant::now() + Duration::from_millis(ms as u64))
    }
}

impl<L: LinkAdapter> TransportLayer for Ctp<L> {
    type Config = CtpConfig;

    fn open(&mut self) -> Result<()> {
        if self.is_open {
            return Ok(());
        }
        self.config.validate()?;
        self.reassembler = Reassembler::new(self.config.mode, self.config.rx_id);
        self.is_open = true;
        debug!(mode = ?self.config.mode, tx_id = self.config.tx_id, "CTP endpoint open");
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        self.reassembler.reset();
        self.is_open = false;
        Ok(())
    }

    fn send(&mut self, data: &[u8]) -> Result<usize> {
        let id = self.config.tx_id;
        self.send_to(id, data)
    }

    fn receive(&mut self, buffer: &mut [u8]) -> Result<usize> {
        if !self.is_open {
            return Err(CtpError::NotInitialized);
        }
        let deadline = self.deadline();
        receive_until(&mut self.link, &mut self.reassembler, buffer, deadline)
    }

    fn receive_bytes(&mut self, buffer: &mut [u8], length: usize) -> Result<usize> {
        if !self.is_open {
            return Err(CtpError::NotInitialized);
        }
        let deadline = self.deadline();
        receive_bytes_until(
            &mut self.link,
            &mut self.reassembler,
            buffer,
            length,
            deadline,
        )
    }

    fn set_timeout(&mut self, timeout_ms: Option<u32>) -> Result<()> {
        if timeout_ms == Some(0) {
            return Err(CtpError::InvalidParameter);
        }
        self.config.timeout_ms = timeout_ms;
        Ok(())
    }
}
