use std::collections::VecDeque;

use super::LinkAdapter;
use crate::types::RawFrame;

/// Hook applied to every transmitted frame before it is queued for reception.
/// Returning `None` drops the frame.
pub type LoopbackHook = Box<dyn FnMut(RawFrame) -> Option<RawFrame> + Send>;

/// In-memory loopback link
pub struct Loopback {
    queue: VecDeque<RawFrame>,
    sent: Vec<RawFrame>,
    hook: Option<LoopbackHook>,
    fail_transmit: bool,
}

impl Loopback {
    /// Creates an empty loopback link
    pub fn new() -> Self {
        Self {
            queue: VecDeque::new(),
            sent: Vec::new(),
            hook: None,
            fail_transmit: false,
        }
    }

    /// Creates a loopback link that passes every transmitted frame through `hook`
    pub fn with_hook(hook: LoopbackHook) -> Self {
        Self {
            hook: Some(hook),
            ..Self::new()
        }
    }

    /// Sets a new transmit hook
    pub fn set_hook(&mut self, hook: Option<LoopbackHook>) {
        self.hook = hook;
    }

    /// Makes every following `transmit` report a link failure
    pub fn set_fail_transmit(&mut self, fail: bool) {
        self.fail_transmit = fail;
    }

    /// Queues a frame for reception as if it arrived from the bus
    pub fn inject(&mut self, frame: RawFrame) {
        self.queue.push_back(frame);
    }

    /// Frames accepted by `transmit`, in order, before the hook ran
    pub fn sent(&self) -> &[RawFrame] {
        &self.sent
    }

    /// Number of frames waiting to be received
    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    pub fn clear(&mut self) {
        self.queue.clear();
        self.sent.clear();
    }
}

impl Default for Loopback {
    fn default() -> Self {
        Self::new()
    }
}

impl LinkAdapter for Loopback {
    fn transmit(&mut self, frame: &RawFrame) -> bool {
        if self.fail_transmit {
            return false;
        }
        self.sent.push(*frame);

        let frame = match self.hook.as_mut() {
            Some(hook) => hook(*frame),
            None => Some(*frame),
        };
        if let Some(frame) = frame {
            self.queue.push_back(frame);
        }
        true
    }

    fn poll_receive(&mut self) -> Option<RawFrame> {
        self.queue.pop_front()
    }
}
