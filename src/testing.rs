//! Chain stand-ins for the unit tests.

use std::cell::RefCell;
use std::rc::Rc;
use std::sync::{Arc, Mutex};

use crate::common::ShiftChain;

/// Records every transmitted frame; clones share the same recording.
#[derive(Clone, Default)]
pub(crate) struct RecordingChain {
    frames: Rc<RefCell<Vec<Vec<u8>>>>,
}

impl RecordingChain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn flush_count(&self) -> usize {
        self.frames.borrow().len()
    }

    pub fn last_frame(&self) -> Option<Vec<u8>> {
        self.frames.borrow().last().cloned()
    }
}

impl ShiftChain for RecordingChain {
    type Error = core::convert::Infallible;

    fn transmit(&mut self, frame: &[u8]) -> Result<(), Self::Error> {
        self.frames.borrow_mut().push(frame.to_vec());
        Ok(())
    }
}

/// Thread-safe variant of [`RecordingChain`] for concurrency tests.
#[derive(Clone, Default)]
pub(crate) struct SharedChain {
    frames: Arc<Mutex<Vec<Vec<u8>>>>,
}

impl SharedChain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn flush_count(&self) -> usize {
        self.frames.lock().unwrap().len()
    }
}

impl ShiftChain for SharedChain {
    type Error = core::convert::Infallible;

    fn transmit(&mut self, frame: &[u8]) -> Result<(), Self::Error> {
        self.frames.lock().unwrap().push(frame.to_vec());
        Ok(())
    }
}
