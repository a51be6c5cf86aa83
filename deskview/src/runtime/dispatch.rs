//! Main-thread dispatch protocol.
//!
//! Native windowing toolkits only tolerate calls from the thread that runs
//! their event loop. The [`Dispatcher`] remembers that thread and forwards
//! work to it through the platform's [`LoopWaker`]. Tasks posted from any
//! number of threads run in the order the waker accepted them.
use std::error::Error;
use std::fmt;
use std::sync::Arc;
use std::sync::mpsc;
use std::thread::{self, ThreadId};

use crate::framework::logging::*;
use crate::platform::LoopWaker;

pub type Task = Box<dyn FnOnce() + Send + 'static>;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum DispatchError {
    /// The event loop has been torn down and no longer accepts tasks
    LoopClosed,
    /// The task was accepted but dropped before it ran
    TaskDropped,
}

impl fmt::Display for DispatchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DispatchError::LoopClosed => {
                write!(f, "event loop is closed")
            }
            DispatchError::TaskDropped => {
                write!(f, "task was dropped before it ran")
            }
        }
    }
}

impl Error for DispatchError {}

#[derive(Clone)]
pub struct Dispatcher {
    owner: ThreadId,
    waker: Arc<dyn LoopWaker>,
}

impl Dispatcher {
    /// Binds a dispatcher to the calling thread.
    pub fn new(waker: Arc<dyn LoopWaker>) -> Self {
        Self {
            owner: thread::current().id(),
            waker,
        }
    }

    pub fn is_main_thread(&self) -> bool {
        thread::current().id() == self.owner
    }

    /// Queues `task` on the loop thread without waiting for it. Always
    /// queues, even when called from the loop thread itself.
    pub fn dispatch<F>(&self, task: F) -> Result<(), DispatchError>
    where
        F: FnOnce() + Send + 'static,
    {
        self.waker.post(Box::new(task)).map_err(|_| {
            warn!("Dropping task posted to a closed event loop");
            DispatchError::LoopClosed
        })
    }

    /// Runs `task` on the loop thread and returns its result.
    ///
    /// On the loop thread the task runs inline. Elsewhere the caller blocks
    /// until the loop has executed it, so the loop must eventually be
    /// entered; blocking on a loop that never runs never returns.
    pub fn dispatch_on_main_thread<R, F>(&self, task: F) -> Result<R, DispatchError>
    where
        F: FnOnce() -> R + Send + 'static,
        R: Send + 'static,
    {
        if self.is_main_thread() {
            return Ok(task());
        }

        let (result_tx, result_rx) = mpsc::sync_channel(1);
        self.dispatch(move || {
            let _ = result_tx.send(task());
        })?;

        trace!("Waiting on main thread result");
        result_rx.recv().map_err(|_| DispatchError::TaskDropped)
    }

    pub(crate) fn exit_loop(&self) {
        self.waker.exit();
    }
}

impl fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dispatcher")
            .field("owner", &self.owner)
            .finish()
    }
}
