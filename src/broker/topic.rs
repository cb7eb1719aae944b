//! Topic management
//!
//! A `Topic` is a named, unbounded FIFO queue. The sending half is shared by
//! every publisher; the single receiving half sits behind an async mutex so
//! concurrent consumers take turns and each payload reaches exactly one of
//! them.

use std::sync::Arc;

use tokio::sync::{Mutex, mpsc};

pub type SharedReceiver = Arc<Mutex<mpsc::UnboundedReceiver<Vec<u8>>>>;

#[derive(Debug)]
pub struct Topic {
    pub name: String,
    sender: mpsc::UnboundedSender<Vec<u8>>,
    receiver: SharedReceiver,
}

impl Topic {
    /// Create a new, empty topic with the given name.
    pub fn new(name: &str) -> Self {
        let (sender, receiver) = mpsc::unbounded_channel();
        Self {
            name: name.to_string(),
            sender,
            receiver: Arc::new(Mutex::new(receiver)),
        }
    }

    /// Append a payload to the back of the queue.
    ///
    /// The topic owns its receiver, so this only fails if the receiver was
    /// explicitly closed; the payload is handed back in that case.
    pub fn push(&self, payload: Vec<u8>) -> Result<(), Vec<u8>> {
        self.sender.send(payload).map_err(|e| e.0)
    }

    /// Shared handle to the receiving half.
    pub fn receiver(&self) -> SharedReceiver {
        self.receiver.clone()
    }
}
