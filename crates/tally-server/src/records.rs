//! The records the API hands out: assistants, threads and runs
use std::sync::Arc;
use tally::conversation::Conversation;
use tokio::sync::Mutex;

pub use tally::api::types::{Assistant, Run, RunStatus, Thread, GRAPH_ID};

/// A thread and its conversation so far
#[derive(Debug)]
pub struct ThreadRecord {
    pub thread: Thread,
    pub conversation: Conversation,
}

/// Runs on one thread take this lock, so they apply one after another
pub type SharedThread = Arc<Mutex<ThreadRecord>>;

impl ThreadRecord {
    pub fn shared(thread: Thread) -> SharedThread {
        Arc::new(Mutex::new(ThreadRecord {
            thread,
            conversation: Conversation::new(),
        }))
    }
}
