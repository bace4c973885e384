use crate::chat::message::ThreadId;
use crate::chat::thread::Thread;

/// Row rendered by the thread list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThreadSummary {
    pub position: usize,
    pub id: ThreadId,
    pub title: String,
    pub message_count: usize,
    pub is_active: bool,
    pub is_streaming: bool,
}

/// Ordered set of threads with one active selection.
///
/// The list is never empty: archiving the last thread replaces it with a fresh one.
#[derive(Debug, Clone)]
pub struct ThreadList {
    threads: Vec<Thread>,
    active: usize,
    next_thread_id: u64,
}

impl Default for ThreadList {
    fn default() -> Self {
        Self::new()
    }
}

impl ThreadList {
    /// Creates a list holding one empty active thread.
    pub fn new() -> Self {
        let mut list = Self {
            threads: Vec::new(),
            active: 0,
            next_thread_id: 1,
        };
        list.create();
        list
    }

    /// Appends an empty thread and makes it active.
    pub fn create(&mut self) -> ThreadId {
        let id = ThreadId::new(self.next_thread_id);
        self.next_thread_id += 1;
        self.threads.push(Thread::new(id));
        self.active = self.threads.len() - 1;
        tracing::debug!(thread_id = id.0, "created thread");
        id
    }

    pub fn len(&self) -> usize {
        self.threads.len()
    }

    pub fn is_empty(&self) -> bool {
        self.threads.is_empty()
    }

    /// Returns the active thread.
    pub fn active(&self) -> &Thread {
        &self.threads[self.active]
    }

    pub fn active_mut(&mut self) -> &mut Thread {
        &mut self.threads[self.active]
    }

    /// Finds a thread by id.
    pub fn get(&self, id: ThreadId) -> Option<&Thread> {
        self.threads.iter().find(|thread| thread.id == id)
    }

    pub fn get_mut(&mut self, id: ThreadId) -> Option<&mut Thread> {
        self.threads.iter_mut().find(|thread| thread.id == id)
    }

    /// Activates the thread at `position` (zero based).
    pub fn select(&mut self, position: usize) -> Option<ThreadId> {
        let id = self.threads.get(position)?.id;
        self.active = position;
        Some(id)
    }

    /// Removes the thread at `position` (zero based).
    pub fn archive(&mut self, position: usize) -> Option<Thread> {
        if position >= self.threads.len() {
            return None;
        }

        let removed = self.threads.remove(position);
        if self.threads.is_empty() {
            self.create();
        } else if self.active > position || self.active >= self.threads.len() {
            self.active = self.active.saturating_sub(1);
        }

        tracing::debug!(thread_id = removed.id.0, "archived thread");
        Some(removed)
    }

    /// Summarizes every thread in display order.
    pub fn summaries(&self) -> Vec<ThreadSummary> {
        self.threads
            .iter()
            .enumerate()
            .map(|(position, thread)| ThreadSummary {
                position,
                id: thread.id,
                title: thread.title(),
                message_count: thread.messages.len(),
                is_active: position == self.active,
                is_streaming: thread.stream_state.is_streaming(),
            })
            .collect()
    }
}
