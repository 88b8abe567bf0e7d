//! Ordered, mutable task pipeline with named insertion anchors.

use std::collections::HashMap;
use std::fmt;
use std::mem;

use futures_util::future::BoxFuture;
use thiserror::Error;
use tokio::sync::Mutex;

use crate::error::BoxError;
use crate::observability::metrics;

/// Outcome of a single task action.
pub type TaskResult = Result<(), BoxError>;

/// A stored task action. It borrows the execution context for the lifetime of
/// the future it returns and may be invoked again if it failed.
pub type Action<C> = Box<dyn for<'a> FnMut(&'a mut C) -> BoxFuture<'a, TaskResult> + Send>;

/// A task action failed; the task and everything after it remain queued.
#[derive(Debug, Error)]
#[error("task `{task}` failed")]
pub struct TaskError {
    pub task: String,
    #[source]
    pub source: BoxError,
}

struct Node<C> {
    name: String,
    action: Option<Action<C>>,
    prev: Option<usize>,
    next: Option<usize>,
}

enum Position<'a> {
    Head,
    Tail,
    Before(&'a str),
    After(&'a str),
}

/// Doubly-linked list of named tasks stored in an arena.
///
/// Invariants: the names reachable from `head` through `next` are exactly the
/// keys of `index`; `head` has no `prev`, `tail` has no `next`, and a single
/// task is both `head` and `tail`.
pub struct TaskList<C> {
    nodes: Vec<Node<C>>,
    free: Vec<usize>,
    index: HashMap<String, usize>,
    head: Option<usize>,
    tail: Option<usize>,
}

impl<C> TaskList<C> {
    /// Create an empty list.
    pub fn new() -> Self {
        Self {
            nodes: Vec::new(),
            free: Vec::new(),
            index: HashMap::new(),
            head: None,
            tail: None,
        }
    }

    /// Number of queued tasks.
    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    /// Task names in execution order.
    pub fn names(&self) -> Vec<String> {
        let mut names = Vec::with_capacity(self.len());
        let mut cursor = self.head;
        while let Some(idx) = cursor {
            names.push(self.nodes[idx].name.clone());
            cursor = self.nodes[idx].next;
        }
        names
    }

    /// Task names walked backwards from the tail.
    pub fn names_rev(&self) -> Vec<String> {
        let mut names = Vec::with_capacity(self.len());
        let mut cursor = self.tail;
        while let Some(idx) = cursor {
            names.push(self.nodes[idx].name.clone());
            cursor = self.nodes[idx].prev;
        }
        names
    }

    /// Append a task. Same as [`TaskList::add_tail`].
    pub fn add<F>(&mut self, name: impl Into<String>, action: F) -> bool
    where
        F: for<'a> FnMut(&'a mut C) -> BoxFuture<'a, TaskResult> + Send + 'static,
    {
        self.add_tail(name, action)
    }

    /// Insert a task at the front of the queue.
    ///
    /// Returns `false` without touching the queue when the name is empty or
    /// already present.
    pub fn add_head<F>(&mut self, name: impl Into<String>, action: F) -> bool
    where
        F: for<'a> FnMut(&'a mut C) -> BoxFuture<'a, TaskResult> + Send + 'static,
    {
        self.insert(name.into(), Box::new(action), Position::Head)
    }

    /// Insert a task at the back of the queue.
    pub fn add_tail<F>(&mut self, name: impl Into<String>, action: F) -> bool
    where
        F: for<'a> FnMut(&'a mut C) -> BoxFuture<'a, TaskResult> + Send + 'static,
    {
        self.insert(name.into(), Box::new(action), Position::Tail)
    }

    /// Insert a task immediately before `anchor`.
    ///
    /// An unknown anchor, or an anchor that is currently the head, degrades to
    /// [`TaskList::add_head`].
    pub fn add_before<F>(&mut self, name: impl Into<String>, action: F, anchor: &str) -> bool
    where
        F: for<'a> FnMut(&'a mut C) -> BoxFuture<'a, TaskResult> + Send + 'static,
    {
        self.insert(name.into(), Box::new(action), Position::Before(anchor))
    }

    /// Insert a task immediately after `anchor`.
    ///
    /// An unknown anchor, or an anchor that is currently the tail, degrades to
    /// [`TaskList::add_tail`].
    pub fn add_after<F>(&mut self, name: impl Into<String>, action: F, anchor: &str) -> bool
    where
        F: for<'a> FnMut(&'a mut C) -> BoxFuture<'a, TaskResult> + Send + 'static,
    {
        self.insert(name.into(), Box::new(action), Position::After(anchor))
    }

    /// Remove a task by name. Unknown names are ignored.
    pub fn remove(&mut self, name: &str) -> bool {
        match self.index.get(name).copied() {
            Some(idx) => {
                self.unlink(idx);
                true
            }
            None => false,
        }
    }

    /// Drop every task and reset to the empty state.
    pub fn clear(&mut self) {
        self.nodes.clear();
        self.free.clear();
        self.index.clear();
        self.head = None;
        self.tail = None;
    }

    /// Run tasks from the head in order.
    ///
    /// Each task is evicted once its action succeeds. The first failure stops
    /// the walk and leaves the failed task at the head, so a later call
    /// resumes from it without re-running anything that already succeeded.
    pub async fn execute(&mut self, ctx: &mut C) -> Result<(), TaskError> {
        while let Some(idx) = self.head {
            let name = self.nodes[idx].name.clone();
            let future = match self.nodes[idx].action.as_mut() {
                Some(action) => action(ctx),
                None => {
                    self.unlink(idx);
                    continue;
                }
            };

            tracing::debug!(task = %name, "Running queued task");
            if let Err(source) = future.await {
                tracing::error!(task = %name, error = %source, "Queued task failed");
                metrics::record_task(&name, false);
                return Err(TaskError { task: name, source });
            }
            metrics::record_task(&name, true);
            self.unlink(idx);
        }
        Ok(())
    }

    fn insert(&mut self, name: String, action: Action<C>, position: Position<'_>) -> bool {
        if name.is_empty() || self.index.contains_key(&name) {
            return false;
        }

        let lookup = |anchor: &str| self.index.get(anchor).copied();
        let (prev, next) = match position {
            Position::Head => (None, self.head),
            Position::Tail => (self.tail, None),
            Position::Before(target) => match lookup(target) {
                Some(a) if self.nodes[a].prev.is_some() => (self.nodes[a].prev, Some(a)),
                _ => (None, self.head),
            },
            Position::After(target) => match lookup(target) {
                Some(a) if self.nodes[a].next.is_some() => (Some(a), self.nodes[a].next),
                _ => (self.tail, None),
            },
        };

        let node = Node {
            name: name.clone(),
            action: Some(action),
            prev,
            next,
        };
        let idx = match self.free.pop() {
            Some(idx) => {
                self.nodes[idx] = node;
                idx
            }
            None => {
                self.nodes.push(node);
                self.nodes.len() - 1
            }
        };

        match prev {
            Some(p) => self.nodes[p].next = Some(idx),
            None => self.head = Some(idx),
        }
        match next {
            Some(n) => self.nodes[n].prev = Some(idx),
            None => self.tail = Some(idx),
        }
        self.index.insert(name, idx);
        true
    }

    fn unlink(&mut self, idx: usize) {
        let (prev, next) = (self.nodes[idx].prev, self.nodes[idx].next);
        match prev {
            Some(p) => self.nodes[p].next = next,
            None => self.head = next,
        }
        match next {
            Some(n) => self.nodes[n].prev = prev,
            None => self.tail = prev,
        }

        let node = &mut self.nodes[idx];
        node.prev = None;
        node.next = None;
        node.action = None;
        let name = mem::take(&mut node.name);
        self.index.remove(&name);
        self.free.push(idx);
    }
}

impl<C> Default for TaskList<C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C> fmt::Debug for TaskList<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.names()).finish()
    }
}

/// A [`TaskList`] behind a single async lock.
///
/// Every structural mutation and the whole of [`TaskQueue::execute`] hold the
/// lock, so a registration racing an in-progress run waits for it to finish.
pub struct TaskQueue<C> {
    inner: Mutex<TaskList<C>>,
}

impl<C> TaskQueue<C> {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(TaskList::new()),
        }
    }

    /// Borrow the list directly; exclusive access makes locking unnecessary.
    pub fn get_mut(&mut self) -> &mut TaskList<C> {
        self.inner.get_mut()
    }

    pub fn into_inner(self) -> TaskList<C> {
        self.inner.into_inner()
    }

    pub async fn len(&self) -> usize {
        self.inner.lock().await.len()
    }

    pub async fn names(&self) -> Vec<String> {
        self.inner.lock().await.names()
    }

    pub async fn add<F>(&self, name: impl Into<String>, action: F) -> bool
    where
        F: for<'a> FnMut(&'a mut C) -> BoxFuture<'a, TaskResult> + Send + 'static,
    {
        self.inner.lock().await.add(name, action)
    }

    pub async fn add_head<F>(&self, name: impl Into<String>, action: F) -> bool
    where
        F: for<'a> FnMut(&'a mut C) -> BoxFuture<'a, TaskResult> + Send + 'static,
    {
        self.inner.lock().await.add_head(name, action)
    }

    pub async fn add_tail<F>(&self, name: impl Into<String>, action: F) -> bool
    where
        F: for<'a> FnMut(&'a mut C) -> BoxFuture<'a, TaskResult> + Send + 'static,
    {
        self.inner.lock().await.add_tail(name, action)
    }

    pub async fn add_before<F>(&self, name: impl Into<String>, action: F, anchor: &str) -> bool
    where
        F: for<'a> FnMut(&'a mut C) -> BoxFuture<'a, TaskResult> + Send + 'static,
    {
        self.inner.lock().await.add_before(name, action, anchor)
    }

    pub async fn add_after<F>(&self, name: impl Into<String>, action: F, anchor: &str) -> bool
    where
        F: for<'a> FnMut(&'a mut C) -> BoxFuture<'a, TaskResult> + Send + 'static,
    {
        self.inner.lock().await.add_after(name, action, anchor)
    }

    pub async fn remove(&self, name: &str) -> bool {
        self.inner.lock().await.remove(name)
    }

    pub async fn clear(&self) {
        self.inner.lock().await.clear();
    }

    /// Run the queue while holding the lock for the entire walk.
    pub async fn execute(&self, ctx: &mut C) -> Result<(), TaskError> {
        let mut list = self.inner.lock().await;
        list.execute(ctx).await
    }
}

impl<C> Default for TaskQueue<C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C> From<TaskList<C>> for TaskQueue<C> {
    fn from(list: TaskList<C>) -> Self {
        Self {
            inner: Mutex::new(list),
        }
    }
}
