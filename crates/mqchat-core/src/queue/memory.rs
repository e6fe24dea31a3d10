//! In-process queue namespace
//!
//! Mirrors the POSIX semantics closely enough to run two full chat sessions
//! inside one test: names live in a shared broker, destroying a name leaves
//! open handles usable, and attaching checks the attributes.

use std::collections::{HashMap, VecDeque};
use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use tokio::sync::Notify;
use tracing::debug;

use super::{
    validate_name, AccessMode, Disposition, MessageQueue, QueueAttributes, QueueProvider,
    QueueSpec,
};
use crate::errors::{Operation, QueueError, QueueResult};

#[derive(Debug)]
struct Channel {
    attributes: QueueAttributes,
    messages: Mutex<VecDeque<Vec<u8>>>,
    readable: Notify,
    writable: Notify,
}

// ----------------------------------------------------------------------------
// Broker
// ----------------------------------------------------------------------------

/// Shared namespace of in-memory queues. Clones share the same namespace.
#[derive(Debug, Clone, Default)]
pub struct MemoryBroker {
    queues: Arc<Mutex<HashMap<String, Arc<Channel>>>>,
}

impl MemoryBroker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Messages currently waiting in `name`
    pub fn pending(&self, name: &str) -> Option<usize> {
        let queues = self.queues.lock().ok()?;
        let channel = queues.get(name)?;
        let messages = channel.messages.lock().ok()?;
        Some(messages.len())
    }

    fn lock_queues(&self, name: &str) -> QueueResult<MutexGuard<'_, HashMap<String, Arc<Channel>>>> {
        self.queues.lock().map_err(|_| poisoned(name))
    }
}

impl QueueProvider for MemoryBroker {
    fn open(&self, spec: &QueueSpec) -> QueueResult<Arc<dyn MessageQueue>> {
        validate_name(&spec.name)?;
        let mut queues = self.lock_queues(&spec.name)?;

        let mut created = false;
        let channel = match queues.get(&spec.name) {
            Some(existing) if existing.attributes != spec.attributes => {
                return Err(QueueError::Incompatible {
                    name: spec.name.clone(),
                    expected: spec.attributes,
                    found: existing.attributes,
                });
            }
            Some(existing) => existing.clone(),
            None if spec.disposition == Disposition::AttachExisting => {
                return Err(QueueError::NotFound {
                    name: spec.name.clone(),
                });
            }
            None => {
                debug!("Creating in-memory queue {}", spec.name);
                let channel = Arc::new(Channel {
                    attributes: spec.attributes,
                    messages: Mutex::new(VecDeque::with_capacity(spec.attributes.max_backlog)),
                    readable: Notify::new(),
                    writable: Notify::new(),
                });
                queues.insert(spec.name.clone(), channel.clone());
                created = true;
                channel
            }
        };

        Ok(Arc::new(MemoryQueue {
            name: spec.name.clone(),
            access: spec.access,
            channel,
            created,
            closed: AtomicBool::new(false),
        }))
    }

    fn destroy(&self, name: &str) -> QueueResult<()> {
        let mut queues = self.lock_queues(name)?;
        match queues.remove(name) {
            Some(_) => {
                debug!("Destroyed in-memory queue {}", name);
                Ok(())
            }
            None => Err(QueueError::NotFound {
                name: name.to_string(),
            }),
        }
    }

    fn exists(&self, name: &str) -> bool {
        self.queues
            .lock()
            .map(|queues| queues.contains_key(name))
            .unwrap_or(false)
    }
}

// ----------------------------------------------------------------------------
// Handle
// ----------------------------------------------------------------------------

/// Handle onto a [`MemoryBroker`] queue
#[derive(Debug)]
pub struct MemoryQueue {
    name: String,
    access: AccessMode,
    channel: Arc<Channel>,
    created: bool,
    closed: AtomicBool,
}

impl MemoryQueue {
    fn ensure_usable(&self, operation: Operation) -> QueueResult<()> {
        if self.is_closed() {
            return Err(QueueError::Closed {
                name: self.name.clone(),
            });
        }
        let allowed = match operation {
            Operation::Send => self.access.can_send(),
            Operation::Receive => self.access.can_receive(),
        };
        if !allowed {
            return Err(QueueError::AccessDenied {
                name: self.name.clone(),
                operation,
            });
        }
        Ok(())
    }

    fn lock_messages(&self) -> QueueResult<MutexGuard<'_, VecDeque<Vec<u8>>>> {
        self.channel
            .messages
            .lock()
            .map_err(|_| poisoned(&self.name))
    }

    fn try_pop(&self) -> QueueResult<Option<Vec<u8>>> {
        let message = self.lock_messages()?.pop_front();
        if message.is_some() {
            self.channel.writable.notify_one();
        }
        Ok(message)
    }
}

#[async_trait]
impl MessageQueue for MemoryQueue {
    fn name(&self) -> &str {
        &self.name
    }

    fn attributes(&self) -> QueueAttributes {
        self.channel.attributes
    }

    fn access(&self) -> AccessMode {
        self.access
    }

    fn created(&self) -> bool {
        self.created
    }

    async fn send(&self, payload: &[u8]) -> QueueResult<()> {
        loop {
            let writable = self.channel.writable.notified();
            tokio::pin!(writable);
            writable.as_mut().enable();

            match self.try_send(payload) {
                Err(QueueError::Full { .. }) => writable.await,
                other => return other,
            }
        }
    }

    fn try_send(&self, payload: &[u8]) -> QueueResult<()> {
        self.ensure_usable(Operation::Send)?;
        self.channel.attributes.check_payload(payload)?;

        {
            let mut messages = self.lock_messages()?;
            if messages.len() >= self.channel.attributes.max_backlog {
                return Err(QueueError::Full {
                    name: self.name.clone(),
                });
            }
            messages.push_back(payload.to_vec());
        }
        self.channel.readable.notify_one();
        Ok(())
    }

    async fn receive(&self) -> QueueResult<Vec<u8>> {
        loop {
            self.ensure_usable(Operation::Receive)?;

            let readable = self.channel.readable.notified();
            tokio::pin!(readable);
            readable.as_mut().enable();

            if let Some(message) = self.try_pop()? {
                return Ok(message);
            }
            readable.await;
        }
    }

    fn close(&self) -> QueueResult<()> {
        if !self.closed.swap(true, Ordering::SeqCst) {
            // Wake anyone parked on this handle so they observe the close.
            self.channel.readable.notify_waiters();
            self.channel.writable.notify_waiters();
        }
        Ok(())
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

fn poisoned(name: &str) -> QueueError {
    QueueError::Io {
        name: name.to_string(),
        source: io::Error::new(io::ErrorKind::Other, "queue lock poisoned"),
    }
}
