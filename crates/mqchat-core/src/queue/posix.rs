//! POSIX message queue transport
//!
//! Descriptors are opened with `O_NONBLOCK`. Waiting sends and receives poll
//! at `poll_interval`, so every wait is a plain tokio sleep that a cancelled
//! relay loop can drop without leaving a thread stuck inside the kernel.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use nix::errno::Errno;
use nix::mqueue::{
    mq_attr_member_t, mq_close, mq_getattr, mq_open, mq_receive, mq_send, mq_unlink, MQ_OFlag,
    MqAttr, MqdT,
};
use nix::sys::stat::Mode;
use tracing::{debug, warn};

use super::{
    validate_name, AccessMode, Disposition, MessageQueue, QueueAttributes, QueueProvider,
    QueueSpec,
};
use crate::errors::{Operation, QueueError, QueueResult};

// ----------------------------------------------------------------------------
// Provider
// ----------------------------------------------------------------------------

/// Opens queues in the system-wide POSIX namespace
#[derive(Debug, Clone)]
pub struct PosixQueueProvider {
    permissions: u32,
    poll_interval: Duration,
}

impl PosixQueueProvider {
    pub fn new(permissions: u32, poll_interval: Duration) -> Self {
        Self {
            permissions,
            poll_interval,
        }
    }

    /// Create the queue exclusively, falling back to attaching when it exists.
    ///
    /// A queue unlinked between the two attempts is created afresh.
    fn create_or_attach(&self, spec: &QueueSpec, flags: MQ_OFlag) -> QueueResult<(MqdT, bool)> {
        let requested = to_mq_attr(spec.attributes);
        let mode = Mode::from_bits_truncate(self.permissions);

        let mut attempts = 0;
        loop {
            attempts += 1;
            let exclusive = flags | MQ_OFlag::O_CREAT | MQ_OFlag::O_EXCL;
            match mq_open(spec.name.as_str(), exclusive, mode, Some(&requested)) {
                Ok(descriptor) => return Ok((descriptor, true)),
                Err(Errno::EEXIST) => {}
                Err(errno) => return Err(map_errno(&spec.name, errno)),
            }
            match attach(&spec.name, flags) {
                Ok(descriptor) => return Ok((descriptor, false)),
                Err(QueueError::NotFound { .. }) if attempts < 3 => continue,
                Err(e) => return Err(e),
            }
        }
    }
}

fn attach(name: &str, flags: MQ_OFlag) -> QueueResult<MqdT> {
    mq_open(name, flags, Mode::empty(), None).map_err(|errno| map_errno(name, errno))
}

impl QueueProvider for PosixQueueProvider {
    fn open(&self, spec: &QueueSpec) -> QueueResult<Arc<dyn MessageQueue>> {
        validate_name(&spec.name)?;

        let flags = MQ_OFlag::O_NONBLOCK
            | match spec.access {
                AccessMode::SendOnly => MQ_OFlag::O_WRONLY,
                AccessMode::ReceiveOnly => MQ_OFlag::O_RDONLY,
                AccessMode::SendReceive => MQ_OFlag::O_RDWR,
            };
        let (descriptor, created) = match spec.disposition {
            Disposition::CreateOrAttach => self.create_or_attach(spec, flags)?,
            Disposition::AttachExisting => (attach(&spec.name, flags)?, false),
        };

        let found = match mq_getattr(&descriptor) {
            Ok(actual) => from_mq_attr(&actual),
            Err(errno) => {
                let _ = mq_close(descriptor);
                return Err(map_errno(&spec.name, errno));
            }
        };
        if found != spec.attributes {
            let _ = mq_close(descriptor);
            return Err(QueueError::Incompatible {
                name: spec.name.clone(),
                expected: spec.attributes,
                found,
            });
        }

        debug!(
            "{} POSIX queue {} ({:?}, {})",
            if created { "Created" } else { "Attached to" },
            spec.name,
            spec.access,
            found
        );
        Ok(Arc::new(PosixQueue {
            name: spec.name.clone(),
            access: spec.access,
            attributes: found,
            poll_interval: self.poll_interval,
            created,
            descriptor: Mutex::new(Some(descriptor)),
        }))
    }

    fn destroy(&self, name: &str) -> QueueResult<()> {
        mq_unlink(name).map_err(|errno| map_errno(name, errno))?;
        debug!("Unlinked POSIX queue {}", name);
        Ok(())
    }

    fn exists(&self, name: &str) -> bool {
        match mq_open(
            name,
            MQ_OFlag::O_RDONLY | MQ_OFlag::O_NONBLOCK,
            Mode::empty(),
            None,
        ) {
            Ok(descriptor) => {
                let _ = mq_close(descriptor);
                true
            }
            Err(Errno::EACCES) => true,
            Err(_) => false,
        }
    }
}

// ----------------------------------------------------------------------------
// Handle
// ----------------------------------------------------------------------------

/// One open POSIX queue descriptor
#[derive(Debug)]
pub struct PosixQueue {
    name: String,
    access: AccessMode,
    attributes: QueueAttributes,
    poll_interval: Duration,
    created: bool,
    descriptor: Mutex<Option<MqdT>>,
}

impl PosixQueue {
    fn lock_descriptor(&self) -> QueueResult<MutexGuard<'_, Option<MqdT>>> {
        self.descriptor.lock().map_err(|_| QueueError::Io {
            name: self.name.clone(),
            source: std::io::Error::new(std::io::ErrorKind::Other, "descriptor lock poisoned"),
        })
    }

    fn check_access(&self, operation: Operation) -> QueueResult<()> {
        let allowed = match operation {
            Operation::Send => self.access.can_send(),
            Operation::Receive => self.access.can_receive(),
        };
        if allowed {
            Ok(())
        } else {
            Err(QueueError::AccessDenied {
                name: self.name.clone(),
                operation,
            })
        }
    }

    fn closed(&self) -> QueueError {
        QueueError::Closed {
            name: self.name.clone(),
        }
    }

    /// Dequeue without waiting; `None` when the queue is empty
    fn try_receive(&self) -> QueueResult<Option<Vec<u8>>> {
        self.check_access(Operation::Receive)?;
        let guard = self.lock_descriptor()?;
        let descriptor = guard.as_ref().ok_or_else(|| self.closed())?;

        let mut buffer = vec![0u8; self.attributes.max_msg_size];
        let mut priority = 0u32;
        match mq_receive(descriptor, &mut buffer, &mut priority) {
            Ok(len) => {
                buffer.truncate(len);
                Ok(Some(buffer))
            }
            Err(Errno::EAGAIN) | Err(Errno::EINTR) => Ok(None),
            Err(errno) => Err(map_errno(&self.name, errno)),
        }
    }
}

#[async_trait]
impl MessageQueue for PosixQueue {
    fn name(&self) -> &str {
        &self.name
    }

    fn attributes(&self) -> QueueAttributes {
        self.attributes
    }

    fn access(&self) -> AccessMode {
        self.access
    }

    fn created(&self) -> bool {
        self.created
    }

    async fn send(&self, payload: &[u8]) -> QueueResult<()> {
        loop {
            match self.try_send(payload) {
                Err(QueueError::Full { .. }) => tokio::time::sleep(self.poll_interval).await,
                other => return other,
            }
        }
    }

    fn try_send(&self, payload: &[u8]) -> QueueResult<()> {
        self.check_access(Operation::Send)?;
        self.attributes.check_payload(payload)?;

        let guard = self.lock_descriptor()?;
        let descriptor = guard.as_ref().ok_or_else(|| self.closed())?;
        match mq_send(descriptor, payload, 0) {
            Ok(()) => Ok(()),
            Err(Errno::EAGAIN) => Err(QueueError::Full {
                name: self.name.clone(),
            }),
            Err(Errno::EMSGSIZE) => Err(QueueError::MessageTooLarge {
                size: payload.len(),
                max: self.attributes.max_msg_size,
            }),
            Err(errno) => Err(map_errno(&self.name, errno)),
        }
    }

    async fn receive(&self) -> QueueResult<Vec<u8>> {
        loop {
            if let Some(message) = self.try_receive()? {
                return Ok(message);
            }
            tokio::time::sleep(self.poll_interval).await;
        }
    }

    fn close(&self) -> QueueResult<()> {
        let descriptor = self.lock_descriptor()?.take();
        if let Some(descriptor) = descriptor {
            mq_close(descriptor).map_err(|errno| map_errno(&self.name, errno))?;
            debug!("Closed POSIX queue {}", self.name);
        }
        Ok(())
    }

    fn is_closed(&self) -> bool {
        self.descriptor
            .lock()
            .map(|guard| guard.is_none())
            .unwrap_or(true)
    }
}

impl Drop for PosixQueue {
    fn drop(&mut self) {
        let descriptor = self
            .descriptor
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(descriptor) = descriptor {
            if let Err(e) = mq_close(descriptor) {
                warn!("Failed to close POSIX queue {}: {}", self.name, e);
            }
        }
    }
}

// ----------------------------------------------------------------------------
// Conversions
// ----------------------------------------------------------------------------

fn to_mq_attr(attributes: QueueAttributes) -> MqAttr {
    MqAttr::new(
        0,
        attributes.max_backlog as mq_attr_member_t,
        attributes.max_msg_size as mq_attr_member_t,
        0,
    )
}

fn from_mq_attr(attr: &MqAttr) -> QueueAttributes {
    QueueAttributes::new(
        usize::try_from(attr.maxmsg()).unwrap_or(0),
        usize::try_from(attr.msgsize()).unwrap_or(0),
    )
}

fn map_errno(name: &str, errno: Errno) -> QueueError {
    match errno {
        Errno::ENOENT => QueueError::NotFound {
            name: name.to_string(),
        },
        Errno::EEXIST => QueueError::AlreadyExists {
            name: name.to_string(),
        },
        Errno::EBADF => QueueError::Closed {
            name: name.to_string(),
        },
        other => QueueError::Io {
            name: name.to_string(),
            source: std::io::Error::from(other),
        },
    }
}
