//! Process-wide budget for secret material.
//!
//! [`SecureArena`] is an explicit capability: code that needs to hold a
//! password, seed or decrypted record asks the arena for a [`SecretBuf`].
//! Buffers are zeroed when dropped and return their bytes to the arena. Only
//! one registered arena may exist per process.

use core::fmt;
use core::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use zeroize::Zeroizing;

use crate::error::{Error, Result};

static REGISTERED: AtomicBool = AtomicBool::new(false);

/// Default arena size used by the command-line front end.
pub const DEFAULT_CAPACITY: usize = 64 * 1024;

/// Budgeted allocator for secret buffers.
pub struct SecureArena {
    capacity: usize,
    in_use: Arc<AtomicUsize>,
    registered: bool,
}

impl SecureArena {
    /// Initialize the process-wide arena.
    ///
    /// Fails with [`Error::ArenaAlreadyInitialized`] while another registered
    /// arena is alive.
    pub fn init(capacity: usize) -> Result<Self> {
        if REGISTERED
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(Error::ArenaAlreadyInitialized);
        }
        tracing::debug!(capacity, "secure arena initialized");
        Ok(Self {
            capacity,
            in_use: Arc::new(AtomicUsize::new(0)),
            registered: true,
        })
    }

    /// An arena that does not claim the process-wide slot, so tests can run
    /// in parallel.
    #[cfg(any(test, feature = "test-util"))]
    pub fn for_tests(capacity: usize) -> Self {
        Self {
            capacity,
            in_use: Arc::new(AtomicUsize::new(0)),
            registered: false,
        }
    }

    /// Total bytes this arena may lend out.
    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    /// Bytes currently held by live buffers.
    pub fn in_use(&self) -> usize {
        self.in_use.load(Ordering::Acquire)
    }

    /// Bytes still available.
    pub fn available(&self) -> usize {
        self.capacity.saturating_sub(self.in_use())
    }

    /// Lend a zero-filled buffer of `len` bytes.
    pub fn alloc(&self, len: usize) -> Result<SecretBuf> {
        let capacity = self.capacity;
        self.in_use
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |used| {
                used.checked_add(len).filter(|total| *total <= capacity)
            })
            .map_err(|used| Error::ArenaExhausted {
                requested: len,
                available: capacity.saturating_sub(used),
            })?;

        tracing::trace!(len, "secure arena lease");
        Ok(SecretBuf {
            bytes: Zeroizing::new(vec![0u8; len]),
            lease: Arc::clone(&self.in_use),
        })
    }

    /// Lend a buffer holding a copy of `bytes`.
    pub fn copy_from(&self, bytes: &[u8]) -> Result<SecretBuf> {
        let mut buf = self.alloc(bytes.len())?;
        buf.copy_from_slice(bytes);
        Ok(buf)
    }

    /// Tear the arena down, releasing the process-wide slot.
    ///
    /// Buffers that outlive the arena still zero themselves on drop.
    pub fn teardown(self) {
        let outstanding = self.in_use();
        if outstanding > 0 {
            tracing::warn!(outstanding, "secure arena torn down with live buffers");
        } else {
            tracing::debug!("secure arena torn down");
        }
    }
}

impl Drop for SecureArena {
    fn drop(&mut self) {
        if self.registered {
            REGISTERED.store(false, Ordering::Release);
        }
    }
}

impl fmt::Debug for SecureArena {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SecureArena")
            .field("capacity", &self.capacity)
            .field("in_use", &self.in_use())
            .finish()
    }
}

/// A secret buffer lent by a [`SecureArena`].
pub struct SecretBuf {
    bytes: Zeroizing<Vec<u8>>,
    lease: Arc<AtomicUsize>,
}

impl SecretBuf {
    /// View the contents as UTF-8.
    pub fn as_str(&self) -> Result<&str> {
        core::str::from_utf8(&self.bytes).map_err(|_| Error::MalformedInput("not UTF-8"))
    }
}

impl Deref for SecretBuf {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        &self.bytes
    }
}

impl DerefMut for SecretBuf {
    fn deref_mut(&mut self) -> &mut [u8] {
        &mut self.bytes
    }
}

impl Drop for SecretBuf {
    fn drop(&mut self) {
        self.lease.fetch_sub(self.bytes.len(), Ordering::AcqRel);
    }
}

impl fmt::Debug for SecretBuf {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SecretBuf({} bytes)[REDACTED]", self.bytes.len())
    }
}
