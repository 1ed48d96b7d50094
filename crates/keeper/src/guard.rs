//! Mutual exclusion at two levels: one in-flight voice operation per
//! process, and one process per target.

use std::{
    fs::{File, OpenOptions},
    io::{self, Write},
    net::{Ipv4Addr, TcpListener},
    path::PathBuf,
    sync::Arc,
};

use {
    tether_config::InstanceGuardSpec,
    tokio::sync::{Mutex, OwnedMutexGuard},
    tracing::{debug, info},
};

use crate::error::{Error, Result};

/// Process-wide gate around connect/move attempts.
///
/// Cloning shares the same gate. Every path that may start a voice operation
/// must hold a permit for the whole operation.
#[derive(Debug, Clone, Default)]
pub struct ConnectGate {
    inner: Arc<Mutex<()>>,
}

/// Held for the duration of one voice operation.
#[derive(Debug)]
pub struct ConnectPermit {
    _guard: OwnedMutexGuard<()>,
}

impl ConnectGate {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn acquire(&self) -> ConnectPermit {
        ConnectPermit {
            _guard: Arc::clone(&self.inner).lock_owned().await,
        }
    }

    /// A permit if no operation is in flight.
    #[cfg(test)]
    #[must_use]
    pub(crate) fn try_acquire(&self) -> Option<ConnectPermit> {
        Arc::clone(&self.inner)
            .try_lock_owned()
            .ok()
            .map(|guard| ConnectPermit { _guard: guard })
    }

    #[cfg(test)]
    #[must_use]
    pub(crate) fn is_busy(&self) -> bool {
        self.inner.try_lock().is_err()
    }
}

/// OS-level proof that this is the only process keeping the target.
///
/// Released when dropped.
pub struct InstanceLock {
    held: Held,
}

enum Held {
    File {
        path: PathBuf,
        _guard: fd_lock::RwLockWriteGuard<'static, File>,
    },
    Port(TcpListener),
}

impl InstanceLock {
    /// Acquire the resource described by `spec`, failing immediately if
    /// another process holds it.
    ///
    /// Meant to be called once at startup. In lock-file mode the open file
    /// handle is leaked for the life of the process; dropping the lock
    /// releases the advisory lock but not the descriptor.
    pub fn acquire(spec: &InstanceGuardSpec) -> Result<Self> {
        let held = match spec {
            InstanceGuardSpec::LockFile(path) => lock_file(path.clone())?,
            InstanceGuardSpec::Port(port) => bind_port(*port)?,
        };
        info!(resource = %spec, "single-instance guard acquired");
        Ok(Self { held })
    }

    #[must_use]
    pub fn describe(&self) -> String {
        match &self.held {
            Held::File { path, .. } => format!("file:{}", path.display()),
            Held::Port(listener) => listener
                .local_addr()
                .map(|addr| format!("port:{}", addr.port()))
                .unwrap_or_else(|_| "port".into()),
        }
    }
}

impl std::fmt::Debug for InstanceLock {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InstanceLock")
            .field("resource", &self.describe())
            .finish()
    }
}

fn lock_file(path: PathBuf) -> Result<Held> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)?;
    }
    let file = OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .truncate(false)
        .open(&path)?;

    // The guard borrows the lock, so the lock is leaked to give the guard a
    // 'static lifetime. One descriptor per acquire, including failed ones.
    let lock: &'static mut fd_lock::RwLock<File> = Box::leak(Box::new(fd_lock::RwLock::new(file)));
    let mut guard = match lock.try_write() {
        Ok(guard) => guard,
        Err(e) if e.kind() == io::ErrorKind::WouldBlock => {
            return Err(Error::instance_conflict(format!("file:{}", path.display())));
        },
        Err(e) => return Err(e.into()),
    };

    guard.set_len(0)?;
    writeln!(*guard, "{}", std::process::id())?;
    debug!(path = %path.display(), "wrote pid to lock file");

    Ok(Held::File {
        path,
        _guard: guard,
    })
}

fn bind_port(port: u16) -> Result<Held> {
    match TcpListener::bind((Ipv4Addr::LOCALHOST, port)) {
        Ok(listener) => Ok(Held::Port(listener)),
        Err(e) if e.kind() == io::ErrorKind::AddrInUse => {
            Err(Error::instance_conflict(format!("port:{port}")))
        },
        Err(e) => Err(e.into()),
    }
}
