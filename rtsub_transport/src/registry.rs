//! Port naming registry.
//!
//! The registry is a directory with one JSON file per registered port. The
//! file name is the percent-encoded port name; the content is a
//! [`PortEntry`]. Entries are published atomically (write to a temp file,
//! then `hard_link` into place) so readers never observe a partial entry.
//!
//! An entry whose owner PID no longer exists is stale: `register()` reclaims
//! it and `lookup()` treats it as unknown. Reclaims hold an exclusive
//! `flock` on the registry's `.lock` file, so only one process at a time
//! can replace an existing entry.

use crate::platform::{current_pid, is_process_alive};
use nix::fcntl::{Flock, FlockArg};
use rtsub_common::message::now_us;
use rtsub_common::port::PortName;
use rtsub_common::transport::{TransportError, TransportResult};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::ErrorKind;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, warn};

const ENTRY_SUFFIX: &str = ".json";
const TEMP_PREFIX: &str = ".tmp-";
const LOCK_FILE: &str = ".lock";

/// Current content of an entry file.
enum EntryFile {
    Absent,
    Unreadable,
    Present(PortEntry),
}

/// What a registered port does.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PortRole {
    /// Inbound port; receives data frames.
    Subscriber,
    /// Outbound port; accepts connect requests and fans out data.
    Publisher,
}

/// Registry record for one port.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortEntry {
    /// Port name.
    pub name: PortName,
    /// Subscriber or publisher.
    pub role: PortRole,
    /// UDP address of the port's socket.
    pub data_addr: SocketAddr,
    /// Owning process.
    pub pid: u32,
    /// Registration time [µs since UNIX epoch].
    pub registered_at_us: u64,
}

impl PortEntry {
    /// Entry for a port owned by the calling process.
    pub fn owned(name: PortName, role: PortRole, data_addr: SocketAddr) -> Self {
        Self {
            name,
            role,
            data_addr,
            pid: current_pid(),
            registered_at_us: now_us(),
        }
    }

    /// Whether the owning process still exists.
    pub fn is_live(&self) -> bool {
        is_process_alive(self.pid)
    }
}

/// Handle to a registry directory.
#[derive(Debug)]
pub struct Registry {
    dir: PathBuf,
}

impl Registry {
    /// Open (creating if needed) the registry at `dir`.
    ///
    /// # Errors
    /// `RegistryUnavailable` if the directory cannot be created.
    pub fn open(dir: &Path) -> TransportResult<Self> {
        fs::create_dir_all(dir).map_err(|source| TransportError::RegistryUnavailable {
            path: dir.to_path_buf(),
            source,
        })?;
        Ok(Self {
            dir: dir.to_path_buf(),
        })
    }

    /// Registry directory.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Publish `entry`, failing if a live owner holds the name.
    ///
    /// A stale or unreadable entry is replaced once.
    pub fn register(&self, entry: &PortEntry) -> TransportResult<()> {
        let target = self.entry_path(&entry.name);
        let body = serde_json::to_vec_pretty(entry)
            .map_err(|e| TransportError::Codec(format!("registry entry: {e}")))?;

        let temp = self.temp_path();
        fs::write(&temp, &body).map_err(|source| self.unavailable(source))?;

        let result = match fs::hard_link(&temp, &target) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                self.reclaim_and_link(&entry.name, &temp, &target)
            }
            Err(source) => Err(self.unavailable(source)),
        };

        if let Err(e) = fs::remove_file(&temp) {
            debug!("Failed to remove registry temp file {}: {e}", temp.display());
        }
        if result.is_ok() {
            debug!(
                "Registered {} ({:?}) at {} for pid {}",
                entry.name, entry.role, entry.data_addr, entry.pid
            );
        }
        result
    }

    /// Resolve a live entry by name.
    ///
    /// # Errors
    /// `UnknownPort` if absent, unreadable, or owned by a dead process.
    pub fn lookup(&self, name: &PortName) -> TransportResult<PortEntry> {
        match self.read_entry(name)? {
            Some(entry) if entry.is_live() => Ok(entry),
            Some(entry) => {
                debug!("Entry for {name} is stale (pid {} gone)", entry.pid);
                Err(TransportError::UnknownPort { name: name.clone() })
            }
            None => Err(TransportError::UnknownPort { name: name.clone() }),
        }
    }

    /// Remove `name` if the calling process owns it.
    ///
    /// Returns `true` when an entry was removed.
    pub fn unregister(&self, name: &PortName) -> TransportResult<bool> {
        match self.read_entry(name)? {
            Some(entry) if entry.pid == current_pid() => {
                match fs::remove_file(self.entry_path(name)) {
                    Ok(()) => Ok(true),
                    Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
                    Err(e) => Err(e.into()),
                }
            }
            Some(entry) => {
                warn!(
                    "Not unregistering {name}: owned by pid {} (we are {})",
                    entry.pid,
                    current_pid()
                );
                Ok(false)
            }
            None => Ok(false),
        }
    }

    /// All readable entries, live or stale, sorted by name.
    pub fn list(&self) -> TransportResult<Vec<PortEntry>> {
        let mut entries = Vec::new();
        let dir = fs::read_dir(&self.dir).map_err(|source| self.unavailable(source))?;

        for item in dir.flatten() {
            let Ok(file_name) = item.file_name().into_string() else {
                continue;
            };
            if file_name.starts_with(TEMP_PREFIX) || !file_name.ends_with(ENTRY_SUFFIX) {
                continue;
            }
            match fs::read(item.path()) {
                Ok(bytes) => match serde_json::from_slice::<PortEntry>(&bytes) {
                    Ok(entry) => entries.push(entry),
                    Err(e) => debug!("Skipping unreadable entry {file_name}: {e}"),
                },
                Err(e) => debug!("Skipping entry {file_name}: {e}"),
            }
        }

        entries.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(entries)
    }

    fn read_entry(&self, name: &PortName) -> TransportResult<Option<PortEntry>> {
        match self.read_entry_file(name)? {
            EntryFile::Present(entry) => Ok(Some(entry)),
            EntryFile::Absent | EntryFile::Unreadable => Ok(None),
        }
    }

    fn read_entry_file(&self, name: &PortName) -> TransportResult<EntryFile> {
        let path = self.entry_path(name);
        let bytes = match fs::read(&path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(EntryFile::Absent),
            Err(source) => return Err(self.unavailable(source)),
        };
        match serde_json::from_slice::<PortEntry>(&bytes) {
            Ok(entry) => Ok(EntryFile::Present(entry)),
            Err(e) => {
                debug!("Unreadable registry entry {}: {e}", path.display());
                Ok(EntryFile::Unreadable)
            }
        }
    }

    /// Exclusive registry-wide lock, released on drop.
    fn lock(&self) -> TransportResult<Flock<fs::File>> {
        let file = fs::OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(self.dir.join(LOCK_FILE))
            .map_err(|source| self.unavailable(source))?;
        Flock::lock(file, FlockArg::LockExclusive)
            .map_err(|(_, errno)| self.unavailable(std::io::Error::from(errno)))
    }

    /// Replace a stale or unreadable entry under the registry lock.
    ///
    /// The entry is re-read while holding the lock: a concurrent reclaimer
    /// that got there first has left a live entry, which is `NameTaken`.
    fn reclaim_and_link(&self, name: &PortName, temp: &Path, target: &Path) -> TransportResult<()> {
        let _guard = self.lock()?;

        match self.read_entry_file(name)? {
            EntryFile::Present(existing) if existing.is_live() => {
                return Err(TransportError::NameTaken { name: name.clone() });
            }
            EntryFile::Present(existing) => {
                warn!(
                    "Reclaiming stale registration of {name} (pid {} is gone)",
                    existing.pid
                );
                self.remove_entry_file(target)?;
            }
            EntryFile::Unreadable => {
                warn!("Reclaiming unreadable registration of {name}");
                self.remove_entry_file(target)?;
            }
            // Released since our first attempt; link without removing.
            EntryFile::Absent => {}
        }

        match fs::hard_link(temp, target) {
            Ok(()) => Ok(()),
            // Someone else won the race for the reclaimed name.
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                Err(TransportError::NameTaken { name: name.clone() })
            }
            Err(source) => Err(self.unavailable(source)),
        }
    }

    fn remove_entry_file(&self, target: &Path) -> TransportResult<()> {
        match fs::remove_file(target) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(source) => Err(self.unavailable(source)),
        }
    }

    fn entry_path(&self, name: &PortName) -> PathBuf {
        self.dir.join(entry_file_name(name))
    }

    fn temp_path(&self) -> PathBuf {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        let n = COUNTER.fetch_add(1, Ordering::Relaxed);
        self.dir
            .join(format!("{TEMP_PREFIX}{}-{n}", current_pid()))
    }

    fn unavailable(&self, source: std::io::Error) -> TransportError {
        TransportError::RegistryUnavailable {
            path: self.dir.clone(),
            source,
        }
    }
}

/// File name for a port: percent-encoded name plus `.json`.
///
/// Bytes outside `[A-Za-z0-9._-]` are encoded as `%XX`, so the mapping is
/// injective and never produces a path separator.
pub fn entry_file_name(name: &PortName) -> String {
    let mut out = String::with_capacity(name.as_str().len() * 2 + ENTRY_SUFFIX.len());
    for byte in name.as_str().bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'.' | b'_' | b'-' => out.push(byte as char),
            other => out.push_str(&format!("%{other:02X}")),
        }
    }
    out.push_str(ENTRY_SUFFIX);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn port(name: &str) -> PortName {
        PortName::new(name).unwrap()
    }

    fn addr() -> SocketAddr {
        "127.0.0.1:40000".parse().unwrap()
    }

    #[test]
    fn file_names_are_flat_and_distinct() {
        let a = entry_file_name(&port("/coman/left_arm/state:o"));
        assert_eq!(a, "%2Fcoman%2Fleft_arm%2Fstate%3Ao.json");
        assert!(!a.contains('/'));
        assert_ne!(
            entry_file_name(&port("/a/b")),
            entry_file_name(&port("/a%2Fb"))
        );
    }

    #[test]
    fn register_then_lookup() {
        let tmp = TempDir::new().unwrap();
        let reg = Registry::open(tmp.path()).unwrap();
        let entry = PortEntry::owned(port("/receiver"), PortRole::Subscriber, addr());

        reg.register(&entry).unwrap();
        assert_eq!(reg.lookup(&port("/receiver")).unwrap(), entry);
    }

    #[test]
    fn live_duplicate_is_rejected() {
        let tmp = TempDir::new().unwrap();
        let reg = Registry::open(tmp.path()).unwrap();
        let entry = PortEntry::owned(port("/receiver"), PortRole::Subscriber, addr());

        reg.register(&entry).unwrap();
        let err = reg.register(&entry).unwrap_err();
        assert!(matches!(err, TransportError::NameTaken { .. }));
    }

    #[test]
    fn stale_entry_is_reclaimed() {
        let tmp = TempDir::new().unwrap();
        let reg = Registry::open(tmp.path()).unwrap();
        let mut stale = PortEntry::owned(port("/receiver"), PortRole::Subscriber, addr());
        stale.pid = u32::MAX;
        reg.register(&stale).unwrap();
        assert!(matches!(
            reg.lookup(&port("/receiver")),
            Err(TransportError::UnknownPort { .. })
        ));

        let fresh = PortEntry::owned(port("/receiver"), PortRole::Subscriber, addr());
        reg.register(&fresh).unwrap();
        assert_eq!(reg.lookup(&port("/receiver")).unwrap().pid, current_pid());
    }

    #[test]
    fn concurrent_reclaim_has_one_winner() {
        use std::sync::{Arc, Barrier};
        use std::thread;

        const CONTENDERS: u16 = 8;
        let tmp = TempDir::new().unwrap();
        let mut stale = PortEntry::owned(port("/receiver"), PortRole::Subscriber, addr());
        stale.pid = u32::MAX;
        Registry::open(tmp.path()).unwrap().register(&stale).unwrap();

        let barrier = Arc::new(Barrier::new(CONTENDERS as usize));
        let handles: Vec<_> = (0..CONTENDERS)
            .map(|i| {
                let dir = tmp.path().to_path_buf();
                let barrier = Arc::clone(&barrier);
                thread::spawn(move || {
                    let reg = Registry::open(&dir).unwrap();
                    let data_addr = SocketAddr::from(([127, 0, 0, 1], 41000 + i));
                    let entry = PortEntry::owned(port("/receiver"), PortRole::Subscriber, data_addr);
                    barrier.wait();
                    reg.register(&entry).map(|()| data_addr)
                })
            })
            .collect();

        let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        let winners: Vec<SocketAddr> = results.iter().filter_map(|r| r.as_ref().ok().copied()).collect();
        assert_eq!(winners.len(), 1, "results: {results:?}");
        for loser in results.iter().filter_map(|r| r.as_ref().err()) {
            assert!(matches!(loser, TransportError::NameTaken { .. }));
        }

        let reg = Registry::open(tmp.path()).unwrap();
        assert_eq!(reg.lookup(&port("/receiver")).unwrap().data_addr, winners[0]);
    }

    #[test]
    fn lock_file_is_not_listed() {
        let tmp = TempDir::new().unwrap();
        let reg = Registry::open(tmp.path()).unwrap();
        drop(reg.lock().unwrap());
        assert!(tmp.path().join(LOCK_FILE).exists());
        assert!(reg.list().unwrap().is_empty());
    }

    #[test]
    fn corrupt_entry_is_reclaimed() {
        let tmp = TempDir::new().unwrap();
        let reg = Registry::open(tmp.path()).unwrap();
        fs::write(
            tmp.path().join(entry_file_name(&port("/receiver"))),
            b"{ not json",
        )
        .unwrap();

        let entry = PortEntry::owned(port("/receiver"), PortRole::Subscriber, addr());
        reg.register(&entry).unwrap();
        assert_eq!(reg.lookup(&port("/receiver")).unwrap(), entry);
    }

    #[test]
    fn lookup_unknown_name() {
        let tmp = TempDir::new().unwrap();
        let reg = Registry::open(tmp.path()).unwrap();
        assert!(matches!(
            reg.lookup(&port("/nobody")),
            Err(TransportError::UnknownPort { .. })
        ));
    }

    #[test]
    fn unregister_only_own_entries() {
        let tmp = TempDir::new().unwrap();
        let reg = Registry::open(tmp.path()).unwrap();

        let mine = PortEntry::owned(port("/mine"), PortRole::Publisher, addr());
        reg.register(&mine).unwrap();
        assert!(reg.unregister(&port("/mine")).unwrap());
        assert!(!reg.unregister(&port("/mine")).unwrap());

        let mut foreign = PortEntry::owned(port("/theirs"), PortRole::Publisher, addr());
        foreign.pid = 1;
        reg.register(&foreign).unwrap();
        assert!(!reg.unregister(&port("/theirs")).unwrap());
        assert_eq!(reg.list().unwrap().len(), 1);
    }

    #[test]
    fn list_skips_temp_and_foreign_files() {
        let tmp = TempDir::new().unwrap();
        let reg = Registry::open(tmp.path()).unwrap();
        reg.register(&PortEntry::owned(port("/b"), PortRole::Subscriber, addr()))
            .unwrap();
        reg.register(&PortEntry::owned(port("/a"), PortRole::Publisher, addr()))
            .unwrap();
        fs::write(tmp.path().join(".tmp-leftover"), b"x").unwrap();
        fs::write(tmp.path().join("README"), b"x").unwrap();

        let names: Vec<_> = reg
            .list()
            .unwrap()
            .into_iter()
            .map(|e| e.name.to_string())
            .collect();
        assert_eq!(names, vec!["/a", "/b"]);
    }

    #[test]
    fn unreachable_registry() {
        let tmp = TempDir::new().unwrap();
        let blocker = tmp.path().join("file");
        fs::write(&blocker, b"x").unwrap();
        let err = Registry::open(&blocker.join("registry")).unwrap_err();
        assert!(matches!(err, TransportError::RegistryUnavailable { .. }));
    }
}
