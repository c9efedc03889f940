//! ## Loopback
//!
//! In-memory transport. Every command written to any channel it opens is
//! appended to one shared log, which makes it the transport for tests and for
//! dry runs.
//!

use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard};

use anyhow::{anyhow, bail, Result};

use super::{Channel, ResourceManager};

#[derive(Debug, Default)]
struct Shared {
    writes: Vec<String>,
    unreachable: HashSet<String>,
    fail_write_at: Option<usize>,
    attempts: usize,
    open_channels: usize,
}

/// Resource manager whose channels record commands instead of sending them.
#[derive(Debug, Clone, Default)]
pub struct LoopbackResourceManager {
    shared: Arc<Mutex<Shared>>,
}

fn lock(shared: &Mutex<Shared>) -> Result<MutexGuard<'_, Shared>> {
    shared
        .lock()
        .map_err(|_| anyhow!("loopback state poisoned"))
}

impl LoopbackResourceManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make opening `address` fail as if it could not be resolved.
    pub fn unreachable(self, address: &str) -> Self {
        if let Ok(mut shared) = self.shared.lock() {
            shared.unreachable.insert(address.to_string());
        }
        self
    }

    /// Make the `n`th write attempt (0-based, across all channels) fail.
    pub fn fail_write_at(self, n: usize) -> Self {
        if let Ok(mut shared) = self.shared.lock() {
            shared.fail_write_at = Some(n);
        }
        self
    }

    /// Commands written so far, oldest first.
    pub fn writes(&self) -> Vec<String> {
        lock(&self.shared)
            .map(|shared| shared.writes.clone())
            .unwrap_or_default()
    }

    /// Number of write calls that reached a channel, failed ones included.
    pub fn attempts(&self) -> usize {
        lock(&self.shared)
            .map(|shared| shared.attempts)
            .unwrap_or_default()
    }

    /// Channels opened and not yet closed.
    pub fn open_channels(&self) -> usize {
        lock(&self.shared)
            .map(|shared| shared.open_channels)
            .unwrap_or_default()
    }
}

impl ResourceManager for LoopbackResourceManager {
    fn open(&self, address: &str) -> Result<Box<dyn Channel>> {
        let mut shared = lock(&self.shared)?;
        if shared.unreachable.contains(address) {
            bail!("resource '{address}' not found");
        }
        shared.open_channels += 1;
        Ok(Box::new(LoopbackChannel {
            shared: Arc::clone(&self.shared),
        }))
    }
}

/// Channel opened by [`LoopbackResourceManager`].
#[derive(Debug)]
pub struct LoopbackChannel {
    shared: Arc<Mutex<Shared>>,
}

impl Channel for LoopbackChannel {
    fn write(&mut self, command: &str) -> Result<()> {
        let mut shared = lock(&self.shared)?;
        let attempt = shared.attempts;
        shared.attempts += 1;
        if shared.fail_write_at == Some(attempt) {
            bail!("loopback write {attempt} failed");
        }
        shared.writes.push(command.to_string());
        Ok(())
    }

    fn close(self: Box<Self>) -> Result<()> {
        let mut shared = lock(&self.shared)?;
        shared.open_channels = shared.open_channels.saturating_sub(1);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn records_writes_across_channels() {
        let manager = LoopbackResourceManager::new();
        let mut first = manager.open("GPIB0::1::INSTR").unwrap();
        let mut second = manager.open("GPIB0::2::INSTR").unwrap();
        first.write("RC").unwrap();
        second.write("O1E").unwrap();
        assert_eq!(manager.writes(), vec!["RC", "O1E"]);
        assert_eq!(manager.open_channels(), 2);

        first.close().unwrap();
        second.close().unwrap();
        assert_eq!(manager.open_channels(), 0);
    }

    #[test]
    fn injected_write_failure_is_not_recorded() {
        let manager = LoopbackResourceManager::new().fail_write_at(1);
        let mut channel = manager.open("x").unwrap();
        channel.write("RC").unwrap();
        assert!(channel.write("O1E").is_err());
        channel.write("O0E").unwrap();
        assert_eq!(manager.writes(), vec!["RC", "O0E"]);
        assert_eq!(manager.attempts(), 3);
    }

    #[test]
    fn unreachable_address_fails_to_open() {
        let manager = LoopbackResourceManager::new().unreachable("GPIB0::9::INSTR");
        assert!(manager.open("GPIB0::9::INSTR").is_err());
        assert!(manager.open("GPIB0::10::INSTR").is_ok());
    }
}
