//! Collision-free TCP port allocation for tenant instances.
//!
//! Asking the OS for an ephemeral port (bind to port 0) hands back a port that
//! is free *right now*, but two concurrent provisions can race the same port
//! between the probe-bind and the instance's own bind. The allocator closes
//! that window by remembering every port it has handed out until the owning
//! instance releases it.

use crate::error::ProvisioningError;
use parking_lot::Mutex;
use std::collections::HashSet;
use std::net::TcpListener;

#[derive(Default)]
pub struct PortAllocator {
    reserved: Mutex<HashSet<u16>>,
}

impl PortAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reserve a free port on `bind_host`, bounded by `attempts`.
    pub fn allocate(&self, bind_host: &str, attempts: u32) -> Result<u16, ProvisioningError> {
        for _ in 0..attempts {
            let listener = TcpListener::bind((bind_host, 0))?;
            let port = listener.local_addr()?.port();
            drop(listener);

            if self.reserved.lock().insert(port) {
                return Ok(port);
            }
            // Port already handed to a concurrent provision; ask again.
        }
        Err(ProvisioningError::PortExhausted { attempts })
    }

    /// Return a port to the pool once its instance is gone.
    pub fn release(&self, port: u16) {
        self.reserved.lock().remove(&port);
    }

    /// Number of currently reserved ports.
    pub fn reserved_count(&self) -> usize {
        self.reserved.lock().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_allocate_release_cycle() {
        let allocator = PortAllocator::new();
        let port = allocator.allocate("127.0.0.1", 4).unwrap();
        assert!(port > 0);
        assert_eq!(allocator.reserved_count(), 1);

        allocator.release(port);
        assert_eq!(allocator.reserved_count(), 0);
    }

    #[test]
    fn test_concurrent_allocations_never_collide() {
        let allocator = Arc::new(PortAllocator::new());
        let mut handles = Vec::new();
        for _ in 0..8 {
            let allocator = Arc::clone(&allocator);
            handles.push(std::thread::spawn(move || {
                allocator.allocate("127.0.0.1", 16).unwrap()
            }));
        }

        let ports: Vec<u16> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        let unique: HashSet<u16> = ports.iter().copied().collect();
        assert_eq!(unique.len(), ports.len());
    }
}
