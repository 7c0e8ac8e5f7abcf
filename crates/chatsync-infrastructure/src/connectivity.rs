//! Shared online/offline flag.

use chatsync_core::connectivity::Connectivity;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// A connectivity flag flipped by whoever observes the platform's
/// online/offline events, usually through
/// `ConnectionMonitor::handle_offline` and `handle_online`. Clones share
/// the flag.
#[derive(Debug, Clone)]
pub struct SharedConnectivity {
    online: Arc<AtomicBool>,
}

impl SharedConnectivity {
    pub fn new(online: bool) -> Self {
        Self {
            online: Arc::new(AtomicBool::new(online)),
        }
    }

    pub fn set_online(&self, online: bool) {
        self.online.store(online, Ordering::SeqCst);
    }
}

impl Default for SharedConnectivity {
    fn default() -> Self {
        Self::new(true)
    }
}

impl Connectivity for SharedConnectivity {
    fn is_online(&self) -> bool {
        self.online.load(Ordering::SeqCst)
    }

    fn set_online(&self, online: bool) {
        SharedConnectivity::set_online(self, online);
    }
}
