//! Named mutually-exclusive resources.
//!
//! The microphone is shared between the live pipeline and hotword sample
//! recording; both claim [`AUDIO_CAPTURE`] before opening it.

use std::collections::HashSet;
use std::sync::Mutex;

/// Resource name of the microphone.
pub const AUDIO_CAPTURE: &str = "audio.capture";

pub trait ResourceBroker: Send + Sync {
    /// Claim `name`. `false` when someone else holds it.
    fn acquire(&self, name: &str) -> bool;

    /// Give `name` back. Releasing a free resource is a no-op.
    fn release(&self, name: &str);
}

/// In-process broker.
#[derive(Debug, Default)]
pub struct LocalResourceBroker {
    held: Mutex<HashSet<String>>,
}

impl LocalResourceBroker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_held(&self, name: &str) -> bool {
        self.held
            .lock()
            .map(|held| held.contains(name))
            .unwrap_or(false)
    }
}

impl ResourceBroker for LocalResourceBroker {
    fn acquire(&self, name: &str) -> bool {
        match self.held.lock() {
            Ok(mut held) => {
                let claimed = held.insert(name.to_string());
                if claimed {
                    log::debug!("resource: {name} acquired");
                } else {
                    log::debug!("resource: {name} busy");
                }
                claimed
            }
            Err(_) => false,
        }
    }

    fn release(&self, name: &str) {
        if let Ok(mut held) = self.held.lock() {
            if held.remove(name) {
                log::debug!("resource: {name} released");
            }
        }
    }
}
