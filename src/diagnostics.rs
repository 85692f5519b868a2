//! Observer hook for update progress
//!
//! The update pipeline reports what it is doing through a [`Diagnostics`]
//! implementation handed to it by the caller. The default is
//! [`NoopDiagnostics`], so the library stays silent unless asked otherwise.

use crate::sitemap::PayloadKind;
use std::sync::Mutex;

/// Something that happened during an update
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpdateEvent {
    /// The root sitemap request is about to be sent
    FetchStarted { url: String },

    /// The root document was parsed
    Classified { kind: PayloadKind, count: usize },

    /// A child sitemap contributed nothing while flattening
    ChildSkipped { location: String, reason: String },

    /// Flattening finished
    Flattened { refs: usize, entries: usize },

    /// A new payload replaced the cached one
    CacheWritten { kind: PayloadKind, count: usize },

    /// The update ended without touching the cache
    UpdateFailed { reason: String },
}

/// Receives [`UpdateEvent`]s from the updater and flattener
pub trait Diagnostics: Send + Sync {
    fn event(&self, event: &UpdateEvent);
}

/// Discards every event
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopDiagnostics;

impl Diagnostics for NoopDiagnostics {
    fn event(&self, _event: &UpdateEvent) {}
}

/// Forwards events to `tracing`
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingDiagnostics;

impl Diagnostics for TracingDiagnostics {
    fn event(&self, event: &UpdateEvent) {
        match event {
            UpdateEvent::FetchStarted { url } => {
                tracing::debug!("Fetching sitemap from {}", url);
            }
            UpdateEvent::Classified { kind, count } => {
                tracing::debug!("Parsed {} sitemap with {} entries", kind, count);
            }
            UpdateEvent::ChildSkipped { location, reason } => {
                tracing::warn!("Skipping child sitemap {}: {}", location, reason);
            }
            UpdateEvent::Flattened { refs, entries } => {
                tracing::info!("Flattened {} child sitemaps into {} entries", refs, entries);
            }
            UpdateEvent::CacheWritten { kind, count } => {
                tracing::info!("Cached {} sitemap with {} entries", kind, count);
            }
            UpdateEvent::UpdateFailed { reason } => {
                tracing::error!("Sitemap update failed: {}", reason);
            }
        }
    }
}

/// Keeps every event in memory, in arrival order
#[derive(Debug, Default)]
pub struct RecordingDiagnostics {
    events: Mutex<Vec<UpdateEvent>>,
}

impl RecordingDiagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the events seen so far
    pub fn events(&self) -> Vec<UpdateEvent> {
        match self.events.lock() {
            Ok(events) => events.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

impl Diagnostics for RecordingDiagnostics {
    fn event(&self, event: &UpdateEvent) {
        match self.events.lock() {
            Ok(mut events) => events.push(event.clone()),
            Err(poisoned) => poisoned.into_inner().push(event.clone()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recording_keeps_order() {
        let recorder = RecordingDiagnostics::new();
        recorder.event(&UpdateEvent::FetchStarted {
            url: "https://a.myshopify.com/sitemap.xml".to_string(),
        });
        recorder.event(&UpdateEvent::Classified {
            kind: PayloadKind::Flat,
            count: 3,
        });

        let events = recorder.events();
        assert_eq!(events.len(), 2);
        assert!(matches!(events[0], UpdateEvent::FetchStarted { .. }));
        assert_eq!(
            events[1],
            UpdateEvent::Classified {
                kind: PayloadKind::Flat,
                count: 3
            }
        );
    }

    #[test]
    fn test_noop_and_tracing_accept_events() {
        let event = UpdateEvent::UpdateFailed {
            reason: "no domain".to_string(),
        };
        NoopDiagnostics.event(&event);
        TracingDiagnostics.event(&event);
    }
}
