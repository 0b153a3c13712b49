use parking_lot::{Mutex, RwLock};
use std::sync::Arc;
use std::time::{Instant, SystemTime};
use tracing::{debug, info, warn};

use super::source::ConfigSource;
use super::ActiveConfig;
use crate::error::ConfigError;

struct ReloadState {
    source_last_modified: SystemTime,
    last_checked_at: Instant,
}

/// Owns the active configuration and keeps it fresh.
///
/// Readers clone the current `Arc<ActiveConfig>` out of a read lock, so a
/// reload is published in a single pointer swap. Reloads are serialized on
/// `state`; a reader that finds a reload in flight keeps the current config.
pub struct ConfigLoader {
    source: Arc<dyn ConfigSource>,
    active: RwLock<Arc<ActiveConfig>>,
    state: Mutex<ReloadState>,
}

impl ConfigLoader {
    /// First load. Fails when the source cannot be read or parsed, since
    /// there is no previous config to fall back on.
    pub fn load(source: Arc<dyn ConfigSource>) -> Result<Self, ConfigError> {
        let modified = source.modified()?;
        let active = ActiveConfig::parse(&source.read()?)?;
        info!(
            source = %source.describe(),
            mappings = active.rules.mapping_count(),
            default_roles = active.rules.default_roles().len(),
            reload = active.settings.reload.enabled,
            "configuration loaded"
        );
        Ok(Self {
            source,
            active: RwLock::new(Arc::new(active)),
            state: Mutex::new(ReloadState { source_last_modified: modified, last_checked_at: Instant::now() }),
        })
    }

    /// Current configuration. Re-checks the source at most once per poll
    /// interval when reload is enabled.
    pub fn current(&self) -> Arc<ActiveConfig> {
        let active = self.active.read().clone();
        if !active.settings.reload.enabled {
            return active;
        }
        let Some(mut state) = self.state.try_lock() else { return active; };
        if state.last_checked_at.elapsed() < active.settings.reload.check_interval {
            return active;
        }
        state.last_checked_at = Instant::now();

        let modified = match self.source.modified() {
            Ok(m) => m,
            Err(e) => {
                warn!(error = %e, "config source stat failed, keeping previous configuration");
                return active;
            }
        };
        if modified <= state.source_last_modified {
            return active;
        }
        // Record the new stamp even when parsing fails so a broken file is
        // reported once, not on every poll.
        state.source_last_modified = modified;
        match self.read_source() {
            Ok(next) => {
                let next = Arc::new(next);
                *self.active.write() = next.clone();
                info!(source = %self.source.describe(), mappings = next.rules.mapping_count(), "configuration reloaded");
                next
            }
            Err(e) => {
                warn!(source = %self.source.describe(), error = %e, "configuration reload failed, keeping previous configuration");
                active
            }
        }
    }

    /// Reload now regardless of timestamps. The previous configuration stays
    /// active when this fails.
    pub fn force_reload(&self) -> Result<(), ConfigError> {
        let mut state = self.state.lock();
        let modified = self.source.modified()?;
        let next = self.read_source()?;
        *self.active.write() = Arc::new(next);
        state.source_last_modified = modified;
        state.last_checked_at = Instant::now();
        debug!(source = %self.source.describe(), "configuration force-reloaded");
        Ok(())
    }

    fn read_source(&self) -> Result<ActiveConfig, ConfigError> {
        ActiveConfig::parse(&self.source.read()?)
    }
}
