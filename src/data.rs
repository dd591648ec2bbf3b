use std::{
    fmt::{Debug, Formatter},
    ops::Deref,
    sync::Arc,
};

use crate::audit::AuditLog;
use crate::config::BotConfig;
use crate::detectors::{DetectorContext, Detectors};
use crate::expiry::ExpiryScheduler;
use crate::lockdown::LockdownFlag;
use crate::pending::PendingActionStore;
use crate::platform::Gateway;
use crate::registry::CommandRegistry;
use crate::store::RecordStore;
use crate::strikes::StrikeBook;

/// Centralized state shared by the router, commands and detectors.
#[derive(Clone)]
pub struct Data(pub Arc<DataInner>);

pub struct DataInner {
    pub config: BotConfig,
    pub store: Arc<dyn RecordStore>,
    pub audit: AuditLog,
    pub strikes: StrikeBook,
    pub lockdown: LockdownFlag,
    pub pending: PendingActionStore,
    pub registry: CommandRegistry,
    pub expiry: Arc<ExpiryScheduler>,
    pub detectors: Detectors,
}

impl Data {
    /// Wire every service over one record store.
    #[must_use]
    pub fn new(config: BotConfig, store: Arc<dyn RecordStore>) -> Self {
        let audit = AuditLog::new(Arc::clone(&store));
        Self(Arc::new(DataInner {
            strikes: StrikeBook::new(Arc::clone(&store)),
            lockdown: LockdownFlag::new(Arc::clone(&store)),
            expiry: Arc::new(ExpiryScheduler::new(Arc::clone(&store), audit.clone())),
            pending: PendingActionStore::new(),
            registry: CommandRegistry::standard(),
            detectors: Detectors::default(),
            audit,
            store,
            config,
        }))
    }

    /// What the detectors report through for one event.
    #[must_use]
    pub fn detector_context<'a>(&'a self, gateway: &'a dyn Gateway) -> DetectorContext<'a> {
        DetectorContext {
            gateway,
            audit: &self.audit,
            config: &self.config,
        }
    }
}

impl Deref for Data {
    type Target = DataInner;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl Debug for Data {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Data")
            .field("owner_id", &self.config.owner_id)
            .field("commands", &self.registry.len())
            .field("pending", &self.pending.len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing;

    #[test]
    fn test_data_new() {
        let data = testing::data();
        assert!(data.pending.is_empty());
        assert!(data.registry.get("ban").is_some());
        assert_eq!(data.config.owner_id, testing::OWNER);
    }

    #[test]
    fn test_data_debug_impl() {
        let debug_output = format!("{:?}", testing::data());
        assert!(debug_output.contains("Data"));
        assert!(debug_output.contains("commands"));
        assert!(!debug_output.contains("token"));
    }

    #[test]
    fn test_clones_share_state() {
        let data = testing::data();
        let clone = data.clone();
        assert!(Arc::ptr_eq(&data.0, &clone.0));
    }
}
