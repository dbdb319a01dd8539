//! Configuration Listener Port

/// Notified after every successful dynamic configuration commit
///
/// Listeners run on the committing thread after all registry locks are
/// released, so they may look services up or commit further changes.
pub trait ConfigurationListener: Send + Sync {
    /// `version` is the registry version the commit produced
    fn configuration_changed(&self, version: u64);
}

impl<F> ConfigurationListener for F
where
    F: Fn(u64) + Send + Sync,
{
    fn configuration_changed(&self, version: u64) {
        self(version)
    }
}
