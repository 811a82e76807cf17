//! Coordinator configuration.

use std::time::Duration;

use crate::protocol::PARTY_KEY_PREFIX;

/// Default bound on a single party store access.
pub const DEFAULT_STORE_TIMEOUT: Duration = Duration::from_secs(5);

/// Default capacity of per-connection inbound event queues.
pub const DEFAULT_EVENT_CHANNEL_CAPACITY: usize = 256;

/// Configuration for a [`SessionCoordinator`](crate::SessionCoordinator).
///
/// All fields have sensible defaults.
///
/// # Example
///
/// ```
/// use party_sync::CoordinatorConfig;
/// use std::time::Duration;
///
/// let config = CoordinatorConfig::new()
///     .with_store_timeout(Duration::from_millis(250))
///     .with_key_prefix("exile:party:");
/// assert_eq!(config.party_key("Raiders"), "exile:party:Raiders");
/// ```
#[derive(Debug, Clone)]
pub struct CoordinatorConfig {
    /// Upper bound on every party store access.
    ///
    /// An access that takes longer fails the current call with
    /// [`PartyError::StoreTimeout`](crate::PartyError::StoreTimeout) and leaves
    /// shared state untouched.
    ///
    /// Defaults to **5 seconds**.
    pub store_timeout: Duration,
    /// Prefix prepended to party names to form store keys.
    ///
    /// Defaults to `"party:"`.
    pub key_prefix: String,
    /// Capacity of the inbound event queue used by
    /// [`ConnectionSession`](crate::session::ConnectionSession).
    ///
    /// Defaults to **256**. Values below 1 are clamped to 1.
    pub event_channel_capacity: usize,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl CoordinatorConfig {
    pub fn new() -> Self {
        Self {
            store_timeout: DEFAULT_STORE_TIMEOUT,
            key_prefix: PARTY_KEY_PREFIX.to_owned(),
            event_channel_capacity: DEFAULT_EVENT_CHANNEL_CAPACITY,
        }
    }

    #[must_use]
    pub fn with_store_timeout(mut self, timeout: Duration) -> Self {
        self.store_timeout = timeout;
        self
    }

    #[must_use]
    pub fn with_key_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.key_prefix = prefix.into();
        self
    }

    /// Set the inbound event queue capacity. Values below 1 are clamped to 1.
    #[must_use]
    pub fn with_event_channel_capacity(mut self, capacity: usize) -> Self {
        self.event_channel_capacity = capacity.max(1);
        self
    }

    /// Store key for `party_name`.
    pub fn party_key(&self, party_name: &str) -> String {
        format!("{}{party_name}", self.key_prefix)
    }
}
