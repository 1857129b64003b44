//! The application contract

use ha_config::AppConfig;

use crate::SharedHelper;

/// A daemon application
///
/// A fresh instance is built for every connected session. `initialize` must
/// return promptly: long-running work is spawned on its own task, watching
/// [`DaemonAppHelper::cancel_token`](crate::DaemonAppHelper::cancel_token).
/// After `cancel` the instance is dropped; nothing carries over to the next
/// session.
pub trait DaemonApplication: Send {
    /// Subscribe and spawn the application's loops. `false` discards the instance.
    fn initialize(&mut self, helper: SharedHelper, config: AppConfig) -> bool;

    /// Stop every loop and timer the application started
    fn cancel(&mut self);
}
