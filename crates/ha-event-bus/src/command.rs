//! Commands for the application control loop

/// Work items for the daemon's control loop
///
/// Connectivity changes are turned into these and queued on one channel, so
/// starting and stopping applications never overlap.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DaemonCommand {
    /// Load every configured application (restarting if already running)
    StartApplications,
    /// Drop all subscriptions and cancel every application
    StopApplications,
}

impl DaemonCommand {
    /// The command a connectivity transition maps to
    pub fn from_connectivity(connected: bool) -> Self {
        if connected {
            DaemonCommand::StartApplications
        } else {
            DaemonCommand::StopApplications
        }
    }
}
