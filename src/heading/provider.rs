//! Boundary to the platform heading source.

/// The sensor side of the manager.
///
/// The manager asks the provider to start producing updates when its first
/// request is created and to stop once the last request is removed. Readings
/// themselves are pushed back through [`HeadingManager::dispatch`] or a
/// [`HeadingPump`] sender.
///
/// Implementations must not dispatch synchronously from inside these calls.
///
/// [`HeadingManager::dispatch`]: super::HeadingManager::dispatch
/// [`HeadingPump`]: super::HeadingPump
pub trait HeadingProvider: Send + Sync {
    fn start_updates(&self);

    fn stop_updates(&self);
}
