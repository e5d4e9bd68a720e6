//! Navigation Abstraction
//!
//! Lets the core force the host onto a different screen, e.g. the login
//! entry point after the backend rejects the session.

/// Hard navigation performed by the host shell.
///
/// A hard navigation replaces the current location without consulting any
/// route guard, equivalent to reloading the application at `path`.
#[cfg_attr(test, mockall::automock)]
pub trait Navigator: Send + Sync {
    fn hard_navigate(&self, path: &str);
}
