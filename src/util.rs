//! Module containing various utilities.

use log::warn;

/// Prints a warning message based on the error if the given result is not OK.
pub fn warn_on_error<E: std::fmt::Debug>(x: Result<(), E>, msg: &str) {
    match x {
        Ok(()) => {}
        Err(e) => warn!("Failed to send {}: {:?}", msg, e),
    }
}
