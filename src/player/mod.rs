//! Player detection
//!
//! The handle type and the locator that keeps it current.

pub mod handle;
pub mod locator;

pub use handle::{ControlRefs, PlayerHandle};
pub use locator::{LocatorConfig, PlayerLocator};
