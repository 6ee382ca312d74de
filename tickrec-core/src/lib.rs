pub use counters::{CounterKind, CounterSnapshot, CounterSource, RefreshCache};
pub use system::{Features, System};
pub use ticks::{TickRow, TickType};
pub use topology::{LogicalProcessor, Topology};

mod counters;
mod loadavg;
pub mod platform;
mod system;
mod ticks;
mod topology;
mod utility;

#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// The underlying counter query mechanism failed. Distinct from a
    /// degraded (partial) snapshot, which is not an error.
    #[error("Counter query failed: {0}")]
    CounterQueryFailed(#[source] Box<Error>),
    #[error("Feature {0:?} missing")]
    FeatureMissing(Features),
    #[error("Unsupported platform")]
    UnsupportedPlatform,
    #[cfg(target_os = "windows")]
    #[error("PDH_STATUS({0:?})")]
    Pdh(windows::Win32::Foundation::WIN32_ERROR),
    #[cfg(target_os = "windows")]
    #[error(transparent)]
    Wmi(#[from] wmi::WMIError),
    #[cfg(target_os = "windows")]
    #[error("Can't get com library")]
    ComLib,
    #[cfg(target_os = "windows")]
    #[error("WinError: {0}")]
    WinError(#[from] windows::core::Error),
}
