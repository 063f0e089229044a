// Running
mod runtime;
pub use runtime::{RunState, MR_KBDR, MR_KBSR, PC_START};

// Host devices
mod device;
pub use device::{HostInput, InputSource};
mod term;

// Diagnostics
pub mod error;
