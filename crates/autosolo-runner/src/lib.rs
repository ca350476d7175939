//! Process execution for host-side tools (`adb`, emulator managers).
//!
//! All process execution goes through [`CommandSpec`] so that arguments are
//! handed to the OS as discrete argv elements. Nothing in this crate builds a
//! shell string on the host side.

pub mod command_spec;
pub mod error;
pub mod native;
pub mod process;

pub use command_spec::CommandSpec;
pub use error::RunnerError;
pub use native::NativeRunner;
pub use process::{ProcessOutput, ProcessRunner};
