//! Device side of autosolo: screen capture and input over ADB, emulator
//! manager backends for hard reboots, and template matching on captured frames.
//!
//! The campaign engine only sees the [`DeviceControl`] and [`ImageSearch`]
//! traits; [`AdbDevice`] and [`TemplateMatcher`] are the production adapters.

pub mod adb;
pub mod control;
pub mod emulator;
pub mod frame;
pub mod host;
pub mod vision;

pub use adb::AdbDevice;
pub use control::DeviceControl;
pub use emulator::EmulatorManager;
pub use frame::Frame;
pub use vision::{ImageSearch, Match, Template, TemplateMatcher};
