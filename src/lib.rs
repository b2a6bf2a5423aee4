//! I2C access through WCH CH341 and CH347 USB bridges, driven by the vendor's native library.

mod chip;
mod codec;
mod config;
mod error;
mod i2c_impl;
mod native;
mod protocol;
mod usb;


pub use chip::{BaudRate, Chip, Platform, SymbolNames};
pub use codec::{addr_byte, memaddr_to_bytes, write_frame, DEFAULT_ADDRSIZE};
pub use config::{Config, DeviceId, DRIVER_ENV_VAR, LEGACY_DRIVER_ENV_VAR};
pub use error::*;
pub use i2c_impl::*;
pub use native::{Handle, Native, NativeLibrary};
pub use rusb;
pub use usb::devices;
