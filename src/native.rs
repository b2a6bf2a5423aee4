use std::path::Path;

use libloading::Library;
use log::{debug, trace};

use crate::chip::{BaudRate, Chip, Platform, SymbolNames};
use crate::config::DeviceId;
use crate::{Error, Result};

/// Opaque device handle returned by the vendor library: the device index on Windows, a file
/// descriptor on POSIX systems.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Handle(u32);

impl Handle {
    pub const fn new(raw: u32) -> Self {
        Self(raw)
    }

    pub const fn raw(self) -> u32 {
        self.0
    }
}

/// Trait used by `crate::protocol` and `crate::I2c` to call into the vendor library. Every call
/// that reports failure natively is translated into an `Error`. Can be replaced with
/// `MockNative` for testing.
pub trait Native {
    fn open(&self, device: &DeviceId) -> Result<Handle>;

    fn close(&self, handle: Handle) -> Result<()>;

    /// Returns `None` when the library doesn't provide a chip version query.
    fn chip_version(&self, handle: Handle) -> Result<Option<u8>>;

    fn set_speed(&self, handle: Handle, speed: BaudRate) -> Result<()>;

    /// Runs one complete I2C transaction: START, `write` (whose first byte is the address
    /// byte), then, if `read` is non-empty, a repeated START and `read.len()` bytes, and STOP.
    fn stream_i2c(&self, handle: Handle, write: &[u8], read: &mut [u8]) -> Result<()>;

    /// Sends raw stream commands to the chip.
    fn write_data(&self, handle: Handle, data: &[u8]) -> Result<()>;

    /// Sends raw stream commands and collects the chip's response into `read`. Returns the
    /// number of bytes received.
    fn write_read(
        &self,
        handle: Handle,
        write: &[u8],
        read_step: u32,
        read_times: u32,
        read: &mut [u8],
    ) -> Result<usize>;
}

impl<T: Native + ?Sized> Native for &T {
    fn open(&self, device: &DeviceId) -> Result<Handle> {
        (**self).open(device)
    }

    fn close(&self, handle: Handle) -> Result<()> {
        (**self).close(handle)
    }

    fn chip_version(&self, handle: Handle) -> Result<Option<u8>> {
        (**self).chip_version(handle)
    }

    fn set_speed(&self, handle: Handle, speed: BaudRate) -> Result<()> {
        (**self).set_speed(handle, speed)
    }

    fn stream_i2c(&self, handle: Handle, write: &[u8], read: &mut [u8]) -> Result<()> {
        (**self).stream_i2c(handle, write, read)
    }

    fn write_data(&self, handle: Handle, data: &[u8]) -> Result<()> {
        (**self).write_data(handle, data)
    }

    fn write_read(
        &self,
        handle: Handle,
        write: &[u8],
        read_step: u32,
        read_times: u32,
        read: &mut [u8],
    ) -> Result<usize> {
        (**self).write_read(handle, write, read_step, read_times, read)
    }
}

#[cfg(windows)]
mod sys {
    pub type RawId = u32;
    pub type NativeBool = i32;

    pub type OpenFn = unsafe extern "system" fn(RawId) -> isize;

    pub const INVALID_HANDLE_VALUE: isize = -1;

    pub fn truthy(b: NativeBool) -> bool {
        b != 0
    }
}

#[cfg(not(windows))]
mod sys {
    pub type RawId = std::os::raw::c_int;
    pub type NativeBool = bool;

    pub type OpenFn = unsafe extern "system" fn(*const std::os::raw::c_char) -> RawId;

    pub fn truthy(b: NativeBool) -> bool {
        b
    }
}

use sys::{NativeBool, RawId};

type CloseVoidFn = unsafe extern "system" fn(RawId);
type CloseStatusFn = unsafe extern "system" fn(RawId) -> NativeBool;
type SetSpeedByteFn = unsafe extern "system" fn(RawId, u8) -> NativeBool;
type SetSpeedWordFn = unsafe extern "system" fn(RawId, u32) -> NativeBool;
type ChipVersionFn = unsafe extern "system" fn(RawId, *mut u8) -> NativeBool;
type StreamI2cFn = unsafe extern "system" fn(RawId, u32, *const u8, u32, *mut u8) -> NativeBool;
type WriteDataFn = unsafe extern "system" fn(RawId, *const u8, *mut u32) -> NativeBool;
type WriteReadFn =
    unsafe extern "system" fn(RawId, u32, *const u8, u32, u32, *mut u32, *mut u8) -> NativeBool;

#[derive(Clone, Copy)]
enum CloseFn {
    Void(CloseVoidFn),
    Status(CloseStatusFn),
}

#[derive(Clone, Copy)]
enum SetSpeedFn {
    Byte(SetSpeedByteFn),
    Word(SetSpeedWordFn),
}

/// A vendor library loaded at runtime with its driver functions resolved.
pub struct NativeLibrary {
    chip: Chip,
    names: SymbolNames,
    open: sys::OpenFn,
    close: CloseFn,
    set_speed: SetSpeedFn,
    chip_version: Option<ChipVersionFn>,
    stream_i2c: StreamI2cFn,
    write_data: WriteDataFn,
    write_read: WriteReadFn,
    // must outlive the function pointers above
    _library: Library,
}

impl NativeLibrary {
    /// Loads the library for `chip` from `path`, or from the `CH341DLL`/`CH347DLL` environment
    /// variable or the platform default name when `path` is `None`.
    pub fn load(chip: Chip, path: Option<&Path>) -> Result<Self> {
        let platform = Platform::current();
        let path = chip.library_path(path.map(Path::to_path_buf), platform);
        let library_name = path.display().to_string();
        debug!("loading {} library {}", chip, library_name);

        // SAFETY: the vendor libraries have no initialisation routines with preconditions
        let library = unsafe { Library::new(&path) }.map_err(|source| Error::Library {
            name: library_name.clone(),
            source,
        })?;
        let names = SymbolNames::resolve(chip, platform);

        macro_rules! require {
            ($ty:ty, $name:expr) => {{
                let name: &'static str = $name;
                trace!("resolving {}", name);
                // SAFETY: the function pointer types match the vendor headers for this platform
                match unsafe { library.get::<$ty>(name.as_bytes()) } {
                    Ok(symbol) => *symbol,
                    Err(source) => {
                        return Err(Error::MissingSymbol {
                            library: library_name,
                            symbol: name,
                            source,
                        })
                    }
                }
            }};
        }

        let open = require!(sys::OpenFn, names.open);
        let close = if names.close_returns_status {
            CloseFn::Status(require!(CloseStatusFn, names.close))
        } else {
            CloseFn::Void(require!(CloseVoidFn, names.close))
        };
        let set_speed = if names.set_speed_takes_byte {
            SetSpeedFn::Byte(require!(SetSpeedByteFn, names.set_speed))
        } else {
            SetSpeedFn::Word(require!(SetSpeedWordFn, names.set_speed))
        };
        let stream_i2c = require!(StreamI2cFn, names.stream_i2c);
        let write_data = require!(WriteDataFn, names.write_data);
        let write_read = require!(WriteReadFn, names.write_read);
        let chip_version: Option<ChipVersionFn> = names.chip_version.and_then(|name| {
            // SAFETY: see above
            let symbol = unsafe { library.get::<ChipVersionFn>(name.as_bytes()) };
            match symbol {
                Ok(symbol) => Some(*symbol),
                Err(_) => {
                    debug!("{} doesn't export {}", library_name, name);
                    None
                }
            }
        });

        Ok(Self {
            chip,
            names,
            open,
            close,
            set_speed,
            chip_version,
            stream_i2c,
            write_data,
            write_read,
            _library: library,
        })
    }

    pub fn chip(&self) -> Chip {
        self.chip
    }

    fn check(&self, ret: NativeBool, function: &'static str) -> Result<()> {
        if sys::truthy(ret) {
            Ok(())
        } else {
            Err(Error::OperationFailed(function))
        }
    }
}

#[inline]
fn raw(handle: Handle) -> RawId {
    handle.raw() as RawId
}

fn native_len(len: usize) -> Result<u32> {
    u32::try_from(len).map_err(|_| Error::Unsupported)
}

impl Native for NativeLibrary {
    #[cfg(windows)]
    fn open(&self, device: &DeviceId) -> Result<Handle> {
        let index = match device {
            DeviceId::Index(index) => *index,
            DeviceId::Path(_) => return Err(Error::OpenFailed(device.to_string())),
        };
        // SAFETY: plain integer argument
        let ret = unsafe { (self.open)(index) };
        if ret == sys::INVALID_HANDLE_VALUE {
            return Err(Error::OpenFailed(device.to_string()));
        }
        // later calls identify the device by its index, not the returned handle
        Ok(Handle::new(index))
    }

    #[cfg(not(windows))]
    fn open(&self, device: &DeviceId) -> Result<Handle> {
        use std::os::unix::ffi::OsStrExt;

        let path = device.device_path();
        let c_path = std::ffi::CString::new(path.as_os_str().as_bytes())
            .map_err(|_| Error::OpenFailed(path.display().to_string()))?;
        // SAFETY: `c_path` is a valid NUL-terminated string for the duration of the call
        let fd = unsafe { (self.open)(c_path.as_ptr()) };
        if fd <= 0 {
            return Err(Error::OpenFailed(path.display().to_string()));
        }
        Ok(Handle::new(fd as u32))
    }

    fn close(&self, handle: Handle) -> Result<()> {
        match self.close {
            CloseFn::Void(close) => {
                // SAFETY: plain integer argument
                unsafe { close(raw(handle)) };
                Ok(())
            }
            CloseFn::Status(close) => {
                // SAFETY: plain integer argument
                let ret = unsafe { close(raw(handle)) };
                self.check(ret, self.names.close)
            }
        }
    }

    fn chip_version(&self, handle: Handle) -> Result<Option<u8>> {
        let (Some(chip_version), Some(name)) = (self.chip_version, self.names.chip_version) else {
            return Ok(None);
        };
        let mut version = 0u8;
        // SAFETY: `version` is a valid out pointer for one byte
        let ret = unsafe { chip_version(raw(handle), &mut version) };
        self.check(ret, name)?;
        Ok(Some(version))
    }

    fn set_speed(&self, handle: Handle, speed: BaudRate) -> Result<()> {
        // SAFETY: plain integer arguments. Modes are 0..=3, so narrowing can't truncate.
        let ret = match self.set_speed {
            SetSpeedFn::Byte(set_speed) => unsafe { set_speed(raw(handle), speed.mode() as u8) },
            SetSpeedFn::Word(set_speed) => unsafe { set_speed(raw(handle), speed.mode()) },
        };
        self.check(ret, self.names.set_speed)
    }

    fn stream_i2c(&self, handle: Handle, write: &[u8], read: &mut [u8]) -> Result<()> {
        let read_ptr = if read.is_empty() {
            std::ptr::null_mut()
        } else {
            read.as_mut_ptr()
        };
        // SAFETY: both buffers are valid for the lengths passed alongside them
        let ret = unsafe {
            (self.stream_i2c)(
                raw(handle),
                native_len(write.len())?,
                write.as_ptr(),
                native_len(read.len())?,
                read_ptr,
            )
        };
        self.check(ret, self.names.stream_i2c)
    }

    fn write_data(&self, handle: Handle, data: &[u8]) -> Result<()> {
        let mut length = native_len(data.len())?;
        // SAFETY: `data` is valid for `length` bytes; the library only reads from it
        let ret = unsafe { (self.write_data)(raw(handle), data.as_ptr(), &mut length) };
        self.check(ret, self.names.write_data)
    }

    fn write_read(
        &self,
        handle: Handle,
        write: &[u8],
        read_step: u32,
        read_times: u32,
        read: &mut [u8],
    ) -> Result<usize> {
        if (read_step as usize).saturating_mul(read_times as usize) > read.len() {
            return Err(Error::Unsupported);
        }
        let mut n_read = 0u32;
        // SAFETY: `read` holds at least `read_step * read_times` bytes, checked above
        let ret = unsafe {
            (self.write_read)(
                raw(handle),
                native_len(write.len())?,
                write.as_ptr(),
                read_step,
                read_times,
                &mut n_read,
                read.as_mut_ptr(),
            )
        };
        self.check(ret, self.names.write_read)?;
        Ok((n_read as usize).min(read.len()))
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_missing_library() {
        match NativeLibrary::load(Chip::Ch341, Some(Path::new("/nonexistent/libch347.so"))) {
            Err(Error::Library { name, .. }) => assert_eq!(name, "/nonexistent/libch347.so"),
            Err(e) => panic!("unexpected error: {}", e),
            Ok(_) => panic!("loading a nonexistent library should fail"),
        }
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn test_load_library_without_driver_symbols() {
        match NativeLibrary::load(Chip::Ch341, Some(Path::new("libc.so.6"))) {
            Err(e @ Error::MissingSymbol { .. }) => {
                assert_eq!(
                    e.to_string(),
                    "native library libc.so.6 does not export CH341OpenDevice"
                );
            }
            Err(e) => panic!("unexpected error: {}", e),
            Ok(_) => panic!("libc doesn't provide the CH341 driver functions"),
        }
    }
}
