use std::io::{Read, Write};
use std::ops::RangeInclusive;

use log::{debug, warn};

use crate::chip::{BaudRate, Chip};
use crate::codec::{memaddr_to_bytes, write_frame};
use crate::config::{Config, DeviceId};
use crate::native::{Handle, Native, NativeLibrary};
use crate::{error::*, protocol};

/// Addresses probed by `I2c::scan`. The rest are reserved by the I2C specification.
pub const SCAN_RANGE: RangeInclusive<u8> = 0x08..=0x77;

/// An I2C bus driven through a vendor bridge library.
///
/// ```no_run
/// use ch34x_i2c::{Config, I2c};
///
/// let mut i2c = I2c::new(Config::default())?;
/// i2c.writeto(42, b"123")?; // write 3 bytes to the peripheral at 7-bit address 42
/// let data = i2c.readfrom(42, 4)?; // read 4 bytes from it
///
/// let reg = i2c.readfrom_mem(42, 8, 3, 8)?; // 3 bytes starting at memory address 8
/// i2c.writeto_mem(42, 2, &[0x10], 8)?; // 1 byte at memory address 2
/// # Ok::<(), ch34x_i2c::Error>(())
/// ```
pub struct I2c<N: Native = NativeLibrary> {
    native: N,
    chip: Chip,
    device: DeviceId,
    speed: BaudRate,
    handle: Option<Handle>,
    address: u16,
}

impl I2c<NativeLibrary> {
    /// Loads the vendor library for `config.driver` and, unless disabled in `config`, opens
    /// the device.
    pub fn new(config: Config) -> Result<Self> {
        let native = NativeLibrary::load(config.driver, config.library.as_deref())?;
        Self::from_native(native, config)
    }

    /// Like `I2c::new` with the configuration taken from the environment.
    pub fn from_env() -> Result<Self> {
        Self::new(Config::from_env()?)
    }
}

impl<N: Native> I2c<N> {
    /// Wraps an already loaded native interface. `config.library` is ignored.
    pub fn from_native(native: N, config: Config) -> Result<Self> {
        let mut i2c = Self {
            native,
            chip: config.driver,
            device: config.id.clone(),
            speed: config.baud_rate(),
            handle: None,
            address: 0,
        };
        if config.auto_init {
            i2c.init()?;
        }
        Ok(i2c)
    }

    pub fn chip(&self) -> Chip {
        self.chip
    }

    pub fn speed(&self) -> BaudRate {
        self.speed
    }

    pub fn native(&self) -> &N {
        &self.native
    }

    pub fn is_open(&self) -> bool {
        self.handle.is_some()
    }

    /// Opens the device and configures the bus speed. Does nothing if already open.
    pub fn init(&mut self) -> Result<()> {
        if self.handle.is_some() {
            return Ok(());
        }
        let handle = self.native.open(&self.device)?;
        debug!("opened {} device {}", self.chip, self.device);

        // older Linux drivers ignore the speed setting unless the version was queried first
        match self.native.chip_version(handle) {
            Ok(Some(version)) => debug!("chip version {:#04x}", version),
            Ok(None) => {}
            Err(e) => warn!("querying the chip version failed: {}", e),
        }

        if let Err(e) = self.native.set_speed(handle, self.speed) {
            if let Err(close_err) = self.native.close(handle) {
                warn!("closing {} after failed init: {}", self.device, close_err);
            }
            return Err(e);
        }
        debug!("bus speed set to {} Hz", self.speed.hz());
        self.handle = Some(handle);
        Ok(())
    }

    /// Closes the device. Does nothing if it isn't open.
    pub fn deinit(&mut self) -> Result<()> {
        match self.handle.take() {
            Some(handle) => {
                debug!("closing {} device {}", self.chip, self.device);
                self.native.close(handle)
            }
            None => Ok(()),
        }
    }

    fn handle(&self) -> Result<Handle> {
        self.handle.ok_or(Error::NotInitialized)
    }

    /// Reads `nbytes` from the peripheral at `addr`.
    pub fn readfrom(&mut self, addr: u8, nbytes: usize) -> Result<Vec<u8>> {
        let mut buf = vec![0u8; nbytes];
        self.readfrom_into(addr, &mut buf)?;
        Ok(buf)
    }

    /// Fills `buf` with bytes read from the peripheral at `addr`.
    pub fn readfrom_into(&mut self, addr: u8, buf: &mut [u8]) -> Result<()> {
        let frame = write_frame(addr, &[])?;
        protocol::stream(&self.native, self.handle()?, &frame, buf)
    }

    /// Writes `buf` to the peripheral at `addr`.
    pub fn writeto(&mut self, addr: u8, buf: &[u8]) -> Result<()> {
        let frame = write_frame(addr, &[buf])?;
        protocol::stream(&self.native, self.handle()?, &frame, &mut [])
    }

    /// Reads `nbytes` from the peripheral at `addr`, starting at memory address `memaddr`
    /// encoded with `addrsize` bits.
    pub fn readfrom_mem(
        &mut self,
        addr: u8,
        memaddr: u32,
        nbytes: usize,
        addrsize: u32,
    ) -> Result<Vec<u8>> {
        let mut buf = vec![0u8; nbytes];
        self.readfrom_mem_into(addr, memaddr, &mut buf, addrsize)?;
        Ok(buf)
    }

    pub fn readfrom_mem_into(
        &mut self,
        addr: u8,
        memaddr: u32,
        buf: &mut [u8],
        addrsize: u32,
    ) -> Result<()> {
        let memaddr = memaddr_to_bytes(memaddr, addrsize)?;
        let frame = write_frame(addr, &[memaddr.as_slice()])?;
        protocol::stream(&self.native, self.handle()?, &frame, buf)
    }

    pub fn writeto_mem(&mut self, addr: u8, memaddr: u32, buf: &[u8], addrsize: u32) -> Result<()> {
        let memaddr = memaddr_to_bytes(memaddr, addrsize)?;
        let frame = write_frame(addr, &[memaddr.as_slice(), buf])?;
        protocol::stream(&self.native, self.handle()?, &frame, &mut [])
    }

    /// Returns true if a peripheral acknowledges its write address `addr`.
    pub fn check_device(&mut self, addr: u8) -> Result<bool> {
        protocol::probe(&self.native, self.handle()?, self.chip, addr)
    }

    /// Returns the addresses in `SCAN_RANGE` that respond.
    pub fn scan(&mut self) -> Result<Vec<u8>> {
        self.scan_range(*SCAN_RANGE.start(), *SCAN_RANGE.end())
    }

    /// Returns the addresses between `start` and `stop` inclusive that respond.
    pub fn scan_range(&mut self, start: u8, stop: u8) -> Result<Vec<u8>> {
        let mut found = Vec::new();
        for addr in start..=stop {
            if self.check_device(addr)? {
                found.push(addr);
            }
        }
        Ok(found)
    }
}

impl<N: Native> Drop for I2c<N> {
    fn drop(&mut self) {
        if let Err(e) = self.deinit() {
            warn!("closing {} failed: {}", self.device, e);
        }
    }
}

impl<N: Native> i2c::Master for I2c<N> {
    type Error = Error;
}

impl<N: Native> i2c::Address for I2c<N> {
    fn set_slave_address(&mut self, addr: u16, tenbit: bool) -> Result<()> {
        if tenbit {
            Err(Error::Unsupported)
        } else if addr > 0x7f {
            Err(Error::InvalidAddress(addr))
        } else {
            self.address = addr;
            Ok(())
        }
    }
}

impl<N: Native> I2c<N> {
    fn slave_address(&self) -> u8 {
        // set_slave_address() only accepts 7-bit addresses
        self.address as u8
    }
}

impl<N: Native> Read for I2c<N> {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        self.readfrom_into(self.slave_address(), buf)?;
        Ok(buf.len())
    }
}

impl<N: Native> Write for I2c<N> {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.writeto(self.slave_address(), buf)?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(()) // noop since no buffering is performed
    }
}

// i2c::ReadWrite should be automatically implemented as long as requirements are met
#[allow(dead_code)]
const fn assert_impl_readwrite<T: i2c::ReadWrite>() {}
const _: () = assert_impl_readwrite::<I2c<NativeLibrary>>();

impl<N: Native> i2c::BulkTransfer for I2c<N> {
    fn i2c_transfer_support(&mut self) -> Result<(i2c::ReadFlags, i2c::WriteFlags)> {
        Ok(Default::default())
    }

    fn i2c_transfer(&mut self, messages: &mut [i2c::Message]) -> Result<()> {
        protocol::transfer(&self.native, self.handle()?, messages)
    }
}
