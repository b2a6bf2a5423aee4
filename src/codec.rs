//! Byte-level encoding of peripheral and memory addresses as they are written to the bus.

use crate::{Error, Result};

/// Memory address width used by most small EEPROMs and register-mapped peripherals.
pub const DEFAULT_ADDRSIZE: u32 = 8;

/// Converts a 7-bit peripheral address into the first byte of a transaction, with the R/W bit
/// set for reads.
pub fn addr_byte(addr: u8, read: bool) -> Result<u8> {
    if addr > 0x7f {
        return Err(Error::InvalidAddress(addr.into()));
    }
    Ok(addr << 1 | u8::from(read))
}

/// Encodes the low `addrsize` bits of `memaddr` big-endian. `addrsize` must be one of 8, 16, 24
/// or 32.
pub fn memaddr_to_bytes(memaddr: u32, addrsize: u32) -> Result<Vec<u8>> {
    if addrsize & 0x7 != 0 || !(8..=32).contains(&addrsize) {
        return Err(Error::MemoryAddressSize(addrsize));
    }
    let n_bytes = (addrsize / 8) as usize;
    Ok(memaddr.to_be_bytes()[4 - n_bytes..].to_vec())
}

/// Builds the buffer for a native stream call: the write address byte of `addr` followed by all
/// of `parts`.
pub fn write_frame(addr: u8, parts: &[&[u8]]) -> Result<Vec<u8>> {
    let len = 1 + parts.iter().map(|p| p.len()).sum::<usize>();
    let mut frame = Vec::with_capacity(len);
    frame.push(addr_byte(addr, false)?);
    for part in parts {
        frame.extend_from_slice(part);
    }
    Ok(frame)
}
