use i2c::Message;
use log::trace;

use crate::chip::Chip;
use crate::codec::{addr_byte, write_frame};
use crate::native::{Handle, Native};
use crate::{Error, Result};

#[allow(dead_code)]
mod constants {
    pub const CMD_I2C_STREAM: u8 = 0xaa;

    // sub-commands following CMD_I2C_STREAM
    pub const I2C_STM_STA: u8 = 0x74;
    pub const I2C_STM_STO: u8 = 0x75;
    pub const I2C_STM_OUT: u8 = 0x80; // low 6 bits: number of bytes, 0 for a single byte + ACK
    pub const I2C_STM_IN: u8 = 0xc0; // low 6 bits: number of bytes to read
    pub const I2C_STM_SET: u8 = 0x60;
    pub const I2C_STM_US: u8 = 0x40;
    pub const I2C_STM_MS: u8 = 0x50;
    pub const I2C_STM_DLY: u8 = 0x0f;
    pub const I2C_STM_END: u8 = 0x00;

    // status byte returned after I2C_STM_OUT
    pub const STATUS_NACK: u8 = 0x80;
}
pub(crate) use constants::*;

/// One complete transaction handled by the vendor library: `write` (address byte first), then
/// a repeated START and a read filling `read` if it isn't empty.
pub(crate) fn stream(
    dev: &impl Native,
    handle: Handle,
    write: &[u8],
    read: &mut [u8],
) -> Result<()> {
    trace!("stream write {:02x?} read {} bytes", write, read.len());
    dev.stream_i2c(handle, write, read)
}

/// Generates a START condition on the bus (SDA transitions to low while SCL is high).
pub(crate) fn start(dev: &impl Native, handle: Handle) -> Result<()> {
    dev.write_data(handle, &[CMD_I2C_STREAM, I2C_STM_STA, I2C_STM_END])
}

/// Generates a STOP condition on the bus (SDA transitions to high while SCL is high).
pub(crate) fn stop(dev: &impl Native, handle: Handle) -> Result<()> {
    dev.write_data(handle, &[CMD_I2C_STREAM, I2C_STM_STO, I2C_STM_END])
}

/// Clocks out a single byte and reports whether the peripheral acknowledged it.
pub(crate) fn out_byte_check_ack(
    dev: &impl Native,
    handle: Handle,
    chip: Chip,
    byte: u8,
) -> Result<bool> {
    let cmd = [CMD_I2C_STREAM, I2C_STM_OUT, byte, I2C_STM_END];
    let mut response = vec![0u8; chip.packet_length()];
    let n_read = dev.write_read(handle, &cmd, chip.stream_max().into(), 1, &mut response)?;
    Ok(n_read > 0 && response[n_read - 1] & STATUS_NACK == 0)
}

/// Checks whether a peripheral acknowledges its write address. The bus is always released
/// with a STOP, even if sending the address fails.
pub(crate) fn probe(dev: &impl Native, handle: Handle, chip: Chip, addr: u8) -> Result<bool> {
    let byte = addr_byte(addr, false)?;
    start(dev, handle)?;
    let acked = out_byte_check_ack(dev, handle, chip, byte);
    let stopped = stop(dev, handle);
    let acked = acked?;
    stopped?;
    Ok(acked)
}

fn seven_bit(address: u16) -> Result<u8> {
    u8::try_from(address)
        .ok()
        .filter(|a| *a <= 0x7f)
        .ok_or(Error::InvalidAddress(address))
}

/// Maps message sequences onto stream transactions. The vendor library only supports a write,
/// a read, or a write followed by a read from the same peripheral and none of the
/// protocol-mangling flags.
pub(crate) fn transfer(dev: &impl Native, handle: Handle, messages: &mut [Message]) -> Result<()> {
    let flags_ok = messages.iter().all(|m| match m {
        Message::Read { flags, .. } => flags.is_empty(),
        Message::Write { flags, .. } => flags.is_empty(),
    });
    if !flags_ok {
        return Err(Error::Unsupported);
    }

    match messages {
        [] => Ok(()),
        [Message::Write { address, data, .. }] => {
            let frame = write_frame(seven_bit(*address)?, &[*data])?;
            stream(dev, handle, &frame, &mut [])
        }
        [Message::Read { address, data, .. }] => {
            let frame = write_frame(seven_bit(*address)?, &[])?;
            stream(dev, handle, &frame, &mut **data)
        }
        [Message::Write {
            address: w_address,
            data: w_data,
            ..
        }, Message::Read {
            address: r_address,
            data: r_data,
            ..
        }] if *w_address == *r_address => {
            let frame = write_frame(seven_bit(*w_address)?, &[*w_data])?;
            stream(dev, handle, &frame, &mut **r_data)
        }
        _ => Err(Error::Unsupported),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::native::mock::{Call, MockNative};
    use i2c::{ReadFlags, WriteFlags};

    const H: Handle = Handle::new(3);

    #[test]
    fn test_start_stop() {
        let dev = MockNative::new();
        start(&dev, H).unwrap();
        stop(&dev, H).unwrap();
        assert_eq!(
            dev.take_calls(),
            [
                Call::WriteData(vec![0xaa, 0x74, 0x00]),
                Call::WriteData(vec![0xaa, 0x75, 0x00]),
            ]
        );
    }

    #[test]
    fn test_probe_present() {
        let dev = MockNative::with_devices(&[0x17]);
        assert!(probe(&dev, H, Chip::Ch341, 0x17).unwrap());
        assert_eq!(
            dev.take_calls(),
            [
                Call::WriteData(vec![0xaa, 0x74, 0x00]),
                Call::WriteRead {
                    write: vec![0xaa, 0x80, 0x2e, 0x00],
                    read_step: 0x20,
                    read_times: 1,
                },
                Call::WriteData(vec![0xaa, 0x75, 0x00]),
            ]
        );
    }

    #[test]
    fn test_probe_absent() {
        let dev = MockNative::with_devices(&[0x17]);
        assert!(!probe(&dev, H, Chip::Ch347, 0x18).unwrap());
        let calls = dev.take_calls();
        assert!(matches!(calls[1], Call::WriteRead { read_step: 0x3f, .. }));
    }

    #[test]
    fn test_probe_stops_after_failure() {
        let dev = MockNative::with_devices(&[0x17]);
        dev.fail("write_read");
        assert!(matches!(
            probe(&dev, H, Chip::Ch341, 0x17),
            Err(Error::OperationFailed("write_read"))
        ));
        assert_eq!(
            dev.take_calls().last(),
            Some(&Call::WriteData(vec![0xaa, 0x75, 0x00])),
            "STOP must be issued after a failed byte"
        );
    }

    #[test]
    fn test_probe_start_failure() {
        let dev = MockNative::with_devices(&[0x17]);
        dev.fail("write_data");
        assert!(probe(&dev, H, Chip::Ch341, 0x17).is_err());
        assert_eq!(dev.take_calls().len(), 1);
    }

    #[test]
    fn test_transfer_zero_length() {
        let dev = MockNative::new();
        let mut msgs: [Message; 0] = [];
        transfer(&dev, H, &mut msgs).unwrap();
        assert!(dev.take_calls().is_empty());
    }

    #[test]
    fn test_transfer_single_write() {
        let dev = MockNative::new();
        let mut msgs = [Message::Write {
            address: 0x50,
            data: &[0x11, 0x22],
            flags: WriteFlags::empty(),
        }];
        transfer(&dev, H, &mut msgs).unwrap();
        assert_eq!(
            dev.take_calls(),
            [Call::StreamI2c {
                write: vec![0xa0, 0x11, 0x22],
                read_len: 0
            }]
        );
    }

    #[test]
    fn test_transfer_single_read() {
        let dev = MockNative::new();
        dev.schedule_read(&[0xaa, 0xbb, 0xcc]);
        let mut read_buf = [0u8; 3];
        let mut msgs = [Message::Read {
            address: 0x50,
            data: &mut read_buf,
            flags: ReadFlags::empty(),
        }];
        transfer(&dev, H, &mut msgs).unwrap();
        assert_eq!(read_buf, [0xaa, 0xbb, 0xcc]);
        assert_eq!(
            dev.take_calls(),
            [Call::StreamI2c {
                write: vec![0xa0],
                read_len: 3
            }]
        );
    }

    #[test]
    fn test_transfer_write_then_read() {
        let dev = MockNative::new();
        dev.schedule_read(&[0x01, 0x02]);
        let mut read_buf = [0u8; 2];
        let mut msgs = [
            Message::Write {
                address: 0x10,
                data: &[0x00, 0x20],
                flags: WriteFlags::empty(),
            },
            Message::Read {
                address: 0x10,
                data: &mut read_buf,
                flags: ReadFlags::empty(),
            },
        ];
        transfer(&dev, H, &mut msgs).unwrap();
        assert_eq!(read_buf, [0x01, 0x02]);
        assert_eq!(
            dev.take_calls(),
            [Call::StreamI2c {
                write: vec![0x20, 0x00, 0x20],
                read_len: 2
            }]
        );
    }

    #[test]
    fn test_transfer_unsupported() {
        let dev = MockNative::new();
        let mut read_buf = [0u8; 2];

        // different peripherals
        let mut msgs = [
            Message::Write {
                address: 0x10,
                data: &[0x00],
                flags: WriteFlags::empty(),
            },
            Message::Read {
                address: 0x20,
                data: &mut read_buf,
                flags: ReadFlags::empty(),
            },
        ];
        assert!(matches!(
            transfer(&dev, H, &mut msgs),
            Err(Error::Unsupported)
        ));

        // protocol mangling
        let mut msgs = [Message::Write {
            address: 0x10,
            data: &[0x00],
            flags: WriteFlags::IGNORE_NACK,
        }];
        assert!(matches!(
            transfer(&dev, H, &mut msgs),
            Err(Error::Unsupported)
        ));

        // ten-bit address
        let mut msgs = [Message::Write {
            address: 0x2f0,
            data: &[0x00],
            flags: WriteFlags::empty(),
        }];
        assert!(matches!(
            transfer(&dev, H, &mut msgs),
            Err(Error::InvalidAddress(0x2f0))
        ));
        assert!(dev.take_calls().is_empty());
    }
}
