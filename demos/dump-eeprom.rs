//! Dumps the contents of an EEPROM chip at I2C address 0x50. Pass the number of bytes (e.g. the
//! EEPROM size, at most 64 KiB) as command line argument. Chips larger than 256 bytes use 16-bit
//! addressing.
//!
//! ```
//! cargo run --example dump-eeprom 64
//! 0000  ff ff ff ff ff ff ff ff  ff ff ff ff ff ff ff ff   |................|
//! 0010  ff ff ff ff ff ff ff ff  ff ff ff ff ff ff ff ff   |................|
//! 0020  aa 55 a0 a5 0a 5a ff 00  12 ca ff ee 12 23 34 45   |.U...Z.......#4E|
//! 0030  ff ff ff ff ff ff ff ff  ff ff ff ff ff ff ff ff   |................|
//! ```

use std::error::Error;

const EEPROM_ADDR: u8 = 0x50;
const BLOCK_SIZE: usize = 16;
const MAX_BYTES: u32 = 1 << 16;

fn main() -> Result<(), Box<dyn Error>> {
    env_logger::init();

    let bytes_to_read = match std::env::args().nth(1) {
        Some(val) => val.parse::<u32>()?,
        None => return Err("Missing argument".into()),
    };
    if bytes_to_read > MAX_BYTES {
        return Err(format!("Can't address more than {} bytes", MAX_BYTES).into());
    }
    let addrsize = if bytes_to_read > 256 { 16 } else { 8 };

    let mut bus = ch34x_i2c::I2c::from_env()?;
    let mut offset: u32 = 0;
    while offset < bytes_to_read {
        let len = BLOCK_SIZE.min((bytes_to_read - offset) as usize);
        let block = bus.readfrom_mem(EEPROM_ADDR, offset, len, addrsize)?;
        print_hexdump_line(offset, &block);
        offset += len as u32;
    }
    Ok(())
}

/// Prints one line of up to 16 bytes in a style similar to `hexdump -C`.
fn print_hexdump_line(base_offset: u32, data: &[u8]) {
    print!("{:04x}  ", base_offset);

    for (i, byte) in data.iter().enumerate() {
        if i == 8 {
            print!(" ");
        }
        print!("{:02x} ", byte);
    }
    for i in data.len()..BLOCK_SIZE {
        if i == 8 {
            print!(" ");
        }
        print!("   ");
    }

    print!("  |");
    for byte in data.iter() {
        let c = if byte.is_ascii_graphic() || *byte == b' ' {
            *byte as char
        } else {
            '.'
        };
        print!("{}", c);
    }
    println!("|");
}
