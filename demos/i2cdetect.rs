//! Probes every allowed peripheral address and prints results in a format similar to the
//! standard `i2cdetect` command line tool. The driver is picked with `CH34X_I2C_DRIVER`.
//!
//! ```
//! $ CH34X_I2C_DRIVER=ch347 cargo run --example i2cdetect
//! adapters: ch347 (bus 001, address 007)
//!      0  1  2  3  4  5  6  7  8  9  a  b  c  d  e  f
//! 00:          -- -- -- -- -- -- -- -- -- -- -- -- --
//! 10: -- -- -- -- -- -- -- 17 -- -- -- -- -- -- -- --
//! 20: -- -- -- -- -- -- -- -- -- -- -- -- -- -- -- --
//! 30: -- -- -- -- -- -- -- -- -- -- -- -- -- -- -- --
//! 40: -- -- -- -- 44 -- -- -- -- -- -- -- -- -- -- --
//! 50: 50 -- -- -- -- -- -- -- -- -- -- -- -- -- -- --
//! 60: -- -- -- -- -- -- -- -- -- -- -- -- -- -- -- --
//! 70: -- -- -- -- -- -- -- --
//! ```

type Result<T> = std::result::Result<T, Box<dyn std::error::Error>>;

pub fn main() -> Result<()> {
    env_logger::init();

    // listing doesn't need the vendor library, so failing here isn't fatal
    match ch34x_i2c::devices() {
        Ok(devices) => {
            let names: Vec<String> = devices
                .iter()
                .map(|(chip, dev)| {
                    format!("{} (bus {:03}, address {:03})", chip, dev.bus_number(), dev.address())
                })
                .collect();
            println!("adapters: {}", names.join(", "));
        }
        Err(e) => eprintln!("cannot list USB devices: {}", e),
    }

    let mut bus = ch34x_i2c::I2c::from_env()?;

    println!("     0  1  2  3  4  5  6  7  8  9  a  b  c  d  e  f");
    print!("00:          ");
    for address in 0x03..=0x77 {
        match bus.check_device(address) {
            Ok(true) => print!("{:02x}", address),
            Ok(false) => print!("--"),
            Err(_) => print!("EE"),
        }
        if address & 0x0f == 0x0f {
            println!();
            print!("{:02x}: ", address + 1);
        } else {
            print!(" ");
        }
    }
    println!();

    Ok(())
}
