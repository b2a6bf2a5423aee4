use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use crate::Error;

const WCH_VENDOR_ID: u16 = 0x1a86;

/// Supported WCH USB-to-I2C bridge chips.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Chip {
    #[default]
    Ch341,
    Ch347,
}

impl Chip {
    pub const ALL: [Chip; 2] = [Chip::Ch341, Chip::Ch347];

    pub fn name(self) -> &'static str {
        match self {
            Chip::Ch341 => "ch341",
            Chip::Ch347 => "ch347",
        }
    }

    /// Size of a single USB packet exchanged by the vendor library.
    pub fn packet_length(self) -> usize {
        match self {
            Chip::Ch341 => 32,
            Chip::Ch347 => 512,
        }
    }

    /// Largest read step one stream command can request.
    pub fn stream_max(self) -> u8 {
        self.packet_length().min(0x3f) as u8
    }

    /// Environment variable overriding the native library name.
    pub fn library_env_var(self) -> &'static str {
        match self {
            Chip::Ch341 => "CH341DLL",
            Chip::Ch347 => "CH347DLL",
        }
    }

    /// Library name used when neither the configuration nor the environment names one.
    pub fn default_library(self, platform: Platform) -> &'static str {
        match (self, platform) {
            (Chip::Ch341, Platform::Windows) if cfg!(target_pointer_width = "64") => {
                "CH341DLLA64.dll"
            }
            (Chip::Ch341, Platform::Windows) => "CH341DLL.dll",
            (Chip::Ch347, Platform::Windows) if cfg!(target_pointer_width = "64") => {
                "CH347DLLA64.dll"
            }
            (Chip::Ch347, Platform::Windows) => "CH347DLL.dll",
            // the Linux vendor driver ships a single library for the whole CH34x family
            (_, Platform::Posix) => "libch347.so",
        }
    }

    /// Resolves the native library to load: `explicit`, then the environment, then the
    /// platform default.
    pub fn library_path(self, explicit: Option<PathBuf>, platform: Platform) -> PathBuf {
        explicit
            .or_else(|| {
                std::env::var_os(self.library_env_var())
                    .filter(|v| !v.is_empty())
                    .map(PathBuf::from)
            })
            .unwrap_or_else(|| PathBuf::from(self.default_library(platform)))
    }

    /// USB vendor/product ids under which the chip exposes its I2C interface.
    pub fn usb_ids(self) -> &'static [(u16, u16)] {
        match self {
            Chip::Ch341 => &[(WCH_VENDOR_ID, 0x5512)],
            Chip::Ch347 => &[
                (WCH_VENDOR_ID, 0x55db), // CH347T, mode 1
                (WCH_VENDOR_ID, 0x55de), // CH347F
            ],
        }
    }
}

impl fmt::Display for Chip {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Chip {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let name = s.trim().to_lowercase();
        Chip::ALL
            .into_iter()
            .find(|chip| chip.name() == name)
            .ok_or(Error::InvalidDriver(name))
    }
}

/// Operating system family. The vendor libraries differ in calling convention, device
/// identification and some function names between the two.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Platform {
    Windows,
    Posix,
}

impl Platform {
    pub const fn current() -> Self {
        if cfg!(windows) {
            Platform::Windows
        } else {
            Platform::Posix
        }
    }
}

/// Names of the native functions used by the driver for one chip on one platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SymbolNames {
    pub open: &'static str,
    pub close: &'static str,
    /// `CH341CloseDevice` returns nothing on Windows, every other close function a status.
    pub close_returns_status: bool,
    pub set_speed: &'static str,
    /// The Linux `CH34xSetStream` takes the mode as `uint8_t`, the others as a 32-bit integer.
    pub set_speed_takes_byte: bool,
    /// Needed by older Linux drivers before `CH34xSetStream` takes effect, absent on Windows.
    pub chip_version: Option<&'static str>,
    pub stream_i2c: &'static str,
    pub write_data: &'static str,
    pub write_read: &'static str,
}

impl SymbolNames {
    pub fn resolve(chip: Chip, platform: Platform) -> Self {
        let chip_version = match platform {
            Platform::Windows => None,
            Platform::Posix => Some("CH34x_GetChipVersion"),
        };
        match chip {
            Chip::Ch341 => SymbolNames {
                open: "CH341OpenDevice",
                close: "CH341CloseDevice",
                close_returns_status: platform == Platform::Posix,
                set_speed: match platform {
                    Platform::Windows => "CH341SetStream",
                    Platform::Posix => "CH34xSetStream",
                },
                set_speed_takes_byte: platform == Platform::Posix,
                chip_version,
                stream_i2c: "CH341StreamI2C",
                write_data: "CH341WriteData",
                write_read: "CH341WriteRead",
            },
            Chip::Ch347 => SymbolNames {
                open: "CH347OpenDevice",
                close: "CH347CloseDevice",
                close_returns_status: true,
                set_speed: "CH347I2C_Set",
                set_speed_takes_byte: false,
                chip_version,
                stream_i2c: "CH347StreamI2C",
                write_data: "CH347WriteData",
                write_read: "CH347WriteRead",
            },
        }
    }
}

/// I2C bus speeds understood by the vendor libraries. The discriminant is the native mode value.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum BaudRate {
    Baud20k = 0,
    Baud100k = 1,
    #[default]
    Baud400k = 2,
    Baud750k = 3,
}

impl BaudRate {
    /// Picks the fastest mode that doesn't exceed `freq` (in Hz), falling back to 20 kHz.
    pub fn from_freq(freq: u32) -> Self {
        match freq {
            750_000.. => BaudRate::Baud750k,
            400_000.. => BaudRate::Baud400k,
            100_000.. => BaudRate::Baud100k,
            _ => BaudRate::Baud20k,
        }
    }

    pub fn mode(self) -> u32 {
        self as u32
    }

    pub fn hz(self) -> u32 {
        match self {
            BaudRate::Baud20k => 20_000,
            BaudRate::Baud100k => 100_000,
            BaudRate::Baud400k => 400_000,
            BaudRate::Baud750k => 750_000,
        }
    }
}
