use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use crate::chip::{BaudRate, Chip};
use crate::Result;

/// Environment variable selecting the driver used by `Config::from_env`.
pub const DRIVER_ENV_VAR: &str = "CH34X_I2C_DRIVER";

/// Older name for `DRIVER_ENV_VAR`, consulted only when that one isn't set.
pub const LEGACY_DRIVER_ENV_VAR: &str = "I2CPY_DRIVER";

/// Identifies the adapter to open: a device index, or on POSIX systems a device node such as
/// `/dev/ch34x_pis0`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeviceId {
    Index(u32),
    Path(PathBuf),
}

impl DeviceId {
    /// Device node used by the Linux vendor driver. Indices map to `/dev/ch34x_pis{n}`.
    pub fn device_path(&self) -> PathBuf {
        match self {
            DeviceId::Index(index) => PathBuf::from(format!("/dev/ch34x_pis{}", index)),
            DeviceId::Path(path) => path.clone(),
        }
    }
}

impl Default for DeviceId {
    fn default() -> Self {
        DeviceId::Index(0)
    }
}

impl From<u32> for DeviceId {
    fn from(index: u32) -> Self {
        DeviceId::Index(index)
    }
}

impl From<PathBuf> for DeviceId {
    fn from(path: PathBuf) -> Self {
        DeviceId::Path(path)
    }
}

impl FromStr for DeviceId {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(match s.parse::<u32>() {
            Ok(index) => DeviceId::Index(index),
            Err(_) => DeviceId::Path(PathBuf::from(s)),
        })
    }
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeviceId::Index(index) => write!(f, "#{}", index),
            DeviceId::Path(path) => write!(f, "{}", path.display()),
        }
    }
}

/// Settings for opening a bus with `crate::I2c::new`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub driver: Chip,
    pub id: DeviceId,
    /// Requested bus frequency in Hz, rounded down to a speed the chip supports.
    pub freq: u32,
    /// Native library to load instead of the environment or platform default.
    pub library: Option<PathBuf>,
    /// Whether `I2c::new` opens the device right away.
    pub auto_init: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            driver: Chip::default(),
            id: DeviceId::default(),
            freq: 400_000,
            library: None,
            auto_init: true,
        }
    }
}

impl Config {
    /// Default configuration with the driver taken from `CH34X_I2C_DRIVER`, or failing that
    /// from `I2CPY_DRIVER`.
    pub fn from_env() -> Result<Self> {
        let driver = match [DRIVER_ENV_VAR, LEGACY_DRIVER_ENV_VAR]
            .into_iter()
            .filter_map(|var| std::env::var(var).ok())
            .find(|name| !name.trim().is_empty())
        {
            Some(name) => name.parse()?,
            None => Chip::default(),
        };
        Ok(Self {
            driver,
            ..Default::default()
        })
    }

    pub fn driver(mut self, driver: Chip) -> Self {
        self.driver = driver;
        self
    }

    pub fn id(mut self, id: impl Into<DeviceId>) -> Self {
        self.id = id.into();
        self
    }

    pub fn freq(mut self, freq: u32) -> Self {
        self.freq = freq;
        self
    }

    pub fn library(mut self, library: impl Into<PathBuf>) -> Self {
        self.library = Some(library.into());
        self
    }

    pub fn auto_init(mut self, auto_init: bool) -> Self {
        self.auto_init = auto_init;
        self
    }

    pub fn baud_rate(&self) -> BaudRate {
        BaudRate::from_freq(self.freq)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Error;
    use serial_test::serial;

    #[test]
    fn test_device_id_parse() {
        assert_eq!("0".parse::<DeviceId>().unwrap(), DeviceId::Index(0));
        assert_eq!("12".parse::<DeviceId>().unwrap(), DeviceId::Index(12));
        assert_eq!(
            "/dev/ch34x_pis1".parse::<DeviceId>().unwrap(),
            DeviceId::Path("/dev/ch34x_pis1".into())
        );
    }

    #[test]
    fn test_device_path() {
        assert_eq!(
            DeviceId::Index(0).device_path(),
            PathBuf::from("/dev/ch34x_pis0")
        );
        assert_eq!(
            DeviceId::Index(3).device_path(),
            PathBuf::from("/dev/ch34x_pis3")
        );
        assert_eq!(
            DeviceId::Path("/dev/custom".into()).device_path(),
            PathBuf::from("/dev/custom")
        );
    }

    #[test]
    fn test_builder() {
        let config = Config::default()
            .driver(Chip::Ch347)
            .id(2u32)
            .freq(100_000)
            .library("/opt/libch347.so")
            .auto_init(false);
        assert_eq!(config.driver, Chip::Ch347);
        assert_eq!(config.id, DeviceId::Index(2));
        assert_eq!(config.baud_rate(), BaudRate::Baud100k);
        assert_eq!(config.library, Some(PathBuf::from("/opt/libch347.so")));
        assert!(!config.auto_init);
        assert_eq!(Config::default().baud_rate(), BaudRate::Baud400k);
    }

    #[test]
    #[serial]
    fn test_from_env() {
        std::env::remove_var(DRIVER_ENV_VAR);
        std::env::remove_var(LEGACY_DRIVER_ENV_VAR);
        assert_eq!(Config::from_env().unwrap().driver, Chip::Ch341);

        std::env::set_var(DRIVER_ENV_VAR, "");
        assert_eq!(Config::from_env().unwrap().driver, Chip::Ch341);

        std::env::set_var(DRIVER_ENV_VAR, "CH347");
        assert_eq!(Config::from_env().unwrap().driver, Chip::Ch347);

        std::env::set_var(DRIVER_ENV_VAR, "somethingbad");
        assert!(matches!(
            Config::from_env(),
            Err(Error::InvalidDriver(name)) if name == "somethingbad"
        ));
        std::env::remove_var(DRIVER_ENV_VAR);
    }

    #[test]
    #[serial]
    fn test_from_env_legacy_name() {
        std::env::remove_var(DRIVER_ENV_VAR);
        std::env::set_var(LEGACY_DRIVER_ENV_VAR, "ch347");
        assert_eq!(Config::from_env().unwrap().driver, Chip::Ch347);

        // the current name wins when both are set
        std::env::set_var(DRIVER_ENV_VAR, "ch341");
        assert_eq!(Config::from_env().unwrap().driver, Chip::Ch341);

        // an empty current name doesn't hide the legacy one
        std::env::set_var(DRIVER_ENV_VAR, "");
        assert_eq!(Config::from_env().unwrap().driver, Chip::Ch347);

        std::env::set_var(LEGACY_DRIVER_ENV_VAR, "bogus");
        assert!(matches!(
            Config::from_env(),
            Err(Error::InvalidDriver(name)) if name == "bogus"
        ));
        std::env::remove_var(LEGACY_DRIVER_ENV_VAR);
        std::env::remove_var(DRIVER_ENV_VAR);
    }
}
