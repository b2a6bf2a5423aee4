#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("USB error")]
    Usb(#[from] rusb::Error),

    #[error("cannot load native library {name}")]
    Library {
        name: String,
        #[source]
        source: libloading::Error,
    },

    #[error("native library {library} does not export {symbol}")]
    MissingSymbol {
        library: String,
        symbol: &'static str,
        #[source]
        source: libloading::Error,
    },

    #[error("cannot load driver: '{0}'")]
    InvalidDriver(String),

    #[error("cannot open device {0}")]
    OpenFailed(String),

    #[error("{0} failed")]
    OperationFailed(&'static str),

    #[error("bad memory address size: {0}")]
    MemoryAddressSize(u32),

    #[error("not a 7-bit i2c address: {0:#x}")]
    InvalidAddress(u16),

    #[error("the bus is not initialised")]
    NotInitialized,

    #[error("transfer not supported by the adapter")]
    Unsupported,
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    fn io_kind(&self) -> std::io::ErrorKind {
        use std::io::ErrorKind;
        match self {
            Error::Usb(rusb::Error::InvalidParam) => ErrorKind::InvalidInput,
            Error::Usb(rusb::Error::Access) => ErrorKind::PermissionDenied,
            Error::Usb(rusb::Error::NoDevice) => ErrorKind::ConnectionRefused,
            Error::Usb(rusb::Error::NotFound) => ErrorKind::NotFound,
            Error::Usb(rusb::Error::Busy) => ErrorKind::ResourceBusy,
            Error::Usb(rusb::Error::Timeout) => ErrorKind::TimedOut,
            Error::Usb(rusb::Error::Pipe) => ErrorKind::BrokenPipe,
            Error::Usb(rusb::Error::Interrupted) => ErrorKind::Interrupted,
            Error::Usb(rusb::Error::NoMem) => ErrorKind::OutOfMemory,
            Error::Usb(_) => ErrorKind::Other,
            Error::Library { .. } | Error::MissingSymbol { .. } => ErrorKind::NotFound,
            Error::InvalidDriver(_) => ErrorKind::NotFound,
            Error::OpenFailed(_) => ErrorKind::ConnectionRefused,
            Error::OperationFailed(_) => ErrorKind::Other,
            Error::MemoryAddressSize(_) | Error::InvalidAddress(_) => ErrorKind::InvalidInput,
            Error::NotInitialized => ErrorKind::NotConnected,
            Error::Unsupported => ErrorKind::Unsupported,
        }
    }
}

impl From<Error> for std::io::Error {
    fn from(value: Error) -> Self {
        std::io::Error::new(value.io_kind(), value)
    }
}

impl From<std::io::Error> for Error {
    fn from(value: std::io::Error) -> Self {
        use std::io::ErrorKind;

        // errors that went through `From<Error> for io::Error` come back unchanged
        let kind = value.kind();
        if let Some(inner) = value.into_inner() {
            if let Ok(err) = inner.downcast::<Error>() {
                return *err;
            }
        }
        match kind {
            ErrorKind::InvalidInput => Error::Usb(rusb::Error::InvalidParam),
            ErrorKind::PermissionDenied => Error::Usb(rusb::Error::Access),
            ErrorKind::ConnectionRefused => Error::Usb(rusb::Error::NoDevice),
            ErrorKind::NotFound => Error::Usb(rusb::Error::NotFound),
            ErrorKind::ResourceBusy => Error::Usb(rusb::Error::Busy),
            ErrorKind::TimedOut => Error::Usb(rusb::Error::Timeout),
            ErrorKind::BrokenPipe => Error::Usb(rusb::Error::Pipe),
            ErrorKind::Interrupted => Error::Usb(rusb::Error::Interrupted),
            ErrorKind::OutOfMemory => Error::Usb(rusb::Error::NoMem),
            ErrorKind::NotConnected => Error::NotInitialized,
            ErrorKind::Unsupported => Error::Unsupported,
            _ => Error::Usb(rusb::Error::Other),
        }
    }
}
