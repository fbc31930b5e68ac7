use crate::peripheral::DeviceId;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("could not find peripheral {0}")]
    DeviceNotFound(DeviceId),

    #[error("too many peripherals, at most {0} can be installed")]
    TooManyPeripherals(usize),

    #[error("interrupt not handled")]
    InterruptNotHandled,

    #[error("{name}: {message}")]
    Peripheral { name: String, message: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl Error {
    pub fn peripheral(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Peripheral {
            name: name.into(),
            message: message.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
