//! Definition of errors.

use std::error::Error;
use std::fmt;

/// A specialized Result type for Staccato.
pub type Result<T, E = StaccatoError> = std::result::Result<T, E>;

/// The error type for Staccato.
#[derive(Debug)]
pub enum StaccatoError {
    /// The error variant for [`InvalidArgumentError`].
    InvalidArgument(InvalidArgumentError),

    /// The error variant for [`InvalidFormatError`].
    InvalidFormat(InvalidFormatError),

    /// A lattice with no usable bottom-to-top path, or a gold path missing
    /// from an ambiguous lattice.
    Lattice(String),

    /// The oracle could not determine a gold transition.
    Oracle(String),

    /// A model file whose enumerations or version tag do not match.
    ModelMismatch(String),

    /// A parse exceeded the configured per-sentence timeout.
    Timeout,

    /// The error variant for [`TryFromIntError`](std::num::TryFromIntError).
    TryFromInt(std::num::TryFromIntError),

    /// The error variant for [`ParseIntError`](std::num::ParseIntError).
    ParseInt(std::num::ParseIntError),

    /// The error variant for [`DecodeError`](bincode::error::DecodeError).
    BincodeDecode(bincode::error::DecodeError),

    /// The error variant for [`EncodeError`](bincode::error::EncodeError).
    BincodeEncode(bincode::error::EncodeError),

    /// The error variant for [`std::io::Error`].
    StdIo(std::io::Error),
}

impl StaccatoError {
    pub(crate) fn invalid_argument<S>(arg: &'static str, msg: S) -> Self
    where
        S: Into<String>,
    {
        Self::InvalidArgument(InvalidArgumentError {
            arg,
            msg: msg.into(),
        })
    }

    pub(crate) fn invalid_format<S>(source: &'static str, record: usize, msg: S) -> Self
    where
        S: Into<String>,
    {
        Self::InvalidFormat(InvalidFormatError {
            source,
            record,
            msg: msg.into(),
        })
    }

    pub(crate) fn lattice<S>(msg: S) -> Self
    where
        S: Into<String>,
    {
        Self::Lattice(msg.into())
    }

    pub(crate) fn oracle<S>(msg: S) -> Self
    where
        S: Into<String>,
    {
        Self::Oracle(msg.into())
    }

    pub(crate) fn model_mismatch<S>(msg: S) -> Self
    where
        S: Into<String>,
    {
        Self::ModelMismatch(msg.into())
    }
}

impl fmt::Display for StaccatoError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::InvalidArgument(e) => e.fmt(f),
            Self::InvalidFormat(e) => e.fmt(f),
            Self::Lattice(msg) => write!(f, "LatticeError: {msg}"),
            Self::Oracle(msg) => write!(f, "OracleError: {msg}"),
            Self::ModelMismatch(msg) => write!(f, "ModelMismatchError: {msg}"),
            Self::Timeout => write!(f, "TimeoutError: per-sentence time limit exceeded"),
            Self::TryFromInt(e) => e.fmt(f),
            Self::ParseInt(e) => e.fmt(f),
            Self::BincodeDecode(e) => e.fmt(f),
            Self::BincodeEncode(e) => e.fmt(f),
            Self::StdIo(e) => e.fmt(f),
        }
    }
}

impl Error for StaccatoError {}

/// Error used when the argument is invalid.
#[derive(Debug)]
pub struct InvalidArgumentError {
    /// Name of the argument.
    pub(crate) arg: &'static str,

    /// Error message.
    pub(crate) msg: String,
}

impl fmt::Display for InvalidArgumentError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "InvalidArgumentError: {}: {}", self.arg, self.msg)
    }
}

impl Error for InvalidArgumentError {}

/// Error used when an input record is malformed.
#[derive(Debug)]
pub struct InvalidFormatError {
    /// Name of the input the record came from.
    pub(crate) source: &'static str,

    /// Zero-based index of the offending record.
    pub(crate) record: usize,

    /// Error message.
    pub(crate) msg: String,
}

impl fmt::Display for InvalidFormatError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "InvalidFormatError: {}: record {}: {}",
            self.source, self.record, self.msg
        )
    }
}

impl Error for InvalidFormatError {}

impl From<std::num::TryFromIntError> for StaccatoError {
    fn from(error: std::num::TryFromIntError) -> Self {
        Self::TryFromInt(error)
    }
}

impl From<std::num::ParseIntError> for StaccatoError {
    fn from(error: std::num::ParseIntError) -> Self {
        Self::ParseInt(error)
    }
}

impl From<bincode::error::DecodeError> for StaccatoError {
    fn from(error: bincode::error::DecodeError) -> Self {
        Self::BincodeDecode(error)
    }
}

impl From<bincode::error::EncodeError> for StaccatoError {
    fn from(error: bincode::error::EncodeError) -> Self {
        Self::BincodeEncode(error)
    }
}

impl From<std::io::Error> for StaccatoError {
    fn from(error: std::io::Error) -> Self {
        Self::StdIo(error)
    }
}
