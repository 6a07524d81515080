//! Unified error types for the light controller.
//!
//! A single `Error` enum that every subsystem converts into, so command
//! callbacks, fade tasks and the binary can handle failures uniformly.

use core::fmt;

// ---------------------------------------------------------------------------
// Top-level error
// ---------------------------------------------------------------------------

/// Every fallible operation in the controller funnels into this type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// A channel id or value was outside the hardware's range.
    Range(RangeError),
    /// The PWM hardware rejected a register write.
    Bus(BusError),
    /// A command payload could not be interpreted.
    Parse(ParseError),
    /// A fade task could not be started or stopped cleanly.
    Fade(FadeError),
    /// The pub/sub transport refused a request.
    Transport(TransportError),
    /// A configured device could not be brought up.
    Setup(String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Range(e) => write!(f, "range: {e}"),
            Self::Bus(e) => write!(f, "bus: {e}"),
            Self::Parse(e) => write!(f, "parse: {e}"),
            Self::Fade(e) => write!(f, "fade: {e}"),
            Self::Transport(e) => write!(f, "transport: {e}"),
            Self::Setup(msg) => write!(f, "setup: {msg}"),
        }
    }
}

impl std::error::Error for Error {}

// ---------------------------------------------------------------------------
// Range errors
// ---------------------------------------------------------------------------

/// Which hardware bound a write violated, and the offending value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RangeError {
    /// Channel id outside `[min, max]`.
    Channel { value: u32, min: u8, max: u8 },
    /// Channel value outside `[min, max]`.
    Value { value: i64, min: u16, max: u16 },
}

impl fmt::Display for RangeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Channel { value, min, max } => {
                write!(f, "channel id {value} must be between {min} and {max}")
            }
            Self::Value { value, min, max } => {
                write!(f, "channel value {value} must be between {min} and {max}")
            }
        }
    }
}

impl From<RangeError> for Error {
    fn from(e: RangeError) -> Self {
        Self::Range(e)
    }
}

// ---------------------------------------------------------------------------
// Bus errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BusError {
    /// The I2C transaction failed.
    WriteFailed(String),
    /// The controller could not be initialised.
    InitFailed(String),
}

impl fmt::Display for BusError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::WriteFailed(msg) => write!(f, "PWM write failed: {msg}"),
            Self::InitFailed(msg) => write!(f, "PWM init failed: {msg}"),
        }
    }
}

impl From<BusError> for Error {
    fn from(e: BusError) -> Self {
        Self::Bus(e)
    }
}

// ---------------------------------------------------------------------------
// Parse errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    /// Payload was not valid UTF-8.
    NotUtf8,
    /// A component was not a number.
    NotNumeric(String),
    /// Color payload had the wrong number of components.
    ComponentCount { expected: usize, found: usize },
    /// Numeric value outside `[0, value_range]`.
    OutOfRange { value: i64, max: u32 },
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotUtf8 => write!(f, "payload is not UTF-8"),
            Self::NotNumeric(raw) => write!(f, "'{raw}' is not a number"),
            Self::ComponentCount { expected, found } => {
                write!(f, "expected {expected} color components, got {found}")
            }
            Self::OutOfRange { value, max } => {
                write!(f, "value {value} outside 0..={max}")
            }
        }
    }
}

impl From<ParseError> for Error {
    fn from(e: ParseError) -> Self {
        Self::Parse(e)
    }
}

// ---------------------------------------------------------------------------
// Fade errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FadeError {
    /// Target list length does not match the device's channel count.
    TargetCount { expected: usize, found: usize },
    /// The superseded fade task did not exit within the join timeout.
    /// Indicates a stuck hardware write.
    JoinTimeout,
    /// The superseded fade task panicked.
    TaskPanicked,
    /// The OS refused to spawn a fade thread.
    SpawnFailed(String),
}

impl fmt::Display for FadeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TargetCount { expected, found } => {
                write!(f, "expected {expected} target values, got {found}")
            }
            Self::JoinTimeout => write!(f, "previous fade did not stop in time"),
            Self::TaskPanicked => write!(f, "previous fade task panicked"),
            Self::SpawnFailed(msg) => write!(f, "could not spawn fade task: {msg}"),
        }
    }
}

impl From<FadeError> for Error {
    fn from(e: FadeError) -> Self {
        Self::Fade(e)
    }
}

// ---------------------------------------------------------------------------
// Transport errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    SubscribeFailed(String),
    PublishFailed(String),
    Disconnected,
}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SubscribeFailed(msg) => write!(f, "subscribe failed: {msg}"),
            Self::PublishFailed(msg) => write!(f, "publish failed: {msg}"),
            Self::Disconnected => write!(f, "transport disconnected"),
        }
    }
}

impl From<TransportError> for Error {
    fn from(e: TransportError) -> Self {
        Self::Transport(e)
    }
}

// ---------------------------------------------------------------------------
// Convenience Result alias
// ---------------------------------------------------------------------------

/// Crate-wide `Result` alias.
pub type Result<T> = core::result::Result<T, Error>;
