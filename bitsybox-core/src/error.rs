use std::fmt;

/// Errors raised by the console core.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ConsoleError {
    /// A buffer could not be allocated. Prior state is left intact.
    AllocationFailure { what: &'static str, bytes: usize },
    /// The buffer table has no free slot for another tile.
    ResourceExhausted { max_buffers: usize },
    /// An index or argument outside its valid range.
    OutOfRange { what: &'static str, value: i64 },
    /// A tile handle from before a `reset_tiles`.
    StaleHandle { index: usize, generation: u32 },
    /// A load/update/quit hook returned an error.
    ScriptHook { hook: &'static str, message: String },
    /// An engine unit or game/font asset was missing or unreadable.
    AssetLoad(String),
    /// The buffers were released at teardown.
    SessionClosed,
}

impl fmt::Display for ConsoleError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConsoleError::AllocationFailure { what, bytes } => {
                write!(f, "failed to allocate {bytes} bytes for {what}")
            }
            ConsoleError::ResourceExhausted { max_buffers } => {
                write!(f, "buffer table full ({max_buffers} buffers)")
            }
            ConsoleError::OutOfRange { what, value } => write!(f, "{what} out of range: {value}"),
            ConsoleError::StaleHandle { index, generation } => {
                write!(f, "stale tile handle {index} (generation {generation})")
            }
            ConsoleError::ScriptHook { hook, message } => write!(f, "{hook} hook failed: {message}"),
            ConsoleError::AssetLoad(msg) => write!(f, "asset load failed: {msg}"),
            ConsoleError::SessionClosed => write!(f, "session already torn down"),
        }
    }
}

impl std::error::Error for ConsoleError {}

pub type Result<T> = std::result::Result<T, ConsoleError>;

pub(crate) fn out_of_range(what: &'static str, value: impl Into<i64>) -> ConsoleError {
    ConsoleError::OutOfRange { what, value: value.into() }
}
