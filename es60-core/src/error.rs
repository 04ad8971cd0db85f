//! Error types for ES60 operations

/// Errors that can occur while reading, decoding, correcting or analysing telegrams
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum TelegramError {
    /// Length prefix smaller than the datagram header
    #[error("Record length is too short: {0}")]
    RecordTooShort(i32),

    /// Length prefix exceeds the accepted maximum
    #[error("Telegram length {0} exceeds maximum {1}")]
    TelegramTooLarge(u32, u32),

    /// Leading and trailing length fields disagree
    #[error("Length mismatch in {tag} telegram: {leading} != {trailing}")]
    LengthMismatch {
        /// Type tag of the offending telegram
        tag: String,
        /// Length read before the header
        leading: i32,
        /// Length read after the payload
        trailing: i32,
    },

    /// The stream ended
    ///
    /// `partial` counts the bytes of an incomplete telegram that were consumed
    /// before the end; zero means the stream ended cleanly on a record boundary.
    #[error("End of stream ({partial} bytes of a partial telegram)")]
    EndOfStream {
        /// Bytes of the truncated telegram read before the end
        partial: usize,
    },

    /// RAW0 payload length inconsistent with its sample count
    #[error("Bad RAW0 length for {count} samples: got {actual} bytes")]
    RawLength {
        /// Declared sample count
        count: i32,
        /// Payload length in bytes
        actual: usize,
    },

    /// Payload fields could not be decoded
    #[error("Decode error: {0}")]
    Decode(String),

    /// Channel number outside the tracked range
    #[error("Channel {0} is outside the supported range")]
    ChannelOutOfRange(i32),

    /// Tick count that cannot be represented as a calendar time
    #[error("Timestamp of {0} ticks is out of range")]
    TimestampOutOfRange(i64),

    /// IO error during read/write
    #[error("IO error: {0}")]
    Io(String),

    /// Output path would overwrite the input
    #[error("Output file is the same as input: {0}")]
    SamePath(String),

    /// Output file name could not be derived from the input
    #[error("Cannot derive output name from: {0}")]
    InvalidOutputName(String),

    /// Processing was cancelled
    #[error("Processing interrupted")]
    Interrupted,
}

impl TelegramError {
    /// True for end of stream, which terminates read loops normally
    pub fn is_end_of_stream(&self) -> bool {
        matches!(self, TelegramError::EndOfStream { .. })
    }

    /// True for errors that leave the stream position unreliable
    pub fn is_framing(&self) -> bool {
        matches!(
            self,
            TelegramError::RecordTooShort(_)
                | TelegramError::TelegramTooLarge(..)
                | TelegramError::LengthMismatch { .. }
        )
    }
}

impl From<std::io::Error> for TelegramError {
    fn from(err: std::io::Error) -> Self {
        if err.kind() == std::io::ErrorKind::UnexpectedEof {
            TelegramError::EndOfStream { partial: 0 }
        } else {
            TelegramError::Io(err.to_string())
        }
    }
}
