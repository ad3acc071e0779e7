//! Error types for the protocol layer.
//!
//! A `ProtocolError` always means the bytes were wrong, never that the
//! network was. Transport failures live in `aptrack-transport`.

/// Errors that can occur while encoding or decoding frames.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// Serialization failed (turning a packet into JSON).
    #[error("encode failed: {0}")]
    Encode(#[source] serde_json::Error),

    /// The frame is not valid JSON at all.
    #[error("decode failed: {0}")]
    Decode(#[source] serde_json::Error),

    /// The frame is valid JSON but not an array of packets.
    #[error("frame is not a JSON array (found {0})")]
    NotAnArray(&'static str),

    /// An array element is not an object carrying a string `cmd`.
    #[error("packet #{index} has no string `cmd` discriminator")]
    MissingCommand { index: usize },

    /// A known packet type is missing required fields or has
    /// fields of the wrong type.
    #[error("malformed {cmd} packet: {source}")]
    MalformedPacket {
        cmd: String,
        #[source]
        source: serde_json::Error,
    },
}
