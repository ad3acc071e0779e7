//! Frame codec: packets to and from the text of one WebSocket message.
//!
//! Every frame is a JSON array of packets. Outbound, each send carries a
//! one-element array. Inbound, elements are decoded one at a time so a
//! single malformed packet does not cost the rest of the frame.

use serde_json::Value;

use crate::ProtocolError;
use crate::packets::{ClientPacket, SERVER_COMMANDS, ServerPacket, UnknownPacket};

/// Converts between packets and frame text.
pub trait Codec: Send + Sync + 'static {
    /// Encodes one packet as a complete frame.
    ///
    /// # Errors
    /// Returns [`ProtocolError::Encode`] if serialization fails.
    fn encode(&self, packet: &ClientPacket) -> Result<String, ProtocolError>;

    /// Decodes a frame into its packets, in order.
    ///
    /// The outer `Result` fails only when the frame as a whole is
    /// unusable (not JSON, or not an array). Each inner `Result` is one
    /// array element.
    fn decode(
        &self,
        frame: &str,
    ) -> Result<Vec<Result<ServerPacket, ProtocolError>>, ProtocolError>;
}

/// The JSON codec the Archipelago server speaks.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

impl Codec for JsonCodec {
    fn encode(&self, packet: &ClientPacket) -> Result<String, ProtocolError> {
        serde_json::to_string(&[packet]).map_err(ProtocolError::Encode)
    }

    fn decode(
        &self,
        frame: &str,
    ) -> Result<Vec<Result<ServerPacket, ProtocolError>>, ProtocolError> {
        let value: Value =
            serde_json::from_str(frame).map_err(ProtocolError::Decode)?;
        let Value::Array(elements) = value else {
            return Err(ProtocolError::NotAnArray(json_kind(&value)));
        };

        Ok(elements
            .into_iter()
            .enumerate()
            .map(|(index, element)| decode_packet(index, element))
            .collect())
    }
}

fn decode_packet(
    index: usize,
    element: Value,
) -> Result<ServerPacket, ProtocolError> {
    let cmd = match element.get("cmd") {
        Some(Value::String(cmd)) => cmd.clone(),
        _ => return Err(ProtocolError::MissingCommand { index }),
    };

    if !SERVER_COMMANDS.contains(&cmd.as_str()) {
        return Ok(ServerPacket::Unknown(UnknownPacket { cmd, body: element }));
    }

    serde_json::from_value(element)
        .map_err(|source| ProtocolError::MalformedPacket { cmd, source })
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
