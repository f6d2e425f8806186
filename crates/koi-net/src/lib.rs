//! UDP transport and per-sender sequence gating (spec §4.3, §4.4).

mod sequence;
mod transport;

pub use sequence::SequenceFilter;
pub use transport::{Link, Transport, TransportError};

use koi_proto::Message;
use rand::RngCore;

/// Encrypts+frames an already-built [`Message`] for the wire.
pub fn encode_message(msg: &Message, password: &str, rng: &mut impl RngCore) -> anyhow::Result<Vec<u8>> {
    let payload = msg.encode()?;
    Ok(koi_frame::encode(&payload, password, rng)?)
}

/// Decrypts+unframes+decodes one datagram into a [`Message`].
pub fn decode_message(frame: &[u8], password: &str) -> anyhow::Result<Message> {
    let payload = koi_frame::decode(frame, password)?;
    Ok(Message::decode(&payload)?)
}
