//! Record codec trait

use crate::error::Result;

/// Conversion between a record and its stored bytes
///
/// `decode(&encode(r))` must give back `r` exactly. Decoding never panics on
/// bad input; it fails with [`TallyError::Decode`](crate::TallyError::Decode).
pub trait Codec: Sized {
    fn encode(&self) -> Vec<u8>;

    fn decode(bytes: &[u8]) -> Result<Self>;
}
