use snafu::Snafu;

use crate::array_type_hex;

#[derive(Debug, Snafu, Clone, Copy, PartialEq, Eq)]
pub enum HexIdParseError {
    InvalidLength,
    InvalidHex,
}

array_type_hex!(
    /// The 32-byte identifier of an [`crate::event::Event`].
    struct EventId, 32
);

array_type_hex!(
    /// The 32-byte public key of an event's author.
    struct AuthorKey, 32
);
