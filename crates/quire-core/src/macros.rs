/// Defines a fixed-size byte-array newtype with hex `Display`/`FromStr`,
/// mirroring the teacher's `array_type_define_public!` but rendering as
/// lowercase hex (the wire format events and tags actually use) instead of
/// base32/bech32.
#[macro_export]
macro_rules! array_type_hex {
    ($(#[$outer:meta])* struct $t:tt, $n:literal) => {
        $(#[$outer])*
        #[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
        pub struct $t(pub [u8; $n]);

        impl $t {
            pub const ZERO: Self = Self([0u8; $n]);

            pub fn as_slice(&self) -> &[u8] {
                &self.0
            }

            pub fn from_bytes(bytes: [u8; $n]) -> Self {
                Self(bytes)
            }

            pub fn to_bytes(self) -> [u8; $n] {
                self.0
            }
        }

        impl std::fmt::Display for $t {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                for byte in &self.0 {
                    write!(f, "{byte:02x}")?;
                }
                Ok(())
            }
        }

        impl std::fmt::Debug for $t {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}({})", stringify!($t), self)
            }
        }

        impl std::str::FromStr for $t {
            type Err = $crate::id::HexIdParseError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                if s.len() != $n * 2 {
                    return Err($crate::id::HexIdParseError::InvalidLength);
                }
                let mut bytes = [0u8; $n];
                for (i, byte) in bytes.iter_mut().enumerate() {
                    *byte = u8::from_str_radix(&s[i * 2..i * 2 + 2], 16)
                        .map_err(|_| $crate::id::HexIdParseError::InvalidHex)?;
                }
                Ok(Self(bytes))
            }
        }

        impl serde::Serialize for $t {
            fn serialize<S>(&self, s: S) -> Result<S::Ok, S::Error>
            where
                S: serde::Serializer,
            {
                s.serialize_str(&self.to_string())
            }
        }

        impl<'de> serde::Deserialize<'de> for $t {
            fn deserialize<D>(d: D) -> Result<Self, D::Error>
            where
                D: serde::Deserializer<'de>,
            {
                let s = <String>::deserialize(d)?;
                <Self as std::str::FromStr>::from_str(&s).map_err(serde::de::Error::custom)
            }
        }
    };
}
