use std::{
    borrow::Borrow,
    fmt::{Debug, Display},
};

use serde::{Deserialize, Serialize};

pub mod dice;
pub mod event;
pub mod net;
pub mod player;
pub mod room;
pub mod scorecard;

pub const MIN_PLAYERS: u8 = 2;
pub const MAX_PLAYERS: u8 = 4;

/// Number of distinct room codes. Room ids are displayed as six decimal digits.
pub const ROOM_ID_SPACE: u32 = 1_000_000;

// Setup Newtype pattern for IDs
macro_rules! decl_id {
    ($name:ident, $fmt:literal) => {
        #[derive(Copy, Clone, PartialEq, Eq, Deserialize, Serialize, Hash)]
        pub struct $name(pub u32);

        impl Debug for $name {
            #[inline]
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                <Self as Display>::fmt(self, f)
            }
        }
        impl Display for $name {
            #[inline]
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, $fmt, self.0)
            }
        }

        impl From<u32> for $name {
            #[inline]
            fn from(v: u32) -> Self {
                Self(v)
            }
        }
        impl From<$name> for u32 {
            #[inline]
            fn from(v: $name) -> Self {
                v.0
            }
        }

        impl Borrow<u32> for $name {
            #[inline]
            fn borrow(&self) -> &u32 {
                &self.0
            }
        }
        impl PartialEq<u32> for $name {
            #[inline]
            fn eq(&self, other: &u32) -> bool {
                self.0 == *other
            }
        }
    };
}

// Player ids are always displayed in hex, room ids as the code players type in.
decl_id!(PlayerId, "{:#X}");
decl_id!(RoomId, "{:06}");

#[cfg(test)]
mod test {
    use super::{PlayerId, RoomId};

    #[test]
    fn id_display() {
        assert_eq!(PlayerId(255).to_string(), "0xFF");
        assert_eq!(RoomId(42).to_string(), "000042");
        assert_eq!(RoomId(123456).to_string(), "123456");
    }

    #[test]
    fn id_compares_with_raw() {
        assert_eq!(PlayerId::from(7), 7);
        assert_eq!(u32::from(RoomId(9)), 9);
    }
}
