use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::IdParseError;

macro_rules! record_id {
    ($(#[$meta:meta])* $name:ident, $kind:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
        #[serde(transparent)]
        pub struct $name(pub Uuid);

        impl $name {
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                self.0.fmt(f)
            }
        }

        impl FromStr for $name {
            type Err = IdParseError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Uuid::parse_str(s)
                    .map(Self)
                    .map_err(|source| IdParseError::Invalid { kind: $kind, source })
            }
        }
    };
}

record_id!(
    /// Application user id. Distinct from the identity provider's subject id.
    UserId,
    "user"
);

record_id!(
    /// Direct or group conversation id.
    ConversationId,
    "conversation"
);

record_id!(MessageId, "message");

/// Key that identifies the unique direct conversation between two users:
/// both ids sorted lexicographically and joined with `:`.
pub fn direct_key(a: UserId, b: UserId) -> String {
    let (left, right) = (a.to_string(), b.to_string());
    if left <= right {
        format!("{left}:{right}")
    } else {
        format!("{right}:{left}")
    }
}
