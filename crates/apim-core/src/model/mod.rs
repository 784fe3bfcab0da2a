//! Management entities
//!
//! Each entity is a plain record with `Default`, so the row mapper can start
//! from an empty value and fill columns in. Child collections (labels,
//! groups, metadata, properties) live on the parent and are populated by the
//! repository, either through row collation or a follow-up query.

use crate::errors::ApimError;

/// Enum persisted as its canonical upper-case name
pub trait StoredEnum: Copy + std::str::FromStr<Err = ApimError> + 'static {
    /// Name of the type, used in conversion errors
    const TYPE_NAME: &'static str;

    fn as_str(&self) -> &'static str;
}

/// Declare an enum stored by name, with `as_str`, `Display`, `FromStr` and serde
macro_rules! stored_enum {
    (
        $(#[$meta:meta])*
        $name:ident {
            $( $(#[$vmeta:meta])* $variant:ident => $text:literal ),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord,
            serde::Serialize, serde::Deserialize,
        )]
        pub enum $name {
            $( $(#[$vmeta])* #[serde(rename = $text)] $variant ),+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];
        }

        impl $crate::model::StoredEnum for $name {
            const TYPE_NAME: &'static str = stringify!($name);

            fn as_str(&self) -> &'static str {
                match self {
                    $( $name::$variant => $text ),+
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str($crate::model::StoredEnum::as_str(self))
            }
        }

        impl std::str::FromStr for $name {
            type Err = $crate::errors::ApimError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $( $text => Ok($name::$variant), )+
                    other => Err($crate::errors::ApimError::InvalidEnumValue {
                        type_name: stringify!($name),
                        value: other.to_string(),
                    }),
                }
            }
        }
    };
}

pub mod api;
pub mod application;
pub mod event;
pub mod subscription;

pub use api::{Api, ApiLifecycleState, ApiType, DefinitionVersion, LifecycleState, Visibility};
pub use application::{ApiKeyMode, Application, ApplicationStatus, ApplicationType, Origin};
pub use event::{Event, EventProperty, EventType};
pub use subscription::{ConsumerStatus, Subscription, SubscriptionStatus, SubscriptionType};
