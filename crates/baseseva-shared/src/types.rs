use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Declares a string-backed enum with `as_str`, `Display` and `FromStr`.
///
/// The wire form (serde) and the SQLite column form are the same string.
macro_rules! string_enum {
    (
        $(#[$meta:meta])*
        pub enum $name:ident { $($variant:ident => $text:literal),+ $(,)? }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        pub enum $name {
            $(
                #[serde(rename = $text)]
                $variant,
            )+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $text,)+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = UnknownVariant;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($text => Ok($name::$variant),)+
                    other => Err(UnknownVariant {
                        kind: stringify!($name),
                        value: other.to_string(),
                    }),
                }
            }
        }
    };
}

/// A string did not name any variant of the target enum.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown {kind}: {value:?}")]
pub struct UnknownVariant {
    pub kind: &'static str,
    pub value: String,
}

string_enum! {
    /// ABO/Rh blood group.
    pub enum BloodType {
        APositive => "A+",
        ANegative => "A-",
        BPositive => "B+",
        BNegative => "B-",
        AbPositive => "AB+",
        AbNegative => "AB-",
        OPositive => "O+",
        ONegative => "O-",
    }
}

string_enum! {
    pub enum Urgency {
        Critical => "critical",
        Urgent => "urgent",
        Normal => "normal",
    }
}

string_enum! {
    /// Lifecycle of a blood request. Everything but `Active` is terminal.
    pub enum RequestStatus {
        Active => "active",
        Fulfilled => "fulfilled",
        Expired => "expired",
        Cancelled => "cancelled",
    }
}

string_enum! {
    pub enum BankStatus {
        Open => "open",
        ClosingSoon => "closing_soon",
        Closed => "closed",
    }
}

string_enum! {
    pub enum InventoryLevel {
        High => "high",
        Medium => "medium",
        Low => "low",
        Critical => "critical",
    }
}

string_enum! {
    pub enum NotificationKind {
        BloodRequest => "blood_request",
        DonationVerified => "donation_verified",
        NftMinted => "nft_minted",
        EmergencyAlert => "emergency_alert",
        System => "system",
    }
}

string_enum! {
    pub enum NetworkStatus {
        Online => "online",
        Offline => "offline",
        Slow => "slow",
    }
}

string_enum! {
    pub enum LocationPermission {
        Granted => "granted",
        Denied => "denied",
        Prompt => "prompt",
    }
}

string_enum! {
    pub enum NotificationPermission {
        Granted => "granted",
        Denied => "denied",
        Default => "default",
    }
}

impl RequestStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, RequestStatus::Active)
    }
}

/// A latitude/longitude pair in decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub lat: f64,
    pub lng: f64,
}

impl Coordinates {
    pub fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }
}
