//! Status enums mapping to SMALLINT lookup tables.
//!
//! Each variant's discriminant matches the seed data order (1-based) in the
//! corresponding `*_statuses` table created by the migrations. The `name`
//! of a variant matches the table's `name` column and the JSON form.

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// Status ID type matching SMALLINT/SMALLSERIAL in the database.
pub type StatusId = i16;

macro_rules! define_status_enum {
    (
        $(#[$meta:meta])*
        $name:ident {
            $( $(#[$vmeta:meta])* $variant:ident = $val:literal => $label:literal ),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[repr(i16)]
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(rename_all = "snake_case")]
        pub enum $name {
            $( $(#[$vmeta])* $variant = $val ),+
        }

        impl $name {
            /// Return the database status ID.
            pub fn id(self) -> StatusId {
                self as StatusId
            }

            /// Lookup-table name, also used in API payloads.
            pub fn name(self) -> &'static str {
                match self {
                    $( Self::$variant => $label ),+
                }
            }

            /// Map a database status ID back to the enum.
            pub fn from_id(id: StatusId) -> Result<Self, CoreError> {
                match id {
                    $( $val => Ok(Self::$variant), )+
                    other => Err(CoreError::Internal(format!(
                        "Unknown {} id {other}",
                        stringify!($name)
                    ))),
                }
            }
        }

        impl From<$name> for StatusId {
            fn from(value: $name) -> Self {
                value as StatusId
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.name())
            }
        }
    };
}

define_status_enum! {
    /// Per-photo validation status.
    PhotoStatus {
        Pending = 1 => "pending",
        Validating = 2 => "validating",
        Validated = 3 => "validated",
        Failed = 4 => "failed",
        Bypassed = 5 => "bypassed",
    }
}

define_status_enum! {
    /// Purchase credit redemption status.
    CreditStatus {
        Unredeemed = 1 => "unredeemed",
        Redeemed = 2 => "redeemed",
    }
}

define_status_enum! {
    /// Full generation batch status.
    BatchStatus {
        Queued = 1 => "queued",
        Running = 2 => "running",
        Completed = 3 => "completed",
        Failed = 4 => "failed",
    }
}

define_status_enum! {
    /// Sample (preview) job status.
    SampleJobStatus {
        Queued = 1 => "queued",
        Running = 2 => "running",
        Completed = 3 => "completed",
        Failed = 4 => "failed",
        /// Replaced by a newer sample for a different photo set.
        Superseded = 5 => "superseded",
    }
}

impl PhotoStatus {
    /// The photo counts toward the "accepted" set used for generation.
    pub fn is_accepted(self) -> bool {
        matches!(self, Self::Validated | Self::Bypassed)
    }

    /// A verdict has not been reached yet.
    pub fn is_unresolved(self) -> bool {
        matches!(self, Self::Pending | Self::Validating)
    }
}

impl BatchStatus {
    /// Queued or running: the owner has a generation in flight.
    pub fn is_in_flight(self) -> bool {
        matches!(self, Self::Queued | Self::Running)
    }
}

impl SampleJobStatus {
    pub fn is_in_flight(self) -> bool {
        matches!(self, Self::Queued | Self::Running)
    }
}
