//! Domain model structs and DTOs.
//!
//! Each submodule contains:
//! - A `FromRow` + `Serialize` entity struct matching the database row
//! - A create DTO for inserts

pub mod account;
pub mod batch;
pub mod credit;
pub mod generated_image;
pub mod photo;
pub mod sample;
pub mod upload_slot;
