//! Domain logic for the photo-to-profile-set pipeline.
//!
//! Everything here is free of I/O: state machines, quota arithmetic,
//! curation, credit rules, and the traits the pipeline uses to talk to
//! object storage, the vision check, the generation service, and the
//! purchase stores. Adapters live in `aurapix-cloud`; persistence in
//! `aurapix-db`.

pub mod credit;
pub mod curation;
pub mod error;
pub mod generation;
pub mod photo;
pub mod purchase;
pub mod retry;
pub mod scenario;
pub mod signature;
pub mod status;
pub mod storage;
pub mod types;
pub mod vision;
