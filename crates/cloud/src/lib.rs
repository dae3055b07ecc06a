//! Adapters for the external collaborators defined in `aurapix-core`:
//! S3 object storage, the HTTP vision and generation services, and the
//! purchase stores.

pub mod generation;
pub mod purchase;
pub mod s3;
pub mod vision;

pub(crate) mod http;
