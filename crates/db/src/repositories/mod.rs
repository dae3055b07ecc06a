//! Repository layer.
//!
//! Each repository is a zero-sized struct providing async methods. Reads
//! and single-statement writes take `&PgPool`; methods that take part in a
//! caller-owned transaction take `&mut PgConnection` (pass `&mut *tx`).

pub mod account_repo;
pub mod batch_repo;
pub mod credit_repo;
pub mod generated_image_repo;
pub mod photo_repo;
pub mod sample_job_repo;
pub mod upload_slot_repo;

pub use account_repo::AccountRepo;
pub use batch_repo::BatchRepo;
pub use credit_repo::CreditRepo;
pub use generated_image_repo::GeneratedImageRepo;
pub use photo_repo::PhotoRepo;
pub use sample_job_repo::SampleJobRepo;
pub use upload_slot_repo::UploadSlotRepo;
