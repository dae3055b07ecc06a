pub mod generations;
pub mod photos;
pub mod profile_photos;
pub mod purchases;
pub mod samples;
