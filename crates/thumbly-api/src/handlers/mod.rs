pub mod jobs;
pub mod thumbnails;
