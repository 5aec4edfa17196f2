pub mod job;
pub mod profile;
pub mod resume;
pub mod template;
