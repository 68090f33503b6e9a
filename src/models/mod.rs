pub mod assignment;
pub mod course;
pub mod file;
pub mod user;
