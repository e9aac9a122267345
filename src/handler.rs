pub mod auth;
pub mod categories;
pub mod jobs;
pub mod labour;
pub mod payments;
pub mod ratings;
