pub mod agent;
pub mod errors;
pub mod git;
pub mod models;
pub mod providers;
pub mod schema;
pub mod tools;
