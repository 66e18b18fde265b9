pub mod analyzer;
pub mod breaks;
pub mod models;
