pub mod masking;
pub mod models;
