//! Error types shared by the infrastructure layer

pub mod types;
