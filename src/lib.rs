// src/lib.rs

pub mod config;
pub mod constants;
pub mod database;
pub mod error;
pub mod format;
pub mod hasher;
pub mod history;
pub mod models;
pub mod parser;
pub mod repository;
pub mod scheduler;
pub mod stats;
pub mod store;
pub mod trainer;

pub use config::TrainerConfig;
pub use error::{Result, TrainerError, ValidationError};
pub use models::{
    Challenge, ChallengeDocument, ChallengeFilter, DueQuery, IngestResult, Progress, Rating,
    ReviewRecord, ReviewSubmission, Statistics,
};
pub use trainer::Trainer;
