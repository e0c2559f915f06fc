pub mod calculations;
pub mod data_processors;
pub mod error;
pub mod formatting;
pub mod keywords;
pub mod models;
pub mod settings;
pub mod thresholds;
pub mod time_utils;
