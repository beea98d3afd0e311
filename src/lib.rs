pub mod clean_sheet;
pub mod config;
pub mod form;
pub mod match_weights;
pub mod ratings;
pub mod runner;
pub mod sectors;
pub mod standings;
pub mod status;
pub mod store;
