pub mod backtester;
pub mod benchmark;
pub mod commands;
pub mod config;
pub mod data;
pub mod error;
pub mod indicators;
pub mod models;
pub mod params;
pub mod performance;
pub mod risk;
pub mod strategy;
