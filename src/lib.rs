pub mod agent;
pub mod config;
pub mod environment;
pub mod errors;
pub mod keys;
pub mod normalization;
pub mod recipe;
pub mod recipes;
pub mod routes;
pub mod search;
pub mod store;
