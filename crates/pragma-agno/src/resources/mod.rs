//! Agno resource types, one module per resource family

pub mod agent;
pub mod knowledge;
pub mod models;
pub mod prompt;
pub mod runner;
pub mod team;
pub mod tools;
pub mod vectordb;
