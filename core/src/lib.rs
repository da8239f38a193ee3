//! Credit Desk core: data access, scoring client, model explanations and
//! population comparisons for the credit analyst dashboard.

pub mod artifact;
pub mod chart;
pub mod command;
pub mod comparison;
pub mod config;
pub mod dashboard;
pub mod dataset;
pub mod derived;
pub mod error;
pub mod explanation;
pub mod layout;
pub mod model;
pub mod prediction;
pub mod remote;
pub mod rng;
pub mod tabular;
pub mod treeshap;
pub mod types;
