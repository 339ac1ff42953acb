pub mod a1;
pub mod config;
pub mod domain;
pub mod error;
pub mod google;
pub mod layout;
pub mod output;
pub mod report;
pub mod requests;
pub mod rules;
pub mod templates;
pub mod throttle;
