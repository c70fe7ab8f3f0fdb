//! Command-line front end for payframe: inspect strategy decisions, classify
//! gateway signals and replay scripted sessions without a browser.

pub mod cli;
pub mod commands;
pub mod error;
pub mod logging;
pub mod output;
pub mod scripted;
