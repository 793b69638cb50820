//! Command-line front end for the generation client.

pub mod args;
