// Library exports for moose
// This allows the test suite to import modules

pub mod app;
pub mod cli;
pub mod config;
pub mod experiment;
pub mod geometry;
pub mod gesture;
pub mod net;
pub mod touch;
