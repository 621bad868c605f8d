//! Yatube: a small social blogging server with posts, groups, comments and follow feeds.

pub mod application;
pub mod cache;
pub mod config;
pub mod domain;
pub mod infra;
pub mod presentation;
