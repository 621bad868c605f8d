//! Application services layer.

pub mod accounts;
pub mod error;
pub mod feed;
pub mod forms;
pub mod pagination;
pub mod password;
pub mod posts;
pub mod repos;
pub mod social;
