//! Spy cat agency: cats, missions and targets behind a REST API.

pub mod api;
pub mod breeds;
pub mod config;
pub mod db;
pub mod lifecycle;
pub mod models;
