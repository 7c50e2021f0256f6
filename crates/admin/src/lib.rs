//! Meridian Admin library.
//!
//! This crate provides the back-office functionality as a library,
//! allowing it to be tested and reused.
//!
//! # Security
//!
//! The admin panel edits the catalog and order states directly. It listens on
//! localhost by default and only accepts accounts with the `admin` role.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod config;
pub mod error;
pub mod filters;
pub mod forms;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod state;
pub mod views;
