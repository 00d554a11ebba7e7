//! City Guide - crowd-sourced tourist attraction listings
//!
//! Members submit attractions, staff approve or reject them, and visitors
//! browse, search, map and review the approved listings over a JSON API.

pub mod api;
pub mod config;
pub mod db;
pub mod models;
pub mod services;
