//! EMGurus - Guru review and publication workflow
//!
//! Blog posts and exam questions move from author draft, through guru
//! review, to publication. This library provides the storage, services and
//! HTTP API for that workflow.

pub mod api;
pub mod config;
pub mod db;
pub mod models;
pub mod services;
