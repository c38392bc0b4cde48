// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Coinllector - Coin Collection REST Service
//!
//! This crate provides the HTTP backend for tracking coins issued by
//! countries, with per-user collections.
//!
//! ## Modules
//!
//! - `api` - HTTP API handlers (Axum)
//! - `auth` - Tokens, sessions, permissions and the auth service
//! - `images` - Image upload validation and the image host client
//! - `mail` - Outbound email
//! - `storage` - Embedded redb persistence

pub mod api;
pub mod auth;
pub mod config;
pub mod error;
pub mod images;
pub mod logging;
pub mod mail;
pub mod models;
pub mod state;
pub mod storage;

#[cfg(test)]
pub(crate) mod test_support;
