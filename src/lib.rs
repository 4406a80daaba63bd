//! # img-catalog
//!
//! A small image catalog: upload images with a caption and tags, list them,
//! and fetch their bytes back over HTTP.
//!
//! Metadata lives in a single SQLite file (`images` and `image_tags`
//! tables); payloads live in a local directory as `{id}{ext}` files.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────┐   ┌─────────────┐   ┌──────────┐
//! │   HTTP   │──▶│   Ingest /   │──▶│  SQLite   │
//! │   CLI    │   │    Query     │   │  images   │
//! └──────────┘   └──────┬──────┘   └──────────┘
//!                       │
//!                       ▼
//!                ┌─────────────┐
//!                │ image dir   │
//!                │ {id}{ext}   │
//!                └─────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! imgcat init                                  # create database and image dir
//! imgcat upload cat.png --caption cat --tag pet
//! imgcat list
//! imgcat serve                                 # start HTTP server
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration and environment overrides |
//! | [`db`] | Database connection |
//! | [`migrate`] | Schema creation |
//! | [`mimetypes`] | MIME type / extension tables |
//! | [`models`] | Image record and derived fields |
//! | [`store`] | SQL access to images and tags |
//! | [`storage`] | Image payload directory |
//! | [`ingest`] | Upload validation and persistence |
//! | [`query`] | Listing and lookup |
//! | [`server`] | HTTP server |
//! | [`error`] | Error types |

pub mod config;
pub mod db;
pub mod error;
pub mod ingest;
pub mod migrate;
pub mod mimetypes;
pub mod models;
pub mod query;
pub mod server;
pub mod storage;
pub mod store;
