//! Laning-phase checkpoint rows from match-v5 match and timeline payloads.
//!
//! The transform ([`rows::RowBuilder`]) is pure: one validated match plus its
//! timeline in, zero or more flat rows out. Fetching, persistence and reporting
//! sit around it in [`riot_api`], [`collect`], [`sink`] and [`report`].

pub mod collect;
pub mod config;
pub mod error;
pub mod events;
pub mod frames;
pub mod ingest;
pub mod lanes;
pub mod metrics;
pub mod model;
pub mod report;
pub mod riot_api;
pub mod rows;
pub mod sink;
