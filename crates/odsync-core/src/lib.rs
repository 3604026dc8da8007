//! odsync Core - Domain logic and port definitions
//!
//! This crate contains the hexagonal architecture core with:
//! - **Domain types** - `RemoteEntry`, `LocalEntry`, `RemoteId`, `RemotePath`, `Crc32`
//! - **Change detection** - `ChangeDetector`, the per-file sync decision policy
//! - **Port definitions** - Traits for adapters: `ICloudProvider`, `ILocalFileSystem`
//! - **Configuration** - YAML-backed `Config` with validation and a builder
//!
//! # Architecture
//!
//! The domain module contains pure logic with no I/O. Ports define the
//! trait interfaces that the Graph adapter and the sync engine implement
//! or consume.

pub mod config;
pub mod domain;
pub mod ports;
