//! # Judging Server Library
//!
//! Authoritative server side of the judging-session protocol. It owns the
//! canonical device and session records, validates every inbound call
//! against the shared schema layer, and pushes state updates to connected
//! judge devices.
//!
//! ## Core Responsibilities
//!
//! ### Device Presence
//! Tracks which judge devices are currently connected. Registration is
//! idempotent across reconnects, disconnects only flip the online flag,
//! and presence history is retained for the process lifetime.
//!
//! ### Session Registry
//! Issues sessions on behalf of online devices. Session ids are unique for
//! the registry's entire lifetime, creation timestamps never decrease, and
//! the owning-device link is write-once.
//!
//! ### Rubric Intake
//! Accepts validated rubric submissions and applies them as full-record
//! replacements keyed by rubric id.
//!
//! ## Architecture Design
//!
//! The server uses the same event-driven shape on both sides of the
//! channel: spawned receiver and sender tasks move datagrams through
//! unbounded channels, while a single-owner main loop applies every call
//! sequentially. All mutable registries live in one [`network::ServerState`]
//! owned by that loop, so the uniqueness and write-once invariants need no
//! locking to hold.
//!
//! Failed calls are answered with a `call_rejected` reply carrying the
//! typed reason; nothing a client sends can tear down the loop.
//!
//! ## Module Organization
//!
//! - [`presence`] — device presence tracker with timeout sweep
//! - [`registry`] — session registry
//! - [`rubrics`] — rubric record store
//! - [`network`] — UDP transport, dispatch wiring, and the main loop

pub mod network;
pub mod presence;
pub mod registry;
pub mod rubrics;
