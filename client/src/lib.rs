//! # Judging Client Library
//!
//! Client side of the judging-session protocol. It registers the device
//! with the server, requests a session, and keeps a local reactive
//! projection of server-driven state that the UI layer observes.
//!
//! ## Architecture Overview
//!
//! ### Reactive Store
//! [`store::ClientStore`] holds the client's view of server state. It is
//! mutated only by applying validated server-pushed calls, and every
//! update produces exactly one synchronous notification pass to
//! subscribers. The store is an explicitly constructed object passed to
//! whatever owns the channel; there is no module-level singleton.
//!
//! ### Server-Push Dispatch
//! Incoming calls are routed through a `Dispatcher` whose handlers were
//! wrapped at registration time with decode-and-validate decorators. A
//! call either fully applies (handler body completes, one store update,
//! one notification) or is rejected with a typed reason; partial effects
//! are never observable.
//!
//! ### Liveness
//! The run loop sends periodic heartbeats so the server's presence tracker
//! keeps the device online, and an orderly `disconnect` on the way out.
//!
//! ## Module Organization
//!
//! - [`store`] — the reactive client-state store and subscriptions
//! - [`network`] — UDP transport, push handlers, and the run loop

pub mod network;
pub mod store;
