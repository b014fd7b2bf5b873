//! # Nightwatch
//!
//! Scheduling and observing engine for a robotic astronomical observatory.
//!
//! The crate decides, night after night, which pending observation request
//! to point the telescope at next, given sky visibility, priority, and
//! per-request observing constraints, and drives the whole night from
//! afternoon calibrations through morning twilight flats.
//!
//! ## Architecture
//!
//! - [`models`]: observation requests, exposure plans, and time types
//! - [`astro`]: site ephemeris: sidereal time, horizontal coordinates,
//!   solar and lunar positions, twilight boundaries
//! - [`scheduler`]: observability predicate, target ranking and selection,
//!   the stateful night loop, and the pure night simulator
//! - [`db`]: request store abstraction via the repository pattern
//! - [`hardware`]: telescope/dome/camera collaborator contracts, network
//!   clients, and mocks
//!
//! The telescope, dome, cameras, and lamps are external daemons reached
//! over the network; this crate consumes them behind the traits in
//! [`hardware`] and treats every hardware failure as a value to fall back
//! from, never as a panic.

pub mod astro;
pub mod config;
pub mod db;
pub mod hardware;
pub mod manual;
pub mod models;
pub mod scheduler;
