//! Interaction engine for the infinite image canvas.
//!
//! This crate is host-agnostic and synchronous. It owns everything that
//! happens between a raw pointer/keyboard event and a persistence request:
//! the pan/zoom viewport, selection and gestures, batch drag, placement of new
//! images, the undo history and viewport-driven image loading. The host (the
//! `genboard` session) forwards input events and carries out the resulting
//! [`engine::Action`]s against the backend.
//!
//! ## Module layout
//!
//! | Module | Role |
//! |--------|------|
//! | [`engine`] | Top-level [`engine::Engine`] composing everything below |
//! | [`entity`] | Entity model and the in-memory store |
//! | [`viewport`] | Pan/zoom transform and the live/committed controller |
//! | [`selection`] | Selection set and the tool/gesture state machine |
//! | [`drag`] | Delta-based batch drag |
//! | [`hit`] | AABB hit-testing |
//! | [`placement`] | Non-overlapping placement of new entities |
//! | [`pending`] | Revisioned queue of unflushed positions |
//! | [`history`] | Bounded undo/redo of deletes |
//! | [`loader`] | Progressive image loading by visibility |
//! | [`input`] | Input event payload types |
//! | [`geom`] | Points and rectangles |
//! | [`consts`] | Shared numeric constants (zoom limits, thresholds, grid) |

pub mod consts;
pub mod drag;
pub mod engine;
pub mod entity;
pub mod geom;
pub mod history;
pub mod hit;
pub mod input;
pub mod loader;
pub mod pending;
pub mod placement;
pub mod selection;
pub mod viewport;
