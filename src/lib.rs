//! Session host for the image canvas.
//!
//! The [`canvas`] crate decides what should happen; this crate makes it
//! happen: it talks to the persistence backend, fetches images, schedules
//! position flushes and owns the project lifecycle.
//!
//! | Module | Role |
//! |--------|------|
//! | [`api`] | `CanvasApi` seam, REST client, offline stand-in |
//! | [`images`] | Image fetching, per-project cache, cancellation |
//! | [`session`] | `CanvasSession`: action dispatch, undo/redo I/O, lifecycle |
//! | [`flush`] | Position flushing and the autosave task |
//! | [`config`] | Environment-driven configuration |

pub mod api;
pub mod config;
pub mod flush;
pub mod images;
pub mod session;
