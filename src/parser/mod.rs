//! Normalization helpers shared by source strategies
//!
//! - [`color`] - triage colour vocabulary
//! - [`wait_time`] - wait strings and the fallback weight table
//! - [`dates`] - per-source update-stamp grammars
//! - [`html`] - selector and cell helpers

pub mod color;
pub mod dates;
pub mod html;
pub mod wait_time;

pub use color::{normalize_color_label, resolve_color, ColorLabel};
pub use dates::DateGrammar;
pub use wait_time::{estimate_from_weights, parse_wait_time, weighted_wait};
