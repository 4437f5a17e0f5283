//! Output generation for the dashboard export and the front page listing.
//!
//! # Submodules
//!
//! - [`json`]: Writes the analytics [`Dashboard`](crate::analytics::Dashboard) to dated JSON files
//! - [`text`]: Renders stored articles as a plain-text front page
//!
//! # Output Structure
//!
//! ```text
//! output_dir/
//! ├── 2026-10-17/
//! │   └── analytics.json
//! └── 2026-10-18/
//!     └── analytics.json
//! ```

pub mod json;
pub mod text;
