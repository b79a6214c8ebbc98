// -- Lint policy ---------------------------------------------------------
// This is the single source of truth for crate-wide lints.

// Broad lint groups
#![deny(clippy::all)]
#![deny(clippy::pedantic)]
#![deny(clippy::nursery)]
// Documentation
#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![deny(rustdoc::private_intra_doc_links)]
#![deny(rustdoc::bare_urls)]
// No panicking in library code
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]
#![deny(clippy::todo)]
#![deny(clippy::unimplemented)]
// No debug/print artifacts
#![deny(clippy::dbg_macro)]
#![deny(clippy::print_stdout)]
#![deny(clippy::print_stderr)]
// Import hygiene
#![deny(clippy::wildcard_imports)]
// Function signature hygiene
#![deny(clippy::too_many_arguments)]
#![deny(clippy::fn_params_excessive_bools)]
// Clone / pass-by-value hygiene
#![deny(clippy::needless_pass_by_value)]
#![deny(clippy::implicit_clone)]
// String hygiene
#![deny(clippy::inefficient_to_string)]
#![deny(clippy::redundant_closure_for_method_calls)]
#![deny(clippy::manual_string_new)]
#![deny(clippy::str_to_string)]
// Cargo lints (warn, not deny since cargo lints can be noisy)
#![warn(clippy::cargo)]
// Unused / redundant code
#![deny(unused_results)]
#![deny(unused_qualifications)]
// Cast hygiene
#![deny(trivial_casts)]
#![deny(trivial_numeric_casts)]
// Tests assert with unwrap and panic on unexpected variants.
#![cfg_attr(test, allow(clippy::unwrap_used, clippy::panic))]

//! Pyramid bloom post-process built on wgpu.
//!
//! Extracts pixels above a brightness threshold, blurs them across a
//! shrinking/growing image pyramid, and composites the glow back onto the
//! original frame.
//!
//! # Key entry points
//!
//! - [`processor::BloomProcessor`] - runs one frame through the effect
//! - [`options::BloomOptions`] - iterations and threshold, with TOML presets
//! - [`allocator::BufferAllocator`] / [`kernel::PassKernel`] - the seams a
//!   host implements or takes from [`gpu`]
//!
//! # Architecture
//!
//! `process` validates the options, prefilters the source into pyramid
//! level 0, downsamples until the iteration cap or a 2-pixel floor is hit,
//! upsamples back into level 0, and composites onto the destination. Every
//! transient buffer is held by a scope guard that returns it to the
//! allocator on all exit paths.

pub mod allocator;
pub mod error;
pub mod gpu;
pub mod image;
pub mod kernel;
pub mod options;
pub mod processor;
pub mod pyramid;

pub use allocator::BufferAllocator;
pub use error::BloomError;
pub use image::{Image, ImageDesc};
pub use kernel::{LazyProgram, PassInputs, PassKernel, PassKind, PassParams};
pub use options::{BloomOptions, BloomSettings};
pub use processor::{BloomProcessor, BloomReport};
pub use pyramid::{pyramid_depth, MAX_ITERATIONS};
