//! Transformations
//!
//! Named, pure value-to-value functions applied left to right after a
//! reference's path has been resolved (`{{name|trim|uppercase}}`).
//!
//! # Components
//!
//! - [`registry`]: [`TransformationRegistry`] and the [`Transformation`] type
//! - [`builtins`]: the built-in string, number, array, date, conversion and
//!   utility transformations

pub mod builtins;
pub mod registry;

pub use registry::{
    TransformCategory, TransformFn, TransformOutcome, Transformation, TransformationRegistry,
};
