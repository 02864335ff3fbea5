//! # stride-api
//!
//! Typed wrappers for the Stride backend endpoints: profiles, schedule
//! events, activities, and recommendations. Every call goes through a
//! [`stride_session::RequestDispatcher`], so credential injection and
//! 401 recovery come for free.

pub mod endpoints;
pub mod models;

pub use endpoints::*;
pub use models::*;
