//! Data Transfer Objects
//!
//! Response shapes of the GitLab API v4 endpoints the fetch tool reads.
//! Only the fields the tools use are modelled; unknown fields are ignored.

pub mod job;
pub mod pipeline;
pub mod project;
