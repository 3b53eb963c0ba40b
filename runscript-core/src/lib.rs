//! Runscript Core
//!
//! Core types shared by the run tool and the fetch tool.
//!
//! This crate contains:
//! - Domain types: the pipeline run, stage status snapshots, attempt counters
//!   and the run trace
//! - DTOs: GitLab API v4 response shapes
//! - Output extraction for the OUTPUT CONTENT section of a job trace

pub mod domain;
pub mod dto;
pub mod output;
