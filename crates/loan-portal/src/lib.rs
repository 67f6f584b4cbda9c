//! Core library for the borrower re-application portal.
//!
//! The portal sits between a browser UI and the institution's lending
//! backend: it keeps per-borrower application drafts, mirrors them to
//! durable storage, prefills from the most recent application on file,
//! derives validation progress, quotes loan options, and drives the
//! multipart submission pipeline against the backend.

pub mod config;
pub mod error;
pub mod telemetry;
pub mod workflows;
