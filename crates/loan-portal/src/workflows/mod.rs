//! Workflow modules for the borrower portal.

pub mod loans;
pub mod reloan;
