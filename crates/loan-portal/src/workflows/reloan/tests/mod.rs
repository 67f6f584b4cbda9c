mod common;

mod submission;
mod validation;
