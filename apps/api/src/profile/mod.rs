// User profile: one per user, created explicitly, sparsely patched.

pub mod handlers;
pub mod patch;
pub mod repository;
