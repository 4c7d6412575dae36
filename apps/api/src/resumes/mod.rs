// Resume lifecycle:
//   storage    : FileStorage port (local disk, S3)
//   repository : ResumeRepository port, Postgres implementation
//   ingest     : validate -> store bytes -> create row
//   service    : owner-scoped get / update / delete
//   handlers   : /api/resumes routes

pub mod handlers;
pub mod ingest;
pub mod repository;
pub mod service;
pub mod storage;
