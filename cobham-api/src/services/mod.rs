//! Business logic shared by several routes
//!
//! Handlers for plain catalog CRUD talk to `db` directly; flows that span
//! several tables, external providers or caches live here.

pub mod payments;
pub mod profiles;
pub mod subscriptions;
