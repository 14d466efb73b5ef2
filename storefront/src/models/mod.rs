// storefront/src/models/mod.rs

pub mod category;
pub mod job_account;
pub mod order;
pub mod profile;
pub mod purchase;
pub mod task;
pub mod ticket;
