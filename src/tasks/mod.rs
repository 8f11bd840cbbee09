//! Background Tasks Module
//!
//! Tasks owned by each cache instance, started on construction and stopped on close.
//!
//! # Tasks
//! - Sweeper: Removes every expired entry at a fixed interval
//! - Lazy Cleaner: Removes keys the read path found expired

mod lazy_cleaner;
mod sweeper;

pub(crate) use lazy_cleaner::spawn_lazy_cleaner;
pub(crate) use sweeper::spawn_sweeper;
