//! Core scheduling types: identifiers, frequencies, `at` specs, schedule
//! specs with their run time generator, and job handlers.

pub mod at;
pub mod frequency;
pub mod job;
pub mod local_time;
pub mod schedule;
pub mod types;
