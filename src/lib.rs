#![doc = include_str!("../README.md")]

mod error;
pub mod ffi;
mod job;
mod pool;
mod queue;
mod semaphore;
mod worker;

pub use crate::{
    error::{InitError, PoolClosedError},
    pool::{Builder, Submitter, ThreadPool},
};
