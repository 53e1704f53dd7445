#![doc = include_str!("../README.md")]
#![deny(rustdoc::broken_intra_doc_links, rust_2018_idioms)]
#![warn(
    missing_copy_implementations,
    missing_debug_implementations,
    clippy::explicit_iter_loop,
    clippy::future_not_send,
    clippy::use_self,
    clippy::clone_on_ref_ptr
)]

pub mod client;
pub mod collect;
pub mod config;
pub mod emit;
pub mod topic;

pub use client::{Client, ClusterAdmin, Connector};
pub use collect::{CollectReport, Collector, Error};
pub use config::Config;
