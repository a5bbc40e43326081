//! # Kernel Memory Configuration
//!
//! This crate holds the sizes that govern the paged memory system: how large
//! a page is, how many physical frames the frame table manages, how many
//! virtual pages one address space may span, and how many pages the swap
//! device can hold. It is the single source for these numbers; the paging
//! crate and the tests read them from here.
//!
//! ## Overview
//!
//! ```text
//! MemoryConfig
//!   page_size        bytes per page and per frame (power of two)
//!   num_phys_pages   frames in physical memory
//!   max_virt_pages   upper bound for an address space
//!   num_swap_slots   page-sized slots on the swap device
//! ```
//!
//! [`MemoryConfig::DEFAULT`] describes the stock machine: 128-byte pages,
//! 20 frames, 1024 virtual pages and 1024 swap slots. Individual fields can
//! be overridden with the `with_*` builders or read from configuration text
//! with [`MemoryConfig::parse`].
//!
//! ## Configuration Text
//!
//! The text is a flat TOML table:
//!
//! ```text
//! # small machine that swaps a lot
//! PageSize     = 128
//! NumPhysPages = 4
//! ```
//!
//! Keys not present keep their default. Every configuration is validated
//! before it is handed out: a page size that is not a power of two, an
//! empty physical or virtual memory, or sizes whose byte counts overflow a
//! `usize` are rejected with a [`ConfigError`].
//!
//! ## Usage
//!
//! ```rust
//! use kernel_info::memory::MemoryConfig;
//!
//! let cfg = MemoryConfig::DEFAULT.with_num_phys_pages(4);
//! cfg.validate().expect("valid configuration");
//! assert_eq!(cfg.physical_bytes(), 4 * 128);
//! ```

#![cfg_attr(not(any(test, doctest)), no_std)]
#![deny(unsafe_code)]

extern crate alloc;

pub mod memory;

pub use memory::{ConfigError, MemoryConfig};
