// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2026 Oxide Computer Company

//! A small OpenFlow rule engine.
//!
//! This crate provides the vocabulary used to describe flow rules
//! before they are handed to a switch (fields, predicates, actions and
//! rules), the interfaces to the switch control channel and to the
//! table-number registry, and a software model of a flow table that
//! executes rules the way the switch fast path would.

#![cfg_attr(not(feature = "std"), no_std)]
#![deny(unreachable_patterns)]
#![deny(unused_must_use)]

#[macro_use]
extern crate alloc;

pub mod api;
pub mod engine;
#[cfg(any(feature = "std", test))]
pub mod print;
pub mod provider;
