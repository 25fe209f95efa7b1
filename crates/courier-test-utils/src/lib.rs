// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test utilities for Courier integration tests.
//!
//! Provides deterministic stand-ins for the external collaborators and a
//! temp-file database harness, so tests run without a network or wall clock.
//!
//! # Components
//!
//! - [`ManualClock`] - Clock that only moves when told to
//! - [`MockCollectionSource`] - Scripted remote collection responses
//! - [`MockDelivery`] - Records delivered operations, fails on demand
//! - [`TestHarness`] - Temp SQLite database plus message builders

pub mod clock;
pub mod harness;
pub mod mock_delivery;
pub mod mock_source;

pub use clock::ManualClock;
pub use harness::{MessageBuilder, TestHarness};
pub use mock_delivery::MockDelivery;
pub use mock_source::MockCollectionSource;
