// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Seams to the collaborators that live outside the persistence core.
//!
//! The network transport, the remote collection endpoint, and the wall clock
//! are injected through these traits so the core stays deterministic under test.

pub mod clock;
pub mod collection;
pub mod delivery;

pub use clock::{Clock, SystemClock};
pub use collection::{CollectionSource, RemoteCollection, RemoteQueryResult};
pub use delivery::OperationDelivery;
