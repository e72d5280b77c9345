// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Repository layer providing typed access to JSON storage.
//!
//! Each repository implements one of the storage seams declared by the
//! auth module, using [`JsonStorage`](super::JsonStorage) for all file
//! operations.

pub mod api_keys;
pub mod users;

pub use api_keys::ApiKeyRepository;
pub use users::UserRepository;
