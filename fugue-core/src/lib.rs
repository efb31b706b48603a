// Fugue
// Copyright (c) 2024 The Project Fugue Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Project Fugue core. Shared structs, traits, and units used by the frame pumps, codec engines,
//! and container engines.

pub mod codecs;
pub mod common;
pub mod errors;
pub mod formats;
pub mod frame;
pub mod io;
pub mod packet;
pub mod transform;
pub mod units;
