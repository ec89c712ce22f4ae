// Copyright 2025 eraflo
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! # Penumbra Infra
//!
//! Concrete implementations of the device contracts declared in `penumbra-core`.
//!
//! The only backend shipped here is [`HeadlessDevice`], an in-process device that
//! validates every request the way a real driver would, tracks object lifetimes
//! and records submitted passes for inspection.

#![warn(missing_docs)]

#[cfg(feature = "graphics")]
pub mod graphics;

#[cfg(feature = "graphics")]
pub use graphics::headless::*;
