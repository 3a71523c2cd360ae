// Copyright 2025 Stoolap Contributors
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

//! Common utilities shared by the tuple model and the operators
//!
//! - [`one_or_many`] - singleton-then-promote container
//! - [`duration`] - ISO-8601 duration parsing for cache TTLs

pub mod duration;
pub mod one_or_many;

pub use duration::parse_iso8601_duration;
pub use one_or_many::OneOrMany;
