// Copyright (c) 2026 Amunchain
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//     http://www.apache.org/licenses/LICENSE-2.0
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

#![forbid(unsafe_code)]

//! Symmetric transforms, replay protection and optional header encryption
//! (spec C2).

pub mod header;
pub mod kdf;
pub mod replay;
pub mod speck;
pub mod transform;

pub use header::HeaderCipher;
pub use replay::{encode_timestamp, ReplayWindow};
pub use transform::{keyed_transform, Transform, TransformError, TransformId};
