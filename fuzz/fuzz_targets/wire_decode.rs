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

#![no_main]
#![forbid(unsafe_code)]

use libfuzzer_sys::fuzz_target;
use n2n_edge_core::protocol::Message;

fuzz_target!(|data: &[u8]| {
    // Every byte string, truncated or malformed, must decode to an error
    // rather than panic; a matching encode of any successfully decoded
    // message must round-trip back to an equal value.
    if let Ok(msg) = Message::decode(data) {
        let mut buf = vec![0u8; data.len().max(256) * 2];
        if let Ok(n) = msg.encode(&mut buf) {
            let reencoded = Message::decode(&buf[..n]);
            assert_eq!(reencoded.as_ref(), Ok(&msg));
        }
    }
});
