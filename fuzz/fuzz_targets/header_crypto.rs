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
use n2n_edge_core::crypto::HeaderCipher;

fuzz_target!(|data: &[u8]| {
    // Arbitrary bytes fed as a candidate header-encrypted packet must never
    // panic, regardless of length or content; a packet this cipher itself
    // encrypted must always decrypt back to the original prefix.
    let cipher = HeaderCipher::new(b"acme");
    let _ = cipher.try_decrypt_prefix(data);

    if data.len() >= 16 {
        let mut packet = data[..16].to_vec();
        packet[0] = n2n_edge_core::protocol::PROTOCOL_VERSION;
        let original = packet.clone();
        cipher.encrypt_prefix(&mut packet);
        let recovered = cipher.try_decrypt_prefix(&packet).expect("own ciphertext must decrypt");
        assert_eq!(&recovered[..], &original[..]);
    }
});
