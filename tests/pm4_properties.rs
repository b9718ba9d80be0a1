// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 itsakeyfut
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

//! Property tests for PM4 walking and fence detection on arbitrary input

mod common;

use common::assertions::assert_fences;
use common::fixtures::fenced_command_buffer;
use orbisrx::core::amdgpu::pm4::{type3_header, PM4ItOpcode};
use orbisrx::core::amdgpu::{words_from_bytes, FenceDetector, PacketWalker};
use proptest::prelude::*;

proptest! {
    #[test]
    fn walker_stays_in_bounds(cmd in prop::collection::vec(any::<u32>(), 0..256)) {
        let mut walker = PacketWalker::new(&cmd);
        let mut covered = 0usize;
        let mut last = None;
        for packet in walker.by_ref() {
            prop_assert_eq!(packet.offset, covered);
            prop_assert!(packet.offset + packet.words.len() <= cmd.len());
            prop_assert!(!packet.words.is_empty());
            if let Some(prev) = last {
                prop_assert!(packet.offset > prev);
            }
            last = Some(packet.offset);
            covered += packet.words.len();
        }
        prop_assert_eq!(walker.position(), cmd.len());
        if !walker.is_truncated() {
            prop_assert_eq!(covered, cmd.len());
        }
    }

    #[test]
    fn detector_fences_are_consistent(cmd in prop::collection::vec(any::<u32>(), 0..256)) {
        let detector = FenceDetector::new(&cmd);
        for fence in detector.fences() {
            prop_assert!(fence.offset < cmd.len());
            prop_assert!(detector.is_fence(fence.offset));
            prop_assert_eq!(detector.fence_value(fence.address), Some(fence.value));
            prop_assert_eq!(detector.fence_at(fence.offset).map(|f| f.address), Some(fence.address));
        }
    }

    #[test]
    fn fences_survive_filler(count in 1usize..24) {
        let (cmd, expected) = fenced_command_buffer(count);
        let detector = FenceDetector::new(&cmd);
        prop_assert!(!detector.is_truncated());
        assert_fences(&detector, &expected);
    }

    #[test]
    fn oversized_packet_truncates(body in 4usize..64, available in 0usize..4) {
        let mut cmd = vec![type3_header(PM4ItOpcode::WriteData, body)];
        cmd.extend(std::iter::repeat(0).take(available));
        let mut walker = PacketWalker::new(&cmd);
        prop_assert!(walker.next().is_none());
        prop_assert!(walker.is_truncated());
        prop_assert!(FenceDetector::new(&cmd).is_empty());
    }

    #[test]
    fn byte_dumps_round_to_words(bytes in prop::collection::vec(any::<u8>(), 0..64)) {
        match words_from_bytes(&bytes) {
            Ok(words) => prop_assert_eq!(words.len() * 4, bytes.len()),
            Err(_) => prop_assert!(bytes.len() % 4 != 0),
        }
    }
}
