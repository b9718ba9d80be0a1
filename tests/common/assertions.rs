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

//! Custom assertions for fence and video-out testing

use std::time::Duration;

use orbisrx::core::amdgpu::FenceDetector;
use orbisrx::core::videoout::{Presenter, VideoOutDriver};

use super::fixtures::{poll_until, ExpectedFence};

/// Assert the detector holds exactly `expected`, in order
#[allow(dead_code)]
pub fn assert_fences(detector: &FenceDetector, expected: &[ExpectedFence]) {
    let actual = detector.fences();
    assert_eq!(
        actual.len(),
        expected.len(),
        "fence count mismatch: expected {}, got {}",
        expected.len(),
        actual.len()
    );
    for (fence, want) in actual.iter().zip(expected) {
        assert_eq!(
            (fence.offset, fence.address, fence.value),
            (want.offset, want.address, want.value),
            "fence at word {} mismatch",
            want.offset
        );
        assert!(
            detector.is_fence(want.offset),
            "word {} not reported as fence",
            want.offset
        );
    }
}

/// Assert the port completes at least `count` flips within `timeout`
#[allow(dead_code)]
pub fn assert_flips_complete<P: Presenter>(
    driver: &VideoOutDriver<P>,
    handle: i32,
    count: u64,
    timeout: Duration,
) {
    let reached = poll_until(timeout, || {
        driver
            .flip_status(handle)
            .map(|status| status.count >= count)
            .unwrap_or(false)
    });
    assert!(
        reached,
        "expected {} flips within {:?}, got {:?}",
        count,
        timeout,
        driver.flip_status(handle).map(|s| s.count)
    );
}
