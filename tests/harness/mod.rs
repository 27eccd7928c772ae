// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: Apache-2.0

//! Test harness for registration abuse simulation.
//!
//! Replays scripted request streams against the registration flow on a
//! manual clock, so quota windows are exercised without sleeping.

#![allow(dead_code)]

pub mod attacks;
pub mod generators;
pub mod metrics;
