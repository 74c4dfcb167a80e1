// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Concrete [`crate::Source`] implementations.
//!
//! Each variant is independent; none of them shares state with another or
//! with the collector. Failures are reported in-band as `"error: ..."` values.

pub mod command;
pub mod cpu;
#[cfg(unix)]
pub mod disk;
pub mod generic;
pub mod memory;

pub use command::CommandSource;
pub use cpu::CpuSource;
#[cfg(unix)]
pub use disk::DiskSource;
pub use generic::GenericSource;
pub use memory::MemorySource;
