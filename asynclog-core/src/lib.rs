// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

#![doc = include_str!("../README.md")]
#![deny(missing_docs)]
#![cfg_attr(docsrs, feature(doc_cfg))]

pub use crate::config::AsyncLogConfig;
pub use crate::decorations::{Decorations, Level, Tags};
pub use crate::message_buffer::LogMessageBuffer;
#[cfg(feature = "tracing-subscriber-03")]
pub use crate::output::MakeWriterOutput;
pub use crate::output::{LogOutput, SharedOutput, StreamOutput};

pub mod config;
pub mod decorations;
pub mod message_buffer;
pub mod output;

/// In-memory [`LogOutput`]s for testing code that logs through `asynclog`.
///
/// This requires that the `test-util` feature be enabled.
#[cfg(any(test, feature = "test-util"))]
pub mod test_output;
