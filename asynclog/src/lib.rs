// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

#![doc = include_str!("../README.md")]
#![cfg_attr(docsrs, feature(doc_cfg))]

pub use asynclog_core::config::AsyncLogConfig;
pub use asynclog_core::decorations::{Decorations, Level, Tags};
pub use asynclog_core::message_buffer::LogMessageBuffer;
#[cfg(feature = "tracing-subscriber-03")]
pub use asynclog_core::output::MakeWriterOutput;
pub use asynclog_core::output::{LogOutput, SharedOutput, StreamOutput};

pub use crate::buffer::AsyncLogBuffer;
pub use crate::message::{AsyncLogMessage, record_footprint};
pub use crate::stats::{DropCounters, DropSnapshot, WriterStats};
pub use crate::writer::{
    AsyncLogBuilder, AsyncLogJoinHandle, AsyncLogWriter, BuildError, WriterClosed, WriterState,
};

pub mod buffer;
pub mod global;
#[cfg(feature = "tracing-subscriber-03")]
pub mod layer;
pub mod message;
pub(crate) mod rate_limit;
pub mod stats;
#[cfg(any(test, feature = "test-util"))]
pub mod test_util;
mod writer;

#[doc(hidden)]
pub use asynclog_core as core;
