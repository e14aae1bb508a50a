// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

//! Contains [`AsyncLogConfig`], the file-friendly configuration of the background log writer.

/// Default memory budget for buffered records: 2 MiB.
pub const DEFAULT_BUFFER_SIZE: usize = 2 * 1024 * 1024;

/// Default time the background writer sleeps before draining a buffer that hasn't reached its wake threshold.
pub const DEFAULT_FLUSH_TIMEOUT_MS: u64 = 500;

/// Default name of the background writer thread.
pub const DEFAULT_THREAD_NAME: &str = "async-log-writer";

/// Default text of the record reporting dropped messages. `{count}` is replaced by the number of dropped messages.
pub const DEFAULT_DROP_SUMMARY_TEMPLATE: &str = "{count} messages dropped due to async logging";

/// Configuration of the background log writer, typically loaded from a configuration file.
///
/// Every field has a default, so an empty document is a valid configuration.
///
/// ```
/// # use asynclog_core::AsyncLogConfig;
/// let config: AsyncLogConfig = serde_json::from_str(r#"{ "buffer_size": 65536, "flush_timeout_ms": 100 }"#).unwrap();
/// assert_eq!(config.buffer_size, 65536);
/// assert_eq!(config.thread_name, "async-log-writer");
/// ```
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default, deny_unknown_fields))]
pub struct AsyncLogConfig {
    /// Memory budget for buffered records, in bytes. The record capacity is derived from it.
    pub buffer_size: usize,
    /// Explicit record capacity, overriding the one derived from `buffer_size`.
    pub max_records: Option<usize>,
    /// How long the background writer sleeps before draining a buffer below its wake threshold.
    pub flush_timeout_ms: u64,
    /// Name of the background writer thread.
    pub thread_name: String,
    /// Text of the record reporting dropped messages. `{count}` is replaced by the number of dropped messages.
    pub drop_summary_template: String,
}

impl Default for AsyncLogConfig {
    fn default() -> Self {
        Self {
            buffer_size: DEFAULT_BUFFER_SIZE,
            max_records: None,
            flush_timeout_ms: DEFAULT_FLUSH_TIMEOUT_MS,
            thread_name: DEFAULT_THREAD_NAME.into(),
            drop_summary_template: DEFAULT_DROP_SUMMARY_TEMPLATE.into(),
        }
    }
}

#[cfg(all(test, feature = "serde"))]
mod tests {
    use super::*;

    #[test]
    fn empty_document_uses_defaults() {
        let config: AsyncLogConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config, AsyncLogConfig::default());
    }

    #[test]
    fn reads_all_fields() {
        let config: AsyncLogConfig = serde_json::from_str(
            r#"{
                "buffer_size": 1024,
                "max_records": 8,
                "flush_timeout_ms": 20,
                "thread_name": "gc-log",
                "drop_summary_template": "lost {count}"
            }"#,
        )
        .unwrap();
        assert_eq!(
            config,
            AsyncLogConfig {
                buffer_size: 1024,
                max_records: Some(8),
                flush_timeout_ms: 20,
                thread_name: "gc-log".into(),
                drop_summary_template: "lost {count}".into(),
            }
        );
    }

    #[test]
    fn rejects_unknown_fields() {
        let err = serde_json::from_str::<AsyncLogConfig>(r#"{ "buffer_sise": 1 }"#).unwrap_err();
        assert!(err.to_string().contains("buffer_sise"), "{err}");
    }
}
