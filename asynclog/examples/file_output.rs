// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

//! Routes `tracing` events to a log file through the asynchronous buffer.
//!
//! ```text
//! cargo run -p asynclog --example file-output -- /tmp/app.log
//! ```

use std::{fs::File, io::BufWriter, sync::Arc, thread, time::Duration};

use asynclog::{
    AsyncLogBuilder, AsyncLogConfig, Decorations, Level, LogMessageBuffer, SharedOutput,
    StreamOutput, layer::AsyncLogLayer,
};
use tracing_subscriber::layer::SubscriberExt;

fn main() {
    let path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "async-log-example.log".into());
    let output: SharedOutput = Arc::new(StreamOutput::new(
        path.clone(),
        BufWriter::new(File::create(&path).expect("can create log file")),
    ));

    let config = AsyncLogConfig {
        flush_timeout_ms: 100,
        ..Default::default()
    };
    let (writer, handle) = AsyncLogBuilder::from_config(&config)
        .expect("valid config")
        .build()
        .expect("can start async log writer");

    let subscriber = tracing_subscriber::registry()
        .with(AsyncLogLayer::new(writer.clone(), SharedOutput::clone(&output)));
    tracing::subscriber::set_global_default(subscriber).expect("no other global subscriber");

    thread::scope(|scope| {
        for worker in 0..4 {
            scope.spawn(move || {
                for task in 0..10 {
                    tracing::info!(worker, task, "processed task");
                    thread::sleep(Duration::from_millis(5));
                }
            });
        }
    });

    // a multi-line message, kept together in the file
    let mut report = LogMessageBuffer::new(&["report"]);
    report.push(Level::Info, "summary:");
    for worker in 0..4 {
        report.write(Level::Info, format_args!("  worker {worker}: 10 tasks"));
    }
    writer.enqueue_all(&output, &report).expect("writer is running");
    writer
        .enqueue(&output, &Decorations::now(Level::Info, &["report"]), "done")
        .expect("writer is running");

    let stats = writer.stats();
    drop(writer);
    handle.shut_down();
    println!(
        "wrote to {path}: {} accepted, {} dropped",
        stats.accepted, stats.dropped
    );
}
