// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

use std::{
    fs,
    io::BufWriter,
    sync::Arc,
    thread,
};

use asynclog::{AsyncLogBuilder, Decorations, Level, SharedOutput, StreamOutput};

#[test]
fn lines_reach_the_file_in_order() {
    let file = tempfile::NamedTempFile::new().unwrap();
    let output: SharedOutput = Arc::new(StreamOutput::new(
        "file",
        BufWriter::new(file.reopen().unwrap()),
    ));
    let (writer, handle) = AsyncLogBuilder::new().capacity(10_000).build().unwrap();

    thread::scope(|scope| {
        for t in 0..4 {
            let writer = writer.clone();
            let output = SharedOutput::clone(&output);
            scope.spawn(move || {
                for i in 0..250 {
                    let decorations = Decorations::now(Level::Info, &["gc", "heap"]);
                    writer
                        .enqueue(&output, &decorations, &format!("thread {t} line {i}"))
                        .unwrap();
                }
            });
        }
    });
    handle.shut_down();

    let contents = fs::read_to_string(file.path()).unwrap();
    let lines: Vec<&str> = contents.lines().collect();
    assert_eq!(lines.len(), 1_000);
    for line in &lines {
        assert!(line.starts_with('['), "{line}");
        assert!(line.contains("][info][gc,heap] thread "), "{line}");
    }
    for t in 0..4 {
        let marker = format!("] thread {t} line ");
        let own: Vec<usize> = lines
            .iter()
            .filter_map(|line| line.split_once(&marker))
            .map(|(_, i)| i.parse().unwrap())
            .collect();
        assert_eq!(own, (0..250).collect::<Vec<_>>());
    }
}

#[test]
fn drop_summary_reaches_the_file() {
    let file = tempfile::NamedTempFile::new().unwrap();
    let output: SharedOutput = Arc::new(StreamOutput::new("file", file.reopen().unwrap()));
    let (writer, handle) = AsyncLogBuilder::new().capacity(1).build().unwrap();

    // without a stalled background thread some of these may or may not be dropped
    for i in 0..1_000 {
        writer
            .enqueue(&output, &Decorations::now(Level::Info, &[]), &i.to_string())
            .unwrap();
    }
    handle.shut_down();

    let stats = writer.stats();
    let contents = fs::read_to_string(file.path()).unwrap();
    let summaries: u64 = contents
        .lines()
        .filter_map(|line| line.split_once("[warning] "))
        .map(|(_, message)| {
            message
                .strip_suffix(" messages dropped due to async logging")
                .unwrap()
                .parse::<u64>()
                .unwrap()
        })
        .sum();
    assert_eq!(summaries, stats.dropped);
    assert_eq!(contents.lines().count() as u64, stats.written + stats.drop_reports);
    assert_eq!(stats.accepted + stats.dropped, 1_000);
}
