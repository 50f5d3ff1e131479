//! Fixtures shared by the unit test suites

use std::io::{Cursor, Write};
use std::sync::Mutex;

use cubesound_wav::{WavFormat, encode_wav};
use zip::write::SimpleFileOptions;

use crate::notify::{NoticeLevel, Notifier};

/// A short mono 16-bit clip whose first sample is `tag`
pub fn wav_bytes(tag: i16) -> Vec<u8> {
    encode_wav(
        WavFormat {
            channels: 1,
            sample_rate: 22050,
        },
        &[tag, 0, -tag, 0],
    )
}

/// Build an in-memory zip from `(name, contents)` pairs, in order
pub fn zip_bytes(entries: &[(&str, &[u8])]) -> Vec<u8> {
    let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
    for (name, contents) in entries {
        writer
            .start_file(*name, SimpleFileOptions::default())
            .unwrap();
        writer.write_all(contents).unwrap();
    }
    writer.finish().unwrap().into_inner()
}

/// Keeps every message in memory, for inspection
#[derive(Debug, Default)]
pub struct CollectingNotifier {
    messages: Mutex<Vec<(NoticeLevel, String)>>,
}

impl CollectingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drain the collected messages
    pub fn take(&self) -> Vec<(NoticeLevel, String)> {
        match self.messages.lock() {
            Ok(mut messages) => std::mem::take(&mut *messages),
            Err(poisoned) => std::mem::take(&mut *poisoned.into_inner()),
        }
    }

    /// Whether any collected message contains `needle`
    pub fn contains(&self, needle: &str) -> bool {
        match self.messages.lock() {
            Ok(messages) => messages.iter().any(|(_, m)| m.contains(needle)),
            Err(_) => false,
        }
    }
}

impl Notifier for CollectingNotifier {
    fn notify(&self, level: NoticeLevel, message: &str) {
        if let Ok(mut messages) = self.messages.lock() {
            messages.push((level, message.to_string()));
        }
    }
}
