//! In-memory send history: a bounded ring of the most recent outcomes.

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Mutex;

use pulsecard_core::{SendHistory, SendRecord};

const MAX_RECORDS: usize = 1000;

/// Bounded in-process recorder. The durable store behind the admin
/// surface is external; this ring is what the running process can show.
#[derive(Default)]
pub struct MemoryHistory {
    records: Mutex<VecDeque<SendRecord>>,
}

impl MemoryHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Most recent records, oldest first.
    pub fn recent(&self) -> Vec<SendRecord> {
        self.records.lock().unwrap().iter().cloned().collect()
    }
}

#[async_trait]
impl SendHistory for MemoryHistory {
    async fn record(&self, record: SendRecord) {
        let mut records = self.records.lock().unwrap();
        if records.len() >= MAX_RECORDS {
            records.pop_front();
        }
        records.push_back(record);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn record(message: &str) -> SendRecord {
        SendRecord {
            timestamp: Utc::now(),
            status: "success".into(),
            message: message.into(),
            destination: "https://example.invalid/hook".into(),
            task_name: "t".into(),
            button_text: String::new(),
            button_url: String::new(),
        }
    }

    #[tokio::test]
    async fn keeps_only_the_most_recent() {
        let history = MemoryHistory::new();
        for i in 0..(MAX_RECORDS + 5) {
            history.record(record(&format!("r{i}"))).await;
        }
        let recent = history.recent();
        assert_eq!(recent.len(), MAX_RECORDS);
        assert_eq!(recent[0].message, "r5");
        assert_eq!(recent.last().unwrap().message, format!("r{}", MAX_RECORDS + 4));
    }
}
