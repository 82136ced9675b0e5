//! Message traffic accounting for the in-memory world.
//!
//! Every frame handed to the world is recorded once, by sender, receiver and
//! tag. The report groups traffic per rank (upload/download) and per tag so a
//! driver can see which exchange dominates.
//!
//! # Example
//!
//! ```ignore
//! let analyzer = TrafficAnalyzer::new();
//! analyzer.record(Pid(0), Pid(1), Tag(37), 1024);
//! let report = analyzer.report();
//! println!("{report}");
//! ```

use meso_types::{Pid, Tag};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Frame traffic analyzer shared by all endpoints of a world.
///
/// Totals are atomics so the hot path takes no lock for them.
#[derive(Debug, Default)]
pub struct TrafficAnalyzer {
    by_tag: RwLock<HashMap<Tag, TagTraffic>>,
    by_rank: RwLock<HashMap<Pid, RankTraffic>>,
    total_messages: AtomicU64,
    total_bytes: AtomicU64,
}

impl TrafficAnalyzer {
    /// Create an empty analyzer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one frame of `bytes` sent from `from` to `to` on `tag`.
    pub fn record(&self, from: Pid, to: Pid, tag: Tag, bytes: usize) {
        let bytes = bytes as u64;
        self.total_messages.fetch_add(1, Ordering::Relaxed);
        self.total_bytes.fetch_add(bytes, Ordering::Relaxed);

        self.by_tag
            .write()
            .entry(tag)
            .or_insert_with(|| TagTraffic::new(tag))
            .record(bytes);

        let mut by_rank = self.by_rank.write();
        by_rank
            .entry(from)
            .or_insert_with(|| RankTraffic::new(from))
            .record_sent(bytes);
        by_rank
            .entry(to)
            .or_insert_with(|| RankTraffic::new(to))
            .record_received(bytes);
    }

    /// Current (messages, bytes) totals.
    pub fn totals(&self) -> (u64, u64) {
        (
            self.total_messages.load(Ordering::Relaxed),
            self.total_bytes.load(Ordering::Relaxed),
        )
    }

    /// Snapshot the traffic recorded so far.
    pub fn report(&self) -> TrafficReport {
        let mut by_tag: Vec<TagTraffic> = self.by_tag.read().values().cloned().collect();
        by_tag.sort_by(|a, b| b.bytes.cmp(&a.bytes).then(a.tag.cmp(&b.tag)));

        let mut by_rank: Vec<RankTraffic> = self.by_rank.read().values().cloned().collect();
        by_rank.sort_by_key(|r| r.rank);

        let (total_messages, total_bytes) = self.totals();
        TrafficReport {
            total_messages,
            total_bytes,
            by_tag,
            by_rank,
        }
    }
}

/// Traffic on one tag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagTraffic {
    pub tag: Tag,
    pub count: u64,
    pub bytes: u64,
    pub min_size: u64,
    pub max_size: u64,
}

impl TagTraffic {
    fn new(tag: Tag) -> Self {
        Self {
            tag,
            count: 0,
            bytes: 0,
            min_size: 0,
            max_size: 0,
        }
    }

    fn record(&mut self, size: u64) {
        if self.count == 0 {
            self.min_size = size;
            self.max_size = size;
        } else {
            self.min_size = self.min_size.min(size);
            self.max_size = self.max_size.max(size);
        }
        self.count += 1;
        self.bytes += size;
    }

    /// Mean frame size.
    pub fn avg_size(&self) -> u64 {
        if self.count == 0 {
            0
        } else {
            self.bytes / self.count
        }
    }
}

/// Upload and download of one rank.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RankTraffic {
    pub rank: Pid,
    pub messages_sent: u64,
    pub messages_received: u64,
    pub bytes_sent: u64,
    pub bytes_received: u64,
}

impl RankTraffic {
    fn new(rank: Pid) -> Self {
        Self {
            rank,
            messages_sent: 0,
            messages_received: 0,
            bytes_sent: 0,
            bytes_received: 0,
        }
    }

    fn record_sent(&mut self, bytes: u64) {
        self.messages_sent += 1;
        self.bytes_sent += bytes;
    }

    fn record_received(&mut self, bytes: u64) {
        self.messages_received += 1;
        self.bytes_received += bytes;
    }
}

/// Snapshot of world traffic.
#[derive(Debug, Clone)]
pub struct TrafficReport {
    pub total_messages: u64,
    pub total_bytes: u64,
    /// Sorted by bytes, largest first.
    pub by_tag: Vec<TagTraffic>,
    /// Sorted by rank.
    pub by_rank: Vec<RankTraffic>,
}

impl TrafficReport {
    /// Total traffic on every tag accepted by `filter`.
    pub fn bytes_where(&self, filter: impl Fn(Tag) -> bool) -> u64 {
        self.by_tag
            .iter()
            .filter(|t| filter(t.tag))
            .map(|t| t.bytes)
            .sum()
    }
}

impl fmt::Display for TrafficReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "================== MESSAGE TRAFFIC ==================")?;
        writeln!(f, "Total Messages:  {}", self.total_messages)?;
        writeln!(f, "Total Volume:    {}", format_bytes(self.total_bytes))?;
        writeln!(f)?;
        writeln!(
            f,
            "{:<10} {:>10} {:>12} {:>10}",
            "Tag", "Count", "Bytes", "Avg Size"
        )?;
        writeln!(f, "{}", "-".repeat(45))?;
        for t in &self.by_tag {
            writeln!(
                f,
                "{:<10} {:>10} {:>12} {:>10}",
                t.tag.0,
                t.count,
                format_bytes(t.bytes),
                format_bytes(t.avg_size())
            )?;
        }
        writeln!(f)?;
        writeln!(
            f,
            "{:<6} {:>8} {:>12} {:>8} {:>12}",
            "Rank", "Sent", "Upload", "Recv", "Download"
        )?;
        writeln!(f, "{}", "-".repeat(50))?;
        for r in &self.by_rank {
            writeln!(
                f,
                "{:<6} {:>8} {:>12} {:>8} {:>12}",
                r.rank.to_string(),
                r.messages_sent,
                format_bytes(r.bytes_sent),
                r.messages_received,
                format_bytes(r.bytes_received)
            )?;
        }
        write!(f, "=====================================================")
    }
}

/// Format bytes into a human-readable string.
fn format_bytes(bytes: u64) -> String {
    const KB: u64 = 1_000;
    const MB: u64 = 1_000_000;
    const GB: u64 = 1_000_000_000;

    if bytes >= GB {
        format!("{:.2} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.2} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.2} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} B", bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tag_stats() {
        let mut stats = TagTraffic::new(Tag(1));
        stats.record(110);
        assert_eq!((stats.min_size, stats.max_size, stats.avg_size()), (110, 110, 110));
        stats.record(220);
        assert_eq!(stats.count, 2);
        assert_eq!((stats.min_size, stats.max_size, stats.avg_size()), (110, 220, 165));
    }

    #[test]
    fn test_report_orders_tags_by_volume() {
        let analyzer = TrafficAnalyzer::new();
        for _ in 0..10 {
            analyzer.record(Pid(0), Pid(1), Tag(40), 1000);
            analyzer.record(Pid(1), Pid(0), Tag(70), 100);
        }
        let report = analyzer.report();
        assert_eq!(report.total_messages, 20);
        assert_eq!(report.by_tag[0].tag, Tag(40));
        assert_eq!(report.by_rank[0].bytes_sent, 10_000);
        assert_eq!(report.by_rank[0].bytes_received, 1_000);
        assert_eq!(report.bytes_where(|t| t.0 >= 64), 1_000);
        assert!(report.to_string().contains("MESSAGE TRAFFIC"));
    }

    #[test]
    fn test_format_bytes() {
        assert_eq!(format_bytes(500), "500 B");
        assert_eq!(format_bytes(1500), "1.50 KB");
        assert_eq!(format_bytes(1_500_000), "1.50 MB");
        assert_eq!(format_bytes(1_500_000_000), "1.50 GB");
    }
}
