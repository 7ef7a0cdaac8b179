use chrono::{DateTime, Utc};

/// Counters for a crawl run.
#[derive(Debug, Clone)]
pub struct RunStats {
    pub started_at: DateTime<Utc>,
    pub batches: u32,
    pub pages_scanned: u32,
    pub pages_failed: u32,
    pub cards_found: u32,
    pub records_processed: u32,
    pub records_skipped: u32,
    pub records_qualified: u32,
    pub enrichments_attempted: u32,
    pub enrichments_failed: u32,
    pub activity_probes: u32,
    pub manual_logins: u32,
    /// Durable totals across all runs, filled in at the end.
    pub total_processed: usize,
    pub total_qualified: usize,
}

impl Default for RunStats {
    fn default() -> Self {
        Self {
            started_at: Utc::now(),
            batches: 0,
            pages_scanned: 0,
            pages_failed: 0,
            cards_found: 0,
            records_processed: 0,
            records_skipped: 0,
            records_qualified: 0,
            enrichments_attempted: 0,
            enrichments_failed: 0,
            activity_probes: 0,
            manual_logins: 0,
            total_processed: 0,
            total_qualified: 0,
        }
    }
}

impl std::fmt::Display for RunStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let elapsed = Utc::now().signed_duration_since(self.started_at);
        writeln!(f, "\n=== Crawl Run Complete ===")?;
        writeln!(f, "Elapsed:            {}s", elapsed.num_seconds())?;
        writeln!(f, "Batches:            {}", self.batches)?;
        writeln!(f, "Pages scanned:      {}", self.pages_scanned)?;
        writeln!(f, "Pages failed:       {}", self.pages_failed)?;
        writeln!(f, "Cards found:        {}", self.cards_found)?;
        writeln!(f, "Records processed:  {}", self.records_processed)?;
        writeln!(f, "Records skipped:    {}", self.records_skipped)?;
        writeln!(f, "Records qualified:  {}", self.records_qualified)?;
        writeln!(
            f,
            "Enrichments:        {} ({} failed)",
            self.enrichments_attempted, self.enrichments_failed
        )?;
        if self.activity_probes > 0 {
            writeln!(f, "Activity probes:    {}", self.activity_probes)?;
        }
        if self.manual_logins > 0 {
            writeln!(f, "Manual logins:      {}", self.manual_logins)?;
        }
        writeln!(f, "\nTotals on disk:")?;
        writeln!(f, "  Processed: {}", self.total_processed)?;
        write!(f, "  Qualified: {}", self.total_qualified)
    }
}
