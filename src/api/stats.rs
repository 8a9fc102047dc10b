//! Arena statistics.

use crate::util::size::format_bytes;

/// Snapshot of an arena's page accounting.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ArenaStats {
    /// Bytes per page.
    pub page_size: usize,

    /// Pages currently alive.
    pub total_pages: usize,

    /// Pages in the free pool.
    pub unused_pages: usize,

    /// Pages handing out suballocations.
    pub used_pages: usize,

    /// Pages waiting for their fence.
    pub pending_pages: usize,

    /// Highest `total_pages` ever reached.
    pub peak_pages: usize,

    /// Bytes consumed in `used` pages (cursor sum, including padding).
    pub bytes_in_use: usize,

    /// Suballocations handed out over the arena's lifetime.
    pub allocation_count: u64,

    /// Pages created by the backend.
    pub pages_created: u64,

    /// Pages given back to the backend.
    pub pages_destroyed: u64,

    /// Calls to commit that moved at least one page.
    pub commits: u64,

    /// Pages moved from pending back to unused.
    pub retired_pages: u64,
}

impl ArenaStats {
    /// Bytes of page memory held from the backend.
    pub fn bytes_reserved(&self) -> usize {
        self.total_pages * self.page_size
    }

    /// Fraction of `used` page memory actually consumed.
    pub fn used_utilization(&self) -> f64 {
        if self.used_pages == 0 {
            return 0.0;
        }
        self.bytes_in_use as f64 / (self.used_pages * self.page_size) as f64
    }
}

impl std::fmt::Display for ArenaStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Arena Statistics:")?;
        writeln!(f, "  Page size:       {}", format_bytes(self.page_size))?;
        writeln!(f, "  Reserved:        {}", format_bytes(self.bytes_reserved()))?;
        writeln!(f, "  Pages:           {} (peak {})", self.total_pages, self.peak_pages)?;
        writeln!(f, "    unused:        {}", self.unused_pages)?;
        writeln!(f, "    used:          {}", self.used_pages)?;
        writeln!(f, "    pending:       {}", self.pending_pages)?;
        writeln!(f, "  In use:          {}", format_bytes(self.bytes_in_use))?;
        writeln!(f, "  Suballocations:  {}", self.allocation_count)?;
        writeln!(f, "  Commits:         {}", self.commits)?;
        writeln!(f, "  Retired pages:   {}", self.retired_pages)?;
        Ok(())
    }
}
