//! Heap status report
//!
//! Text rendered by the kernel's status command. Written to any
//! [`core::fmt::Write`] so the same report can go to the serial port, the
//! console or a test buffer.

use core::fmt::{self, Write};

use kos_heap::HeapStats;

/// Write a multi-line heap status report.
pub fn write_heap_status<W: Write>(out: &mut W, stats: &HeapStats) -> fmt::Result {
    writeln!(out, "Heap: {} total", Bytes(stats.region_size))?;
    writeln!(out, "  used:     {}", Bytes(stats.used_bytes))?;
    writeln!(
        out,
        "  free:     {} in {} chunks (largest {})",
        Bytes(stats.free_bytes),
        stats.free_chunks,
        Bytes(stats.largest_free)
    )?;
    writeln!(
        out,
        "  meta:     {}",
        Bytes(stats.meta_bytes + stats.sentinel_bytes)
    )?;
    writeln!(
        out,
        "  allocs:   {} ({} live, {} failed)",
        stats.allocations,
        stats.live_allocations(),
        stats.failed_allocations
    )?;
    if !stats.is_balanced() {
        writeln!(out, "  WARNING: byte totals do not add up")?;
    }
    Ok(())
}

/// Byte count, shown in KiB/MiB once large enough
struct Bytes(usize);

impl fmt::Display for Bytes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        const KIB: usize = 1024;
        const MIB: usize = 1024 * KIB;
        match self.0 {
            n if n >= MIB && n % MIB == 0 => write!(f, "{} MiB", n / MIB),
            n if n >= KIB && n % KIB == 0 => write!(f, "{} KiB", n / KIB),
            n => write!(f, "{} B", n),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::string::{String, ToString};

    fn sample() -> HeapStats {
        HeapStats {
            region_size: 64 * 1024,
            free_bytes: 65_040,
            used_bytes: 336,
            meta_bytes: 96,
            sentinel_bytes: 64,
            allocations: 5,
            frees: 2,
            failed_allocations: 1,
            free_chunks: 2,
            largest_free: 64_000,
        }
    }

    #[test]
    fn test_report() {
        let mut out = String::new();
        write_heap_status(&mut out, &sample()).unwrap();
        assert_eq!(
            out,
            "Heap: 64 KiB total\n\
             \x20 used:     336 B\n\
             \x20 free:     65040 B in 2 chunks (largest 64000 B)\n\
             \x20 meta:     160 B\n\
             \x20 allocs:   5 (3 live, 1 failed)\n"
        );
    }

    #[test]
    fn test_unbalanced_report_is_flagged() {
        let stats = HeapStats { used_bytes: 1, ..sample() };
        let mut out = String::new();
        write_heap_status(&mut out, &stats).unwrap();
        assert!(out.ends_with("WARNING: byte totals do not add up\n"));
    }

    #[test]
    fn test_bytes() {
        assert_eq!(Bytes(0).to_string(), "0 B");
        assert_eq!(Bytes(1023).to_string(), "1023 B");
        assert_eq!(Bytes(4096).to_string(), "4 KiB");
        assert_eq!(Bytes(64 * 1024 * 1024).to_string(), "64 MiB");
        assert_eq!(Bytes(1536 * 1024).to_string(), "1536 KiB");
    }
}
