use unicode_width::UnicodeWidthStr;

use crate::db::models::*;
use crate::search::{BucketCount, SearchPage, Vocabularies};

/// Truncate a string to fit within max_width (respecting unicode width).
fn truncate(s: &str, max_width: usize) -> String {
    if UnicodeWidthStr::width(s) <= max_width {
        return s.to_string();
    }
    let mut result = String::new();
    let mut width = 0;
    for ch in s.chars() {
        let cw = unicode_width::UnicodeWidthChar::width(ch).unwrap_or(0);
        if width + cw + 3 > max_width {
            result.push_str("...");
            break;
        }
        result.push(ch);
        width += cw;
    }
    result
}

fn plural<N: TryInto<usize>>(n: N) -> &'static str {
    if n.try_into().ok() == Some(1) {
        ""
    } else {
        "s"
    }
}

/// Format one page of search results.
pub fn print_search_page(page: &SearchPage) {
    if page.results.is_empty() {
        if page.count > 0 {
            println!("No results on this page ({} total).", page.count);
        } else {
            println!("No results.");
        }
        return;
    }

    println!(
        "Showing {} of {} result{}:\n",
        page.results.len(),
        page.count,
        plural(page.count)
    );

    println!(
        "  {:<10} {:<20} {:<8} {:<6} {:<16} {:>7}",
        "ID", "DATETIME", "STATION", "STATE", "SPEAKER", "RANK"
    );
    println!("  {}", "-".repeat(72));

    for r in &page.results {
        let rank = r.rank.map(|v| format!("{v:.3}")).unwrap_or_default();
        println!(
            "  {:<10} {:<20} {:<8} {:<6} {:<16} {:>7}",
            r.id,
            r.datetime,
            r.station,
            r.state,
            truncate(r.speaker.as_deref().unwrap_or(""), 16),
            rank,
        );
        let snippet = r.snippet.replace('\n', " ");
        println!("  {}\n", truncate(&format!("  {snippet}"), 76));
    }
}

/// Format context segments for `wavesearch context`.
pub fn print_segments(segments: &[Segment]) {
    if segments.is_empty() {
        println!("No segments found.");
        return;
    }

    println!("{} segment{}:\n", segments.len(), plural(segments.len()));

    let mut last_speaker: Option<&str> = None;
    for seg in segments {
        let speaker = seg.speaker.as_deref().unwrap_or("(unknown)");
        if last_speaker != Some(speaker) {
            if last_speaker.is_some() {
                println!();
            }
            println!("  {} [{} {} #{}]:", speaker, seg.station, seg.dt, seg.id);
            last_speaker = Some(speaker);
        }
        println!("    {}", seg.text);
    }
    println!();
}

/// Format aggregate counts with a proportional bar.
pub fn print_buckets(buckets: &[BucketCount]) {
    if buckets.is_empty() {
        println!("No matching segments.");
        return;
    }

    let max = buckets.iter().map(|b| b.count).max().unwrap_or(1).max(1);
    let label_width = buckets
        .iter()
        .map(|b| UnicodeWidthStr::width(b.label.as_str()))
        .max()
        .unwrap_or(5)
        .max(5);

    for b in buckets {
        let bar = "#".repeat(((b.count * 40) / max) as usize);
        println!("  {:<label_width$} {:>8}  {bar}", b.label, b.count);
    }
}

/// Print the available station and state codes.
pub fn print_vocabularies(vocab: &Vocabularies) {
    println!("Stations ({}):", vocab.stations.len());
    for line in vocab.stations.chunks(10) {
        println!("  {}", line.join(" "));
    }
    println!("\nStates ({}):", vocab.states.len());
    for line in vocab.states.chunks(15) {
        println!("  {}", line.join(" "));
    }
}

/// Print database stats.
pub fn print_stats(stats: &DbStats) {
    println!("Database Statistics:");
    println!("  Segments:       {}", stats.segments);
    println!("  Stations:       {}", stats.stations);
    println!("  States:         {}", stats.states);
    println!("  Speakers:       {}", stats.speakers);
    println!("  Ingested files: {}", stats.ingested_files);
    if let (Some(first), Some(last)) = (&stats.first_dt, &stats.last_dt) {
        println!("  Coverage:       {first} .. {last}");
    }
    println!("  DB Size:        {}", format_bytes(stats.db_size_bytes));
    println!("\n  Stations:");
    for sc in &stats.by_station {
        println!("    {:<16} {}", sc.station, sc.count);
    }
}

pub fn format_bytes(bytes: u64) -> String {
    if bytes >= 1_073_741_824 {
        format!("{:.1} GB", bytes as f64 / 1_073_741_824.0)
    } else if bytes >= 1_048_576 {
        format!("{:.1} MB", bytes as f64 / 1_048_576.0)
    } else if bytes >= 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else {
        format!("{bytes} B")
    }
}
