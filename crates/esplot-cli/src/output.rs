//! Terminal output formatting.

use colored::Colorize;
use esplot_core::HubStats;

/// Print hub counters reported by a running broker.
pub fn print_stats(url: &str, stats: &HubStats) {
    println!("{} {}", "ESPlot".cyan().bold(), url.dimmed());
    println!();

    let viewers = if stats.sessions == 0 {
        "0".dimmed()
    } else {
        stats.sessions.to_string().green().bold()
    };
    println!("  {:12} {}", "Viewers", viewers);
    println!("  {:12} {}", "Broadcasts", stats.broadcasts);
    println!("  {:12} {}", "Deliveries", stats.deliveries);

    let evictions = if stats.evictions > 0 {
        stats.evictions.to_string().yellow()
    } else {
        stats.evictions.to_string().normal()
    };
    println!("  {:12} {}", "Evictions", evictions);
}

/// Print a one-line submission summary.
pub fn print_submitted(source: &str, bytes: usize, attempts: u32) {
    let retries = if attempts > 1 {
        format!(" after {} attempts", attempts).dimmed().to_string()
    } else {
        String::new()
    };
    println!(
        "{} {} {}{}",
        "✓".green(),
        source.bold(),
        format!("({} bytes)", bytes).dimmed(),
        retries
    );
}
