use anyhow::{Context, Result};
use bwtag_core::config::Config;
use bwtag_core::domain::LibraryStats;
use comfy_table::{presets::UTF8_FULL, Cell, ContentArrangement, Table};

pub fn run(config: &Config) -> Result<()> {
    let Some(stats) = bwtag_core::library_stats(config).context("failed to read library")? else {
        println!("Library has not been classified yet.");
        println!();
        println!("  Run 'bwtag run' to prepare it and classify its photos.");
        return Ok(());
    };
    println!("{}", render(&stats));

    if stats.pending > 0 {
        println!();
        println!("  Run 'bwtag run' to classify the pending photos.");
    }
    Ok(())
}

fn render(stats: &LibraryStats) -> Table {
    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec![Cell::new("Classification"), Cell::new("Photos")]);
    table.add_row(vec![Cell::new("Black & white"), Cell::new(stats.grayscale)]);
    table.add_row(vec![Cell::new("Color"), Cell::new(stats.color)]);
    table.add_row(vec![Cell::new("Pending"), Cell::new(stats.pending)]);
    table
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_contains_counts() {
        let out = render(&LibraryStats {
            grayscale: 12,
            color: 340,
            pending: 7,
        })
        .to_string();
        assert!(out.contains("Black & white"));
        assert!(out.contains("340"));
        assert!(out.contains("Pending"));
    }
}
