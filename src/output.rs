use console::Style;

use crate::battery::Battery;
use crate::executor::BatterySummary;
use crate::state::RunState;

pub fn print_error(msg: &str) {
    let style = Style::new().red().bold();
    eprintln!("{} {}", style.apply_to("✗"), msg);
}

pub fn print_success(msg: &str) {
    let style = Style::new().green().bold();
    println!("{} {}", style.apply_to("✓"), msg);
}

/// Skipped pair or missing artifact: worth a line, never fatal.
pub fn print_skip(msg: &str) {
    let dim = Style::new().dim();
    eprintln!("  {} {}", dim.apply_to("·"), msg);
}

pub fn print_battery_summary(project: &str, battery: Battery, summary: &BatterySummary) {
    let secs = summary.duration_ms as f64 / 1000.0;
    if summary.total == 0 {
        let dim = Style::new().dim();
        println!(
            "{} {} {}: no eligible mutants ({} skipped)",
            dim.apply_to("·"),
            project,
            battery,
            summary.skipped,
        );
        return;
    }

    let style = if summary.runtime_errors == 0 {
        Style::new().green().bold()
    } else {
        Style::new().yellow().bold()
    };
    println!(
        "{} {} {}: {} mutants, {} killed, {} survived in {:.1}s",
        style.apply_to(if summary.runtime_errors == 0 { "✓" } else { "!" }),
        project,
        battery,
        summary.total,
        summary.killed,
        summary.survived,
        secs,
    );

    let dim = Style::new().dim();
    if summary.timeouts > 0 {
        println!("  {} {} mutants timed out", dim.apply_to("·"), summary.timeouts);
    }
    if summary.compile_failures > 0 {
        println!(
            "  {} {} compilation failures",
            dim.apply_to("·"),
            summary.compile_failures
        );
    }
    if summary.patch_not_found > 0 {
        println!(
            "  {} {} patches not found",
            dim.apply_to("·"),
            summary.patch_not_found
        );
    }
    if summary.runtime_errors > 0 {
        println!("  {} {} runtime errors", dim.apply_to("·"), summary.runtime_errors);
    }
}

pub fn print_status(state: &RunState) {
    println!(
        "Last run: {} @ {} with {}",
        state.project, state.sha, state.mutator,
    );
    for run in &state.batteries {
        println!(
            "  {}: {} mutants, {} killed, {} survived, {} timeout, {} errors ({:.1}s)",
            run.battery,
            run.total,
            run.killed,
            run.survived,
            run.timeouts,
            run.runtime_errors,
            run.duration_ms as f64 / 1000.0,
        );
    }
}
