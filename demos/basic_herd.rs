//! Basic example demonstrating a full herd analysis.
//!
//! This example shows how to:
//! 1. Generate a synthetic herd with a known heritability
//! 2. Normalize and profile the records
//! 3. Run the analysis pipeline
//! 4. Examine estimates, recommendations and the report

use composable_h2::prelude::*;

fn main() -> Result<()> {
    env_logger::init();

    println!("=== Composable h2 Example ===\n");

    let herd = generate_herd(&HerdConfig::typical())?;
    println!("Synthetic herd '{}':", herd.config.name);
    println!("  Records: {}", herd.table.n_rows());
    println!("  Animals: {}", herd.truth.breeding_values.len());
    println!("  True h2 (milk): {:.2}", herd.truth.h2);
    println!();

    // Normalize and profile
    println!("=== Normalization ===\n");
    let (clean, summary) = normalize_with_summary(&herd.table)?;
    println!("{}", summary);
    println!("{}", profile_quality(&clean));

    // Run the pipeline
    println!("=== Running Herd Pipeline ===\n");
    let context = Pipeline::new()
        .name("basic-herd")
        .normalize()
        .profile_quality()
        .analyze_pedigree()
        .estimate_heritability()
        .recommend_matings(3, 5)
        .run(&herd.table)?;

    if let Some(structure) = &context.structure {
        println!("Pedigree depth: {}", structure.pedigree_depth);
        println!(
            "Parents known: both {}, one {}, none {}",
            structure.parent_stats.both_known,
            structure.parent_stats.one_known,
            structure.parent_stats.none_known
        );
        println!();
    }

    println!("Heritability estimates:");
    if let Some(estimates) = &context.estimates {
        for r in estimates.successful() {
            println!(
                "  {:<12} h2 = {:.3} ({})",
                r.trait_name,
                r.h2.unwrap_or(f64::NAN),
                r.class().map(|c| c.name()).unwrap_or("n/a")
            );
        }
        for (name, reason) in estimates.failed() {
            println!("  {:<12} failed: {}", name, reason);
        }
    }
    println!();

    println!("Top recommendations:");
    for r in context.recommendations.iter().flatten().take(5) {
        println!("  {} x {} [{}]", r.sire_id, r.dam_id, r.trait_focus);
    }
    println!();

    let report = AnalysisReport::from_context(&context, "demo");
    println!("{}", report.interpretation.summary);

    Ok(())
}
