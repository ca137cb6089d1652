//! Integration tests for the herd analysis pipeline.

use composable_h2::prelude::*;
use std::collections::HashSet;
use std::io::Write;
use tempfile::NamedTempFile;

fn text(values: &[&str]) -> Vec<Value> {
    values.iter().map(|s| Value::from_raw(s)).collect()
}

/// Twenty animals: ten with mixed sex labels and partial pedigree, five
/// males and five females referenced as each other's parents.
fn twenty_row_herd() -> RecordTable {
    let ids = [
        "id1", "id2", "id3", "id4", "id5", "id6", "id7", "id8", "id9", "id10", "m1", "m2", "m3",
        "m4", "m5", "f1", "f2", "f3", "f4", "f5",
    ];
    let sex = [
        "Male", "Female", "Male", "Female", "Male", "Female", "Unknown", "Male", "Female", "",
        "Male", "Male", "Male", "Male", "Male", "Female", "Female", "Female", "Female", "Female",
    ];
    let sire = [
        "", "id1", "", "id3", "id1", "id3", "m1", "m2", "m3", "m4", "", "", "", "", "", "m1",
        "m2", "m3", "m4", "m5",
    ];
    let dam = [
        "id2", "", "id4", "", "id2", "id4", "f1", "f2", "f3", "f4", "f1", "f2", "f3", "f4", "f5",
        "", "", "", "", "",
    ];
    let milk = [
        100.0, 110.0, 105.0, 115.0, 102.0, 112.0, 90.0, 120.0, 125.0, 95.0, 130.0, 135.0, 140.0,
        122.0, 128.0, 118.0, 122.0, 128.0, 132.0, 130.0,
    ];
    RecordTable::from_columns(vec![
        ("ID".to_string(), text(&ids)),
        ("Sex".to_string(), text(&sex)),
        ("Père".to_string(), text(&sire)),
        ("Mère".to_string(), text(&dam)),
        (
            "Rendement_lait".to_string(),
            milk.iter().map(|&v| Value::Number(v)).collect(),
        ),
    ])
    .unwrap()
}

/// Twenty rows over ten animals: `id1..id5` male, `id6..id10` female, each
/// recorded twice. Second rows would reorder the ranking if they were used.
fn ten_animals_two_rows() -> RecordTable {
    let ids: Vec<String> = (1..=10).chain(1..=10).map(|i| format!("id{}", i)).collect();
    let sex: Vec<&str> = (0..20)
        .map(|r| if r % 10 < 5 { "Male" } else { "Female" })
        .collect();
    let milk = [
        90.0, 100.0, 110.0, 120.0, 130.0, 95.0, 105.0, 115.0, 125.0, 135.0, 140.0, 139.0, 138.0,
        91.0, 92.0, 134.0, 133.0, 132.0, 96.0, 97.0,
    ];
    RecordTable::from_columns(vec![
        (
            "ID".to_string(),
            ids.iter().map(|s| Value::from_raw(s)).collect(),
        ),
        ("Sex".to_string(), text(&sex)),
        ("Père".to_string(), text(&[""; 20])),
        ("Mère".to_string(), text(&[""; 20])),
        (
            "Rendement_lait".to_string(),
            milk.iter().map(|&v| Value::Number(v)).collect(),
        ),
    ])
    .unwrap()
}

fn synthetic(config: HerdConfig) -> RecordTable {
    generate_herd(&config).unwrap().table
}

#[test]
fn test_twenty_row_recommendations() {
    let table = normalize(&twenty_row_herd()).unwrap();
    let recs = recommend_matings(&table, &["milk_yield"], 2, 3);

    assert_eq!(recs.len(), 6);
    let sires: HashSet<&str> = recs.iter().map(|r| r.sire_id.as_str()).collect();
    let dams: HashSet<&str> = recs.iter().map(|r| r.dam_id.as_str()).collect();
    assert_eq!(sires, HashSet::from(["m3", "m2"]));
    assert_eq!(dams, HashSet::from(["f4", "f5", "f3"]));

    // Best sire with best dam first
    assert_eq!(recs[0].sire_id, "m3");
    assert_eq!(recs[0].dam_id, "f4");
    assert_eq!(recs[0].sire_value, 140.0);
    assert_eq!(recs[0].dam_value, 132.0);
    assert!(recs.iter().all(|r| r.trait_focus == "milk_yield"));
}

#[test]
fn test_repeated_ids_use_first_record() {
    let table = normalize(&ten_animals_two_rows()).unwrap();
    let recs = recommend_matings(&table, &["milk_yield"], 2, 3);

    assert_eq!(recs.len(), 6);
    let pairs: HashSet<(&str, &str)> = recs
        .iter()
        .map(|r| (r.sire_id.as_str(), r.dam_id.as_str()))
        .collect();
    assert_eq!(pairs.len(), 6);
    for (sire, dam) in &pairs {
        assert!(["id4", "id5"].contains(sire), "sire {}", sire);
        assert!(["id8", "id9", "id10"].contains(dam), "dam {}", dam);
    }

    assert_eq!(recs[0].sire_id, "id5");
    assert_eq!(recs[0].dam_id, "id10");
    assert_eq!(recs[0].sire_value, 130.0);
    assert_eq!(recs[0].dam_value, 135.0);
}

#[test]
fn test_small_sample_normalize_is_idempotent() {
    let raw = RecordTable::from_columns(vec![
        ("ID".to_string(), text(&["a", "b", "c", "d"])),
        (
            "Kg Lait".to_string(),
            vec![
                Value::Number(6000.0),
                Value::Number(6000.0),
                Value::Number(6000.0),
                Value::Number(9000.0),
            ],
        ),
    ])
    .unwrap();
    let once = normalize(&raw).unwrap();
    let twice = normalize(&once).unwrap();
    assert_eq!(once, twice);
    assert_eq!(once.numeric_column("milk_yield").unwrap()[3], Some(6000.0));
}

#[test]
fn test_one_record_per_animal_has_no_estimate() {
    let ids: Vec<String> = (0..40).map(|i| format!("V{:04}", i)).collect();
    let milk: Vec<Value> = (0..40)
        .map(|i| Value::Number(5000.0 + ((i * 37) % 23) as f64 * 130.0))
        .collect();
    let raw = RecordTable::from_columns(vec![
        ("N° SNIT".to_string(), ids.iter().map(|s| Value::from_raw(s)).collect()),
        ("Kg Lait".to_string(), milk),
    ])
    .unwrap();
    let table = normalize(&raw).unwrap();

    let estimates = estimate_all(&table, &["milk_yield"], &LmmConfig::default());
    assert!(estimates.get("milk_yield").is_none());
    let (name, reason) = estimates.failed()[0];
    assert_eq!(name, "milk_yield");
    assert!(reason.contains("repeated records"), "{}", reason);
}

#[test]
fn test_recommendation_edge_cases() {
    let table = normalize(&twenty_row_herd()).unwrap();

    let none: [&str; 0] = [];
    assert!(recommend_matings(&table, &none, 5, 10).is_empty());

    let without_sex = table.select_columns(&["id", "sire_id", "dam_id", "milk_yield"]);
    assert!(recommend_matings(&without_sex, &["milk_yield"], 5, 10).is_empty());

    let all = recommend_matings(&table, &["milk_yield"], 100, 100);
    assert!(!all.is_empty());
    assert!(all.iter().all(|r| r.sire_id != r.dam_id));
}

#[test]
fn test_parent_tallies() {
    let table = normalize(&twenty_row_herd()).unwrap();
    let summary = analyze_pedigree(&table);
    let stats = summary.parent_stats;

    assert_eq!(stats.total(), 20);
    assert_eq!(stats.both_known, 6);
    assert_eq!(stats.one_known, 14);
    assert_eq!(stats.none_known, 0);
    assert!(summary.pedigree_depth >= 1);
}

#[test]
fn test_single_animal_is_a_modeling_error() {
    let table = RecordTable::from_columns(vec![
        ("id".to_string(), text(&["A", "A", "A", "A"])),
        (
            "milk_yield".to_string(),
            vec![
                Value::Number(6000.0),
                Value::Number(6200.0),
                Value::Number(6100.0),
                Value::Number(6400.0),
            ],
        ),
    ])
    .unwrap();
    let table = normalize(&table).unwrap();

    match estimate_heritability(&table, "milk_yield") {
        Err(H2Error::Modeling { trait_name, reason }) => {
            assert_eq!(trait_name, "milk_yield");
            assert!(reason.contains("at least 2"), "{}", reason);
        }
        other => panic!("expected a modeling error, got {:?}", other),
    }
}

#[test]
fn test_heritability_recovers_truth() {
    let herd = generate_herd(&HerdConfig::ideal()).unwrap();
    let table = normalize(&herd.table).unwrap();

    let result = estimate_heritability(&table, "milk_yield").unwrap();
    let h2 = result.h2.unwrap();
    assert!(
        (0.15..=0.6).contains(&h2),
        "h2 = {} (truth {})",
        h2,
        herd.truth.h2
    );
    assert_eq!(result.n_groups, 128);
    assert!(result.fixed_effects.contains(&"lactation".to_string()));

    let (lower, upper) = (result.ci_lower.unwrap(), result.ci_upper.unwrap());
    assert!(lower <= h2 && h2 <= upper);
    assert!(result.standard_error.unwrap() > 0.0);
}

#[test]
fn test_heritability_bounds_all_traits() {
    let table = normalize(&synthetic(HerdConfig::typical())).unwrap();
    let traits = identify_traits(&table).unwrap().traits;
    assert_eq!(traits, vec!["milk_yield", "fat_pct", "protein_pct"]);

    let estimates = estimate_all(&table, &traits, &LmmConfig::default());
    assert_eq!(estimates.len(), 3);
    for r in estimates.successful() {
        let h2 = r.h2.unwrap();
        assert!((0.0..=1.0).contains(&h2), "{}: {}", r.trait_name, h2);
        assert!(r.genetic_variance.unwrap() >= 0.0);
        assert!(r.residual_variance.unwrap() > 0.0);
    }
}

#[test]
fn test_normalize_is_idempotent() {
    let once = normalize(&synthetic(HerdConfig::typical())).unwrap();
    let twice = normalize(&once).unwrap();
    assert_eq!(once, twice);
}

#[test]
fn test_clipped_values_within_fences() {
    let raw = synthetic(HerdConfig::new("dirty").with_defects(0.1, 0.05));
    let (table, summary) = normalize_with_summary(&raw).unwrap();
    let fences = summary.fences["milk_yield"];

    assert!(summary.clipped["milk_yield"] > 0);
    for v in table.numeric_column("milk_yield").unwrap() {
        let v = v.unwrap();
        assert!(v >= fences.lower && v <= fences.upper);
    }
}

#[test]
fn test_csv_round_trip() {
    let mut file = tempfile::Builder::new().suffix(".csv").tempfile().unwrap();
    writeln!(file, "N° SNIT;Sexe;Père;Mère;N° LACT;Age Vêlage;Kg Lait;% MG;% Prot").unwrap();
    writeln!(file, "V1;F;T1;0;1;2 a 3 m;6100;4,1;3,2").unwrap();
    writeln!(file, "V1;F;T1;0;2;3 a 4 m;6500;4,0;3,3").unwrap();
    writeln!(file, "V2;F;T2;V1;1;26;NA;3,9;3,1").unwrap();
    writeln!(file, "T1;M;;;;;;;").unwrap();
    file.flush().unwrap();

    let raw = RecordTable::from_path(file.path()).unwrap();
    assert_eq!(raw.n_rows(), 4);
    assert_eq!(raw.n_columns(), 9);

    let table = normalize(&raw).unwrap();
    let age = table.numeric_column("age_at_calving").unwrap();
    assert_eq!(age[0], Some(27.0));
    assert_eq!(age[1], Some(40.0));
    assert_eq!(age[2], Some(26.0));

    let fat = table.numeric_column("fat_pct").unwrap();
    assert!((fat[0].unwrap() - 4.1).abs() < 1e-12);

    let out = NamedTempFile::new().unwrap();
    table.to_csv(out.path()).unwrap();
    let reloaded = RecordTable::from_reader(std::fs::File::open(out.path()).unwrap(), b',').unwrap();
    assert_eq!(reloaded.column_names(), table.column_names());
    assert_eq!(reloaded.n_rows(), 4);
    assert_eq!(
        reloaded.numeric_column("milk_yield").unwrap(),
        table.numeric_column("milk_yield").unwrap()
    );
}

#[test]
fn test_pipeline_from_yaml_file() {
    let mut file = NamedTempFile::new().unwrap();
    write!(
        file,
        "\
name: yaml-herd
description: Cleaning then estimation
steps:
  - Normalize
  - ProfileQuality
  - AnalyzePedigree
  - EstimateHeritability:
      traits: [milk_yield]
  - RecommendMatings:
      config:
        top_males: 2
        top_females: 3
"
    )
    .unwrap();
    file.flush().unwrap();

    let config = PipelineConfig::from_yaml(&std::fs::read_to_string(file.path()).unwrap()).unwrap();
    let context = Pipeline::from_config(&config)
        .run(&synthetic(HerdConfig::small()))
        .unwrap();

    assert_eq!(context.name, "yaml-herd");
    assert!(context.quality.is_some());
    assert_eq!(context.estimates.as_ref().unwrap().len(), 1);
    let recs = context.recommendations.as_ref().unwrap();
    assert!(recs.len() <= 6);
    assert!(recs.iter().all(|r| r.sire_id != r.dam_id));
}

#[test]
fn test_report_from_pipeline() {
    let context = run_herd_analysis(&synthetic(HerdConfig::typical()), 5, 10).unwrap();
    let report = AnalysisReport::from_context(&context, "integration");

    assert_eq!(report.meta.label, "integration");
    assert_eq!(report.heritability.len(), 3);
    assert!(report.interpretation.mean_h2.is_some());
    assert!(report.interpretation.influence.is_some());
    assert!(report.quality.as_ref().unwrap().contains("Data Quality Profile"));

    let json = report.to_json().unwrap();
    let parsed: AnalysisReport = serde_json::from_str(&json).unwrap();
    assert_eq!(parsed.recommendations.len(), report.recommendations.len());

    let md = report.to_markdown();
    assert!(md.contains("## 2. Heritability"));
    assert!(md.contains("milk_yield"));
}

#[test]
fn test_estimates_tsv() {
    let table = normalize(&synthetic(HerdConfig::small())).unwrap();
    let estimates = estimate_all(&table, &["milk_yield", "fat_kg"], &LmmConfig::default());
    assert_eq!(estimates.failed().len(), 1);

    let out = NamedTempFile::new().unwrap();
    estimates.to_tsv(out.path()).unwrap();
    let content = std::fs::read_to_string(out.path()).unwrap();
    let lines: Vec<&str> = content.lines().collect();
    assert_eq!(lines.len(), 3);
    assert!(lines[0].starts_with("trait\tstatus\th2"));
    assert!(lines[2].starts_with("fat_kg\tfailed"));
}
