// End-to-end tests for the CSV pipeline: fixture files in, CSV text out.

use std::path::Path;

use fantaroster_core::aggregate::{aggregate, summary_records, AggregateConfig, StatValue};
use fantaroster_core::columns::{drop_columns, renumber};
use fantaroster_core::parse::{parse, read_path, ParseOptions};
use fantaroster_core::reconcile::{reconcile, ReconcileConfig, ReconcileWarning};
use fantaroster_core::serialize::{serialize, write_atomic, SerializeOptions};

const FIXTURES: &str = "tests/fixtures";

fn fixture(name: &str) -> std::path::PathBuf {
    Path::new(FIXTURES).join(name)
}

#[test]
fn summarize_match_rows() {
    let rows = read_path(&fixture("match_rows.csv"), &ParseOptions::default()).unwrap();
    assert_eq!(rows.len(), 6);

    let summaries = aggregate(&rows, &AggregateConfig::default());
    assert_eq!(summaries.len(), 3);

    let lautaro = &summaries[0];
    assert_eq!(lautaro.count, 3);
    assert_eq!(lautaro.get("Goals"), Some(&StatValue::Count(3)));
    assert_eq!(lautaro.get("Total Shoot"), Some(&StatValue::Count(11)));
    assert_eq!(lautaro.get("Assists"), Some(&StatValue::Count(1)));
    // (90 + 76 + 45) / 38 = 5.55
    assert_eq!(lautaro.get("minuti per 38"), Some(&StatValue::Average(5.55)));
    // blank Passes on the third row contributes nothing: 39 / 38 = 1.03
    assert_eq!(lautaro.get("Passes per 38"), Some(&StatValue::Average(1.03)));

    let barella = &summaries[1];
    assert_eq!(barella.get("Player"), Some(&StatValue::Text("Nicolò Barella".into())));
    // only the first row had minutes: 90 / 38 = 2.37
    assert_eq!(barella.get("minuti per 38"), Some(&StatValue::Average(2.37)));

    let text = serialize(&summary_records(&summaries), &SerializeOptions::default()).unwrap();
    let mut lines = text.lines();
    assert_eq!(
        lines.next(),
        Some("Player,Team,Goals,Total Shoot,Assists,minuti per 38,Passes per 38")
    );
    assert_eq!(lines.next(), Some("Lautaro Martinez,Inter,3,11,1,5.55,1.03"));
}

#[test]
fn enrich_quotazioni_with_stats() {
    let stats = read_path(&fixture("stats.csv"), &ParseOptions::default()).unwrap();
    let stats = drop_columns(&stats, &["id".to_string()]);
    let targets = read_path(&fixture("quotazioni.csv"), &ParseOptions::with_delimiter(b';')).unwrap();
    let targets = drop_columns(&targets, &["Id".to_string()]);

    let report = reconcile(&stats, &targets, &ReconcileConfig::default());
    assert_eq!(report.rows.len(), targets.len());

    // accent-insensitive exact match
    assert_eq!(report.rows[0]["goal"], "24");
    // surname-only name falls back to the Barella bucket
    assert_eq!(report.rows[1]["assist"], "6");
    // shared surname resolved by given name
    assert_eq!(report.rows[2]["goal"], "7");
    // shared surname, unknown given name: first-seen entry (Mario)
    assert_eq!(report.rows[3]["rossi"], "1");
    // no stats for Sommer
    assert_eq!(report.rows[4]["minuti"], "0");
    // blank name
    assert_eq!(report.rows[5]["partite"], "0");

    assert_eq!(report.exact, 2);
    assert_eq!(report.fallback, 2);
    assert_eq!(report.unmatched, 1);
    assert_eq!(report.missing_name, 1);
    assert_eq!(
        report.warnings,
        vec![
            ReconcileWarning::NoMatch {
                row: 4,
                name: "Yann Sommer".into()
            },
            ReconcileWarning::MissingName { row: 5 },
        ]
    );

    let renumbered = renumber(&report.rows, "id");
    let text = serialize(&renumbered, &SerializeOptions::with_delimiter(b';')).unwrap();
    let mut lines = text.lines();
    assert_eq!(
        lines.next(),
        Some("id;R;RM;Nome;Squadra;Qt.A;Qt.I;FVM;partite;minuti;goal;assist;rigori;gialli;rossi")
    );
    assert_eq!(
        lines.next(),
        Some("1;A;Pc;Lautaro Martinez;Inter;40;42;300;34;2800;24;3;2;4;0")
    );
}

#[test]
fn written_output_parses_back_identically() {
    let original = read_path(&fixture("quotazioni.csv"), &ParseOptions::with_delimiter(b';')).unwrap();
    let text = serialize(&original, &SerializeOptions::with_delimiter(b';')).unwrap();

    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("out.csv");
    write_atomic(&out, &text).unwrap();

    let back = read_path(&out, &ParseOptions::with_delimiter(b';')).unwrap();
    assert_eq!(original, back);
    assert_eq!(std::fs::read_to_string(fixture("quotazioni.csv")).unwrap(), text);
}

#[test]
fn parse_failure_yields_no_partial_result() {
    let text = "Player,Team,Goals\nA,X,1\n\"B,Y,2\n";
    assert!(parse(text, &ParseOptions::default()).is_err());
}
