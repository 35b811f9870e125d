use super::*;
use serde_json::json;
use tempfile::tempdir;

fn object_row(sample: &str, id: &str, value: f64) -> FeatureRow {
    let mut row = FeatureRow::keyed("sample_id", sample);
    row.set("object_id", id);
    row.set("object_fws_total", value);
    row
}

#[test]
fn test_from_rows_unions_columns() {
    let mut first = FeatureRow::keyed("object_id", "s_1");
    first.set("object_a", 1i64);
    let mut second = FeatureRow::keyed("object_id", "s_2");
    second.set("object_b", "x");
    second.set("object_a", 2i64);

    let table = FeatureTable::from_rows(vec![first, second]);
    assert_eq!(table.columns(), &["object_id", "object_a", "object_b"]);
    assert_eq!(table.num_rows(), 2);
    assert_eq!(table.cell(0, "object_b"), Some(&Cell::Null));
    assert_eq!(table.cell(1, "object_a"), Some(&Cell::Int(2)));
}

#[test]
fn test_row_set_replaces_in_place() {
    let mut row = FeatureRow::keyed("sample_id", "s");
    row.set("x", 1i64);
    row.set("sample_id", "t");
    assert_eq!(row.len(), 2);
    assert_eq!(row.iter().next(), Some(("sample_id", &Cell::from("t"))));
}

#[test]
fn test_cell_from_json() {
    assert_eq!(Cell::from_json(&json!(3)), Cell::Int(3));
    assert_eq!(Cell::from_json(&json!(0.5)), Cell::Float(0.5));
    assert_eq!(Cell::from_json(&json!("a b")), Cell::from("a b"));
    assert_eq!(Cell::from_json(&json!(true)), Cell::from("true"));
    assert_eq!(Cell::from_json(&json!(null)), Cell::Null);
    assert_eq!(Cell::from_json(&json!({"k": [1, 2]})), Cell::from(r#"{"k":[1,2]}"#));
}

#[test]
fn test_cell_parse_and_render() {
    assert_eq!(Cell::parse(""), Cell::Null);
    assert_eq!(Cell::parse("42"), Cell::Int(42));
    assert_eq!(Cell::parse("-1.5"), Cell::Float(-1.5));
    assert_eq!(Cell::parse("2024-05-01"), Cell::from("2024-05-01"));

    assert_eq!(Cell::Null.render(), "");
    assert_eq!(Cell::Float(1.0).render(), "1");
    assert_eq!(Cell::Float(0.25).render(), "0.25");
    assert_eq!(Cell::Float(f64::NAN).render(), "");
}

#[test]
fn test_left_join_keeps_unmatched_rows() {
    let cyto = FeatureTable::from_rows(vec![
        object_row("s", "s_A", 1.0),
        object_row("s", "s_B", 2.0),
        object_row("s", "s_C", 3.0),
    ]);

    let mut a = FeatureRow::keyed("sample_id", "s");
    a.set("object_id", "s_A");
    a.set("object_area", 10i64);
    let mut b = FeatureRow::keyed("sample_id", "s");
    b.set("object_id", "s_B");
    b.set("object_area", 20i64);
    let images = FeatureTable::from_rows(vec![b, a]);

    let merged = cyto.left_join(&images, &["sample_id", "object_id"]).unwrap();
    assert_eq!(merged.num_rows(), 3);
    assert_eq!(
        merged.columns(),
        &["sample_id", "object_id", "object_fws_total", "object_area"]
    );
    assert_eq!(merged.cell(0, "object_area"), Some(&Cell::Int(10)));
    assert_eq!(merged.cell(1, "object_area"), Some(&Cell::Int(20)));
    assert_eq!(merged.cell(2, "object_area"), Some(&Cell::Null));
    assert_eq!(merged.cell(2, "object_id"), Some(&Cell::from("s_C")));
}

#[test]
fn test_left_join_never_duplicates() {
    let left = FeatureTable::from_rows(vec![FeatureRow::keyed("sample_id", "s")]);
    let mut first = FeatureRow::keyed("sample_id", "s");
    first.set("sample_name", "first");
    let mut second = FeatureRow::keyed("sample_id", "s");
    second.set("sample_name", "second");
    let right = FeatureTable::from_rows(vec![first, second]);

    let merged = left.left_join(&right, &["sample_id"]).unwrap();
    assert_eq!(merged.num_rows(), 1);
    assert_eq!(merged.cell(0, "sample_name"), Some(&Cell::from("first")));
}

#[test]
fn test_left_join_skips_colliding_columns() {
    let mut l = FeatureRow::keyed("sample_id", "s");
    l.set("acq_id", "left");
    let mut r = FeatureRow::keyed("sample_id", "s");
    r.set("acq_id", "right");
    r.set("acq_volume", 1.5);

    let merged = FeatureTable::from_rows(vec![l])
        .left_join(&FeatureTable::from_rows(vec![r]), &["sample_id"])
        .unwrap();
    assert_eq!(merged.columns(), &["sample_id", "acq_id", "acq_volume"]);
    assert_eq!(merged.cell(0, "acq_id"), Some(&Cell::from("left")));
}

#[test]
fn test_left_join_missing_key() {
    let left = FeatureTable::new(["sample_id"]);
    let right = FeatureTable::new(["other"]);
    assert!(matches!(
        left.left_join(&right, &["sample_id"]),
        Err(TableError::ColumnNotFound(_))
    ));
}

#[test]
fn test_replace_rows_and_sort() {
    let existing = FeatureTable::from_rows(vec![
        FeatureRow::keyed("sample_id", "b"),
        FeatureRow::keyed("sample_id", "a"),
    ]);
    let mut update = FeatureRow::keyed("sample_id", "b");
    update.set("sample_name", "new");
    let replacement = FeatureTable::from_rows(vec![update]);

    let mut merged = existing.replace_rows("sample_id", &replacement).unwrap();
    merged.sort_by_column("sample_id").unwrap();

    assert_eq!(merged.num_rows(), 2);
    assert_eq!(merged.cell(0, "sample_id"), Some(&Cell::from("a")));
    assert_eq!(merged.cell(0, "sample_name"), Some(&Cell::Null));
    assert_eq!(merged.cell(1, "sample_name"), Some(&Cell::from("new")));
}

#[test]
fn test_select_and_fill() {
    let mut table = FeatureTable::from_rows(vec![object_row("s", "s_1", 1.0)]);
    table.fill_column("img_rank", Cell::Int(0));
    table
        .set_column("img_file_name", vec![Cell::from("1.png")])
        .unwrap();

    let selected = table
        .select(&["img_file_name".to_string(), "object_id".to_string()])
        .unwrap();
    assert_eq!(selected.columns(), &["img_file_name", "object_id"]);
    assert_eq!(selected.cell(0, "img_file_name"), Some(&Cell::from("1.png")));
    assert!(table.select(&["nope".to_string()]).is_err());
    assert!(table.push_row(vec![Cell::Null]).is_err());
}

#[test]
fn test_parquet_preserves_values_and_types() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("work").join("t.parquet");

    let mut row = object_row("s", "s_1", 1.5);
    row.set("object_count", 7i64);
    row.set("object_mixed", 2i64);
    row.set("object_empty", Cell::Null);
    let mut other = object_row("s", "s_2", 2.5);
    other.set("object_mixed", 0.5);
    let table = FeatureTable::from_rows(vec![row, other]);

    write_parquet(&table, &path).unwrap();
    let back = read_parquet(&path).unwrap();

    assert_eq!(back.columns(), table.columns());
    assert_eq!(back.cell(0, "object_count"), Some(&Cell::Int(7)));
    assert_eq!(back.cell(1, "object_count"), Some(&Cell::Null));
    assert_eq!(back.cell(0, "object_mixed"), Some(&Cell::Float(2.0)));
    assert_eq!(back.cell(1, "object_fws_total"), Some(&Cell::Float(2.5)));
    assert_eq!(back.cell(0, "object_empty"), Some(&Cell::Null));
    assert_eq!(back.cell(1, "object_id"), Some(&Cell::from("s_2")));
}

#[test]
fn test_parquet_empty_table() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("empty.parquet");
    let table = FeatureTable::new(["sample_id", "object_id"]);

    write_parquet(&table, &path).unwrap();
    let back = read_parquet(&path).unwrap();
    assert_eq!(back.num_rows(), 0);
    assert_eq!(back.columns(), &["sample_id", "object_id"]);
}

#[test]
fn test_csv_typed_and_raw() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("samples.csv");
    std::fs::write(&path, "sample_id,object_lat,object_date\ns1,43.5,\ns2,,2024-01-02\n").unwrap();

    let typed = read_csv(&path, b',', CsvCells::Typed { keys: &["sample_id"] }).unwrap();
    assert_eq!(typed.cell(0, "object_lat"), Some(&Cell::Float(43.5)));
    assert_eq!(typed.cell(0, "object_date"), Some(&Cell::Null));

    let raw = read_csv(&path, b',', CsvCells::Text).unwrap();
    assert_eq!(raw.cell(0, "object_lat"), Some(&Cell::from("43.5")));

    let out = dir.path().join("copy.csv");
    write_csv(&raw, &out, b',').unwrap();
    assert_eq!(
        std::fs::read_to_string(&out).unwrap(),
        std::fs::read_to_string(&path).unwrap()
    );
}

#[test]
fn test_write_atomically_replaces() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("out.txt");
    std::fs::write(&path, "old").unwrap();

    write_atomically(&path, |file| -> std::io::Result<()> {
        use std::io::Write;
        file.write_all(b"new")
    })
    .unwrap();
    assert_eq!(std::fs::read_to_string(&path).unwrap(), "new");

    let entries = std::fs::read_dir(dir.path()).unwrap().count();
    assert_eq!(entries, 1);
}
