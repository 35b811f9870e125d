use super::*;
use serde_json::json;

fn particles() -> Vec<Particle> {
    serde_json::from_value(json!([
        {
            "particleId": 1,
            "parameters": [
                {"description": "FWS", "length": 0.98, "total": 40621.9},
                {"description": "Sidewards Scatter", "length": 10.77, "total": 1276}
            ]
        },
        {
            "particleId": 2,
            "parameters": [
                {"description": "FWS", "length": 1.5}
            ]
        },
        {"particleId": 3, "parameters": []}
    ]))
    .unwrap()
}

fn object_mapping() -> ColumnMapping {
    [
        ("FWS.length", "fws_length"),
        ("Sidewards Scatter.total", "sws_total"),
        ("FL Red.total", "fl_red_total"),
    ]
    .into_iter()
    .collect()
}

#[test]
fn test_cytometric_table() {
    let table = cytometric_table("s1", &particles(), &object_mapping());

    assert_eq!(table.num_rows(), 2);
    assert_eq!(
        table.columns(),
        &[
            "sample_id",
            "object_id",
            "object_fws_length",
            "object_sws_total",
            "object_fl_red_total"
        ]
    );
    assert_eq!(table.cell(0, "object_id"), Some(&Cell::from("s1_1")));
    assert_eq!(table.cell(0, "object_sws_total"), Some(&Cell::Int(1276)));
    assert_eq!(table.cell(1, "object_fws_length"), Some(&Cell::Float(1.5)));
    assert_eq!(table.cell(1, "object_sws_total"), Some(&Cell::Null));
    assert_eq!(table.cell(0, "object_fl_red_total"), Some(&Cell::Null));
}

#[test]
fn test_particle_without_parameters_skipped() {
    let particles = particles();
    assert!(cytometric_row("s1", &particles[2], &object_mapping()).is_none());
}

#[test]
fn test_metadata_row_groups() {
    let instrument = json!({
        "name": "CytoSense",
        "measurementSettings": {
            "name": "station 4",
            "CytoSettings": {"iif": {"ImageScaleMuPerPixelP": 0.55}}
        },
        "channels": [{"name": "FWS"}, {"name": "SWS"}]
    });
    let config = ProjectConfig::from_str(
        r#"
        [sample]
        "measurementSettings.name" = "name"
        [acq]
        "measurementSettings.CytoSettings.iif.ImageScaleMuPerPixelP" = "pixel_size"
        "channels[].name" = "channels"
        "missing.path" = "missing"
        [process]
        "id" = "id"
        "#,
    )
    .unwrap();

    let row = metadata_row("s1", &instrument, &config);
    let names: Vec<&str> = row.iter().map(|(n, _)| n).collect();
    assert_eq!(
        names,
        vec![
            "sample_id",
            "sample_name",
            "acq_id",
            "acq_pixel_size",
            "acq_channels",
            "acq_missing",
            "process_id"
        ]
    );
    assert_eq!(row.get("process_id"), Some(&Cell::from("s1")));
    assert_eq!(row.get("acq_pixel_size"), Some(&Cell::Float(0.55)));
    assert_eq!(row.get("acq_channels"), Some(&Cell::from("FWS SWS")));
    assert_eq!(row.get("acq_missing"), Some(&Cell::Null));
}

#[test]
fn test_merge_metadata_replaces_and_sorts() {
    let mut old_b = FeatureRow::keyed("sample_id", "b");
    old_b.set("sample_name", "old");
    let existing = FeatureTable::from_rows(vec![old_b, FeatureRow::keyed("sample_id", "c")]);

    let mut new_b = FeatureRow::keyed("sample_id", "b");
    new_b.set("sample_name", "new");
    let fresh = FeatureTable::from_rows(vec![new_b, FeatureRow::keyed("sample_id", "a")]);

    let merged = merge_metadata(Some(existing), fresh).unwrap();
    let ids: Vec<String> = merged.column("sample_id").unwrap().map(|c| c.render()).collect();
    assert_eq!(ids, vec!["a", "b", "c"]);
    assert_eq!(merged.cell(1, "sample_name"), Some(&Cell::from("new")));
}
