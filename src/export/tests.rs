use super::*;
use crate::table::{write_parquet, FeatureRow};
use image::{DynamicImage, GrayImage, Luma};
use std::fs::File;
use tempfile::TempDir;

fn object_row(sample: &str, particle: i64, value: f64) -> FeatureRow {
    let mut row = FeatureRow::keyed("sample_id", sample);
    row.set("object_id", format!("{}_{}", sample, particle));
    row.set("object_fws_total", value);
    row
}

fn metadata_table(samples: &[&str]) -> FeatureTable {
    FeatureTable::from_rows(samples.iter().map(|s| {
        let mut row = FeatureRow::keyed("sample_id", *s);
        row.set("sample_name", format!("station {}", s));
        row.set("acq_id", *s);
        row.set("acq_pixel_size", 0.5);
        row.set("process_id", *s);
        row
    }))
}

fn particle_image() -> GrayImage {
    GrayImage::from_fn(20, 20, |x, y| {
        if (6..14).contains(&x) && (6..14).contains(&y) {
            Luma([220u8])
        } else {
            Luma([10u8])
        }
    })
}

/// Project with every export input for `samples`, two particles each
fn project_with_artifacts(samples: &[&str]) -> (TempDir, Project) {
    let dir = TempDir::new().unwrap();
    let project = Project::new(dir.path());

    write_parquet(&metadata_table(samples), &project.metadata_artifact()).unwrap();
    for sample in samples {
        let cyto = FeatureTable::from_rows(vec![object_row(sample, 1, 10.0), object_row(sample, 2, 20.0)]);
        write_parquet(&cyto, &project.cytometric_artifact(sample)).unwrap();

        let pulses = FeatureTable::from_rows((1..=2).map(|p| {
            let mut row = FeatureRow::keyed("sample_id", *sample);
            row.set("object_id", format!("{}_{}", sample, p));
            row.set("object_FWS_p0", 0.25 * p as f64);
            row
        }));
        write_parquet(&pulses, &project.pulses_artifact(sample)).unwrap();

        let features = FeatureTable::from_rows((1..=2).map(|p| {
            let mut row = FeatureRow::keyed("sample_id", *sample);
            row.set("object_id", format!("{}_{}", sample, p));
            row.set("object_area", 64i64);
            row
        }));
        write_parquet(&features, &project.image_features_artifact(sample)).unwrap();

        let image_dir = project.image_dir(sample);
        std::fs::create_dir_all(&image_dir).unwrap();
        for p in 1..=2 {
            particle_image().save(image_dir.join(format!("{}.png", p))).unwrap();
        }
    }

    (dir, project)
}

fn tsv_lines(path: &std::path::Path) -> Vec<String> {
    std::fs::read_to_string(path)
        .unwrap()
        .lines()
        .map(str::to_string)
        .collect()
}

#[test]
fn test_column_type_tags() {
    let numeric = [Cell::Int(1), Cell::Null, Cell::Float(2.5)];
    assert_eq!(column_type_tag(&numeric), NUMERIC_TAG);

    let mixed = [Cell::Int(1), Cell::from("a")];
    assert_eq!(column_type_tag(&mixed), TEXT_TAG);

    assert_eq!(column_type_tag(&[Cell::Null, Cell::Null]), NUMERIC_TAG);
}

#[test]
fn test_write_tsv_layout() {
    let mut a = FeatureRow::keyed("object_id", "s_1");
    a.set("object_size", 1.5);
    let mut b = FeatureRow::keyed("object_id", "s_2");
    b.set("object_size", Cell::Null);
    let table = FeatureTable::from_rows(vec![a, b]);

    let mut out = Vec::new();
    write_tsv(&table, &mut out).unwrap();
    let text = String::from_utf8(out).unwrap();
    let lines: Vec<&str> = text.lines().collect();

    assert_eq!(lines, vec!["object_id\tobject_size", "[t]\t[f]", "s_1\t1.5", "s_2\t"]);
}

#[test]
fn test_object_columns_truncated_to_limit() {
    let mut columns = vec!["object_id".to_string()];
    columns.extend((0..599).map(|i| format!("object_f{}", i)));

    let governed = govern_columns(&columns, &ColumnLimits::default());

    assert_eq!(governed.columns.len(), 501);
    assert_eq!(governed.columns[..], columns[..501]);
    assert_eq!(governed.truncations.len(), 1);
    let notice = &governed.truncations[0];
    assert_eq!(notice.group, ColumnGroup::Object);
    assert_eq!(notice.found, 599);
    assert_eq!(notice.dropped.len(), 99);
    assert_eq!(notice.dropped[0], "object_f500");
}

#[test]
fn test_columns_grouped_in_prefix_order() {
    let columns: Vec<String> = [
        "sample_id",
        "object_id",
        "acq_id",
        "object_area",
        "stray",
        "img_file_name",
        "process_id",
        "sample_name",
        "img_rank",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect();

    let governed = govern_columns(&columns, &ColumnLimits::default());

    assert_eq!(
        governed.columns,
        vec![
            "img_file_name",
            "img_rank",
            "object_id",
            "object_area",
            "process_id",
            "acq_id",
            "sample_id",
            "sample_name"
        ]
    );
    assert_eq!(governed.unassigned, vec!["stray"]);
    assert!(governed.truncations.is_empty());
}

#[test]
fn test_id_column_does_not_count_toward_limit() {
    let columns: Vec<String> = ["sample_a", "sample_id", "sample_b", "sample_c"]
        .iter()
        .map(|s| s.to_string())
        .collect();
    let limits = ColumnLimits {
        sample: Some(1),
        ..ColumnLimits::default()
    };

    let governed = govern_columns(&columns, &limits);

    assert_eq!(governed.columns, vec!["sample_a", "sample_id"]);
    assert_eq!(governed.truncations[0].dropped, vec!["sample_b", "sample_c"]);
    assert!(governed.truncations[0].to_string().contains("3 sample metadata columns"));
}

#[test]
fn test_img_columns_unlimited_by_default() {
    let columns: Vec<String> = (0..200).map(|i| format!("img_x{}", i)).collect();
    let governed = govern_columns(&columns, &ColumnLimits::default());
    assert_eq!(governed.columns.len(), 200);
}

#[test]
fn test_scale_bar_annotation() {
    let image = DynamicImage::ImageLuma8(particle_image());
    let annotated = annotate_with_scale_bar(&image, 1.0, 8.0);

    assert_eq!(annotated.dimensions(), (20, 20 + SCALE_STRIP_HEIGHT));
    // Original pixels kept
    assert_eq!(annotated.get_pixel(10, 10).0, [220, 220, 220]);
    // Strip is white except for the bar
    assert_eq!(annotated.get_pixel(1, 21).0, [255, 255, 255]);
    let bar_y = 20 + SCALE_STRIP_HEIGHT / 2;
    let black: Vec<u32> = (0..20)
        .filter(|&x| annotated.get_pixel(x, bar_y).0 == [0, 0, 0])
        .collect();
    assert_eq!(black, (5..13).collect::<Vec<_>>());
}

#[test]
fn test_scale_bar_clipped_to_width() {
    let image = DynamicImage::ImageLuma8(particle_image());
    let annotated = annotate_with_scale_bar(&image, 0.1, 100.0);
    let bar_y = 20 + SCALE_STRIP_HEIGHT / 2;
    assert_eq!(annotated.get_pixel(19, bar_y).0, [0, 0, 0]);
    assert_eq!(scale_bar_length(0.5, 10.0), 20);
    assert_eq!(scale_bar_length(100.0, 10.0), 1);
}

#[test]
fn test_image_file_name_strips_sample_prefix_once() {
    let dir = TempDir::new().unwrap();
    for name in ["7.png", "s_1_8.png"] {
        particle_image().save(dir.path().join(name)).unwrap();
    }
    let mut table = FeatureTable::from_rows(vec![
        FeatureRow::keyed("object_id", "s_1_7"),
        FeatureRow::keyed("object_id", "s_1_s_1_8"),
    ]);
    derive_image_columns(&mut table, "s_1", dir.path()).unwrap();

    assert_eq!(table.cell(0, "img_file_name"), Some(&Cell::from("7.png")));
    assert_eq!(table.cell(1, "img_file_name"), Some(&Cell::from("s_1_8.png")));
    assert_eq!(table.cell(1, "img_rank"), Some(&Cell::Int(0)));
}

#[test]
fn test_merge_keeps_objects_without_image_features() {
    let (_dir, project) = project_with_artifacts(&["s1"]);
    let cyto = FeatureTable::from_rows((1..=3).map(|p| object_row("s1", p, p as f64)));
    write_parquet(&cyto, &project.cytometric_artifact("s1")).unwrap();

    let merged = merge_sample(&project, "s1", &metadata_table(&["s1"]), None).unwrap();

    assert_eq!(merged.num_rows(), 3);
    assert_eq!(merged.cell(1, "object_area"), Some(&Cell::Int(64)));
    assert_eq!(merged.cell(2, "object_area"), Some(&Cell::Null));
    assert_eq!(merged.cell(2, "object_FWS_p0"), Some(&Cell::Null));
    assert_eq!(merged.cell(2, "acq_pixel_size"), Some(&Cell::Float(0.5)));
}

#[test]
fn test_merge_joins_custom_metadata() {
    let (_dir, project) = project_with_artifacts(&["s1"]);
    std::fs::create_dir_all(project.meta_dir()).unwrap();
    std::fs::write(project.samples_csv(), "sample_id,object_lat,object_lon\ns0,1,2\ns1,43.7,\n").unwrap();

    let custom = load_custom_metadata(&project).unwrap().unwrap();
    let merged = merge_sample(&project, "s1", &metadata_table(&["s1"]), Some(&custom)).unwrap();

    assert_eq!(merged.cell(0, "object_lat"), Some(&Cell::Float(43.7)));
    assert_eq!(merged.cell(1, "object_lon"), Some(&Cell::Null));
}

#[test]
fn test_custom_metadata_keeps_leading_zero_sample_id() {
    let (_dir, project) = project_with_artifacts(&["001"]);
    std::fs::create_dir_all(project.meta_dir()).unwrap();
    std::fs::write(project.samples_csv(), "sample_id,object_lat\n001,43.5\n").unwrap();

    let custom = load_custom_metadata(&project).unwrap().unwrap();
    assert_eq!(custom.cell(0, "sample_id"), Some(&Cell::from("001")));

    let merged = merge_sample(&project, "001", &metadata_table(&["001"]), Some(&custom)).unwrap();
    assert_eq!(merged.cell(0, "object_lat"), Some(&Cell::Float(43.5)));
    assert_eq!(merged.cell(1, "object_lat"), Some(&Cell::Float(43.5)));
}

#[test]
fn test_preflight_names_missing_artifact_and_command() {
    let (_dir, project) = project_with_artifacts(&["s1", "s2"]);
    std::fs::remove_file(project.pulses_artifact("s2")).unwrap();

    let err = prepare(&project, &ExportSettings::default(), None, ExportOptions::default()).unwrap_err();
    let ExportError::Preflight(report) = err else {
        panic!("expected preflight failure");
    };

    assert_eq!(report.failure_count(), 1);
    let failure = report.failures().next().unwrap();
    assert_eq!(failure.name, "s2: pulse features");
    let CheckStatus::Failed(message) = &failure.status else {
        unreachable!()
    };
    assert!(message.contains("cytoprocess --sample s2 summarise-pulses"));
    assert!(report.to_string().contains("1 missing"));

    // Nothing written for the complete sample either
    assert!(!project.export_zip("s1").exists());
}

#[test]
fn test_preflight_without_metadata_artifact() {
    let dir = TempDir::new().unwrap();
    let project = Project::new(dir.path());

    let report = preflight(&project, &[], None);
    assert!(report.has_failures());
    assert!(report.to_string().contains("extract-meta"));
}

#[test]
fn test_batch_samples_from_metadata() {
    let metadata = metadata_table(&["b", "a", "b"]);
    assert_eq!(batch_samples(Some(&metadata), None), vec!["b", "a"]);
    assert_eq!(batch_samples(Some(&metadata), Some("z")), vec!["z"]);
    assert!(batch_samples(None, None).is_empty());
}

#[test]
fn test_prepare_tsv_and_skip_existing() {
    let (_dir, project) = project_with_artifacts(&["s1"]);
    let options = ExportOptions {
        force: false,
        only_tsv: true,
    };

    let summary = prepare(&project, &ExportSettings::default(), None, options).unwrap();
    assert_eq!(summary.written, vec!["s1"]);

    let tsv = project.export_tsv("s1");
    let lines = tsv_lines(&tsv);
    assert_eq!(lines.len(), 4);
    let header: Vec<&str> = lines[0].split('\t').collect();
    assert_eq!(&header[..3], &["img_file_name", "img_rank", "object_id"]);
    assert_eq!(*header.last().unwrap(), "sample_name");
    assert!(lines[1].split('\t').all(|t| t == "[f]" || t == "[t]"));
    assert!(lines[2].starts_with("1.png\t0\ts1_1\t"));

    let before = std::fs::read(&tsv).unwrap();
    let summary = prepare(&project, &ExportSettings::default(), None, options).unwrap();
    assert_eq!(summary.skipped, vec!["s1"]);
    assert_eq!(std::fs::read(&tsv).unwrap(), before);
}

#[test]
fn test_prepare_bundle_archive() {
    let (_dir, project) = project_with_artifacts(&["s1"]);

    let summary = prepare(&project, &ExportSettings::default(), Some("s1"), ExportOptions::default()).unwrap();
    assert_eq!(summary.written, vec!["s1"]);

    let mut archive = zip::ZipArchive::new(File::open(project.export_zip("s1")).unwrap()).unwrap();
    let mut names: Vec<String> = archive.file_names().map(str::to_string).collect();
    names.sort();
    assert_eq!(names, vec!["1.png", "2.png", "ecotaxa_s1.tsv"]);

    let mut png = Vec::new();
    std::io::Read::read_to_end(&mut archive.by_name("1.png").unwrap(), &mut png).unwrap();
    let annotated = image::load_from_memory(&png).unwrap();
    assert_eq!(annotated.height(), 20 + SCALE_STRIP_HEIGHT);

    // Only the archive remains
    let entries: Vec<_> = std::fs::read_dir(project.ecotaxa_dir()).unwrap().collect();
    assert_eq!(entries.len(), 1);
}

#[test]
fn test_missing_pixel_size_skips_sample() {
    let (_dir, project) = project_with_artifacts(&["s1"]);
    let settings = ExportSettings {
        pixel_size_column: "acq_missing".to_string(),
        ..ExportSettings::default()
    };

    let summary = prepare(&project, &settings, None, ExportOptions::default()).unwrap();
    assert!(summary.written.is_empty());
    assert_eq!(summary.failed.len(), 1);
    assert!(summary.failed[0].1.contains("acq_missing"));
    assert!(!project.export_zip("s1").exists());
}

#[test]
fn test_unreadable_image_skips_sample() {
    let (_dir, project) = project_with_artifacts(&["s1"]);
    std::fs::write(project.image_dir("s1").join("2.png"), b"not a png").unwrap();

    let summary = prepare(&project, &ExportSettings::default(), None, ExportOptions::default()).unwrap();
    assert_eq!(summary.failed.len(), 1);
    assert!(summary.failed[0].1.contains("2.png"));
}

#[test]
fn test_object_without_image_is_bundled_without_one() {
    let (_dir, project) = project_with_artifacts(&["s1"]);
    std::fs::remove_file(project.image_dir("s1").join("2.png")).unwrap();

    let summary = prepare(&project, &ExportSettings::default(), None, ExportOptions::default()).unwrap();
    assert_eq!(summary.written, vec!["s1"]);
    assert!(summary.failed.is_empty());

    let archive = zip::ZipArchive::new(File::open(project.export_zip("s1")).unwrap()).unwrap();
    let mut names: Vec<String> = archive.file_names().map(str::to_string).collect();
    names.sort();
    assert_eq!(names, vec!["1.png", "ecotaxa_s1.tsv"]);

    prepare(
        &project,
        &ExportSettings::default(),
        None,
        ExportOptions { force: true, only_tsv: true },
    )
    .unwrap();
    let lines = tsv_lines(&project.export_tsv("s1"));
    let header: Vec<&str> = lines[0].split('\t').collect();
    let file = header.iter().position(|c| *c == "img_file_name").unwrap();
    let rank = header.iter().position(|c| *c == "img_rank").unwrap();
    let second: Vec<&str> = lines[3].split('\t').collect();
    assert_eq!(second[file], "");
    assert_eq!(second[rank], "");
    assert_eq!(lines[2].split('\t').nth(file), Some("1.png"));
}
