use std::fs;

use strato_traj::{
    convert_lat_lon_to_cartesian, default_obj_path, export_obj_file, spiral_trajectories,
    MultiVarHistograms, TrajError, DEFAULT_BUCKETS,
};

#[test]
fn exported_file_round_trips_vertex_count() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("spirals.obj");
    let set = spiral_trajectories(4, 10);

    let summary = export_obj_file(&set, &path).unwrap();
    assert_eq!(summary.lines, 4);
    assert_eq!(summary.vertices, 40);

    let text = fs::read_to_string(&path).unwrap();
    assert_eq!(text.lines().filter(|l| l.starts_with("v ")).count(), 40);
    assert_eq!(text.lines().filter(|l| l.starts_with("vt ")).count(), 40);
    assert_eq!(text.lines().filter(|l| l.starts_with("g line")).count(), 4);

    // The last polyline references the last exported vertex
    let last_l = text.lines().filter(|l| l.starts_with("l ")).last().unwrap();
    assert!(last_l.ends_with(" 40"));
    assert!(last_l.starts_with("l 31 "));
}

#[test]
fn short_trajectories_are_not_exported() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("short.obj");

    // One point per trajectory survives
    let lat = [0.0, 10.0, 20.0, 30.0];
    let lon = [0.0; 4];
    let pressure = [900.0, -1.0, -1.0, 300.0];
    let set = convert_lat_lon_to_cartesian(&lat, &lon, &pressure, 2, 2);
    assert_eq!(set.len(), 2);

    let err = export_obj_file(&set, &path).unwrap_err();
    assert!(matches!(err, TrajError::EmptyInput));
    assert!(!path.exists());
}

#[test]
fn unwritable_path_reports_export_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("missing").join("out.obj");
    let err = export_obj_file(&spiral_trajectories(1, 3), &path).unwrap_err();
    match err {
        TrajError::Export { path: reported, .. } => assert_eq!(reported, path),
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn default_path_sits_next_to_input() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("run_2019.nc");
    assert_eq!(default_obj_path(&input), dir.path().join("run_2019.obj"));
}

#[test]
fn histogram_of_converted_pressure_is_normalized() {
    let set = spiral_trajectories(8, 25);
    let model = MultiVarHistograms::new(set.attribute_series());
    let (series, histogram) = model.current().unwrap();

    assert_eq!(series.name, "pressure");
    assert_eq!(series.min, 100.0);
    assert_eq!(series.max, 1000.0);
    assert_eq!(histogram.len(), DEFAULT_BUCKETS);
    assert!(histogram.iter().all(|b| (0.0..=1.0).contains(b)));
    assert!(histogram.iter().any(|b| *b == 1.0));
}
