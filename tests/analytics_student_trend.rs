
use serde_json::json;
use test_support::{
    create_assessment, create_class, create_criterion, create_student, request_ok,
    select_workspace, set_score, spawn_sidecar, temp_dir,
};

#[test]
fn trend_points_come_back_in_chronological_order() {
    let workspace = temp_dir("gradebook-trend");
    let (_child, mut stdin, mut reader) = spawn_sidecar();
    select_workspace(&mut stdin, &mut reader, &workspace);

    let class_id = create_class(&mut stdin, &mut reader, "8D Math");
    let student = create_student(&mut stdin, &mut reader, &class_id, "Aisha");

    // Created out of date order on purpose.
    for (name, date, score) in [
        ("Midterm", "2025-03-15", 7.0_f64),
        ("Quiz 1", "2025-02-01", 6.0),
        ("Quiz 2", "2025-02-20", 8.0),
    ] {
        let assessment_id = create_assessment(
            &mut stdin,
            &mut reader,
            json!({ "classId": class_id, "name": name, "kind": "formative", "date": date }),
        );
        let c = create_criterion(&mut stdin, &mut reader, &assessment_id, "Total", 10.0);
        set_score(&mut stdin, &mut reader, &student, &c, score);
    }
    // Undated and unscored assessments both stay out of the series.
    let undated = create_assessment(
        &mut stdin,
        &mut reader,
        json!({ "classId": class_id, "name": "Draft", "kind": "formative" }),
    );
    let c = create_criterion(&mut stdin, &mut reader, &undated, "Total", 10.0);
    set_score(&mut stdin, &mut reader, &student, &c, 9.0);
    let _unscored = create_assessment(
        &mut stdin,
        &mut reader,
        json!({ "classId": class_id, "name": "Final", "kind": "summative", "date": "2025-06-01" }),
    );

    let trend = request_ok(
        &mut stdin,
        &mut reader,
        "trend",
        "analytics.studentTrend",
        json!({ "studentId": student }),
    );
    let points = trend.get("points").and_then(|v| v.as_array()).expect("points");
    assert_eq!(points.len(), 3);
    let dates: Vec<&str> = points
        .iter()
        .filter_map(|p| p.get("date").and_then(|v| v.as_str()))
        .collect();
    assert_eq!(dates, vec!["2025-02-01", "2025-02-20", "2025-03-15"]);
    let percents: Vec<f64> = points
        .iter()
        .filter_map(|p| p.get("percent").and_then(|v| v.as_f64()))
        .collect();
    assert_eq!(percents, vec![60.0, 80.0, 70.0]);
    assert_eq!(
        trend.get("undatedSkippedCount").and_then(|v| v.as_u64()),
        Some(1)
    );
}
