
use serde_json::json;
use test_support::{
    create_assessment, create_class, create_criterion, create_student, request_ok,
    select_workspace, set_score, spawn_sidecar, temp_dir,
};

#[test]
fn unscored_students_are_excluded_from_the_class_average() {
    let workspace = temp_dir("gradebook-class-stats");
    let (_child, mut stdin, mut reader) = spawn_sidecar();
    select_workspace(&mut stdin, &mut reader, &workspace);

    let class_id = create_class(&mut stdin, &mut reader, "8D Math");
    let x = create_student(&mut stdin, &mut reader, &class_id, "X");
    let _y = create_student(&mut stdin, &mut reader, &class_id, "Y");

    let assessment_id = create_assessment(
        &mut stdin,
        &mut reader,
        json!({ "classId": class_id, "name": "Quiz 1", "kind": "formative" }),
    );
    let c = create_criterion(&mut stdin, &mut reader, &assessment_id, "Total", 10.0);
    set_score(&mut stdin, &mut reader, &x, &c, 8.0);

    let stats = request_ok(
        &mut stdin,
        &mut reader,
        "stats",
        "analytics.classStatistics",
        json!({ "classId": class_id }),
    );
    // X averages 80, Y has nothing recorded: average is 80, not 40.
    assert_eq!(stats.get("classAverage").and_then(|v| v.as_f64()), Some(80.0));
    assert_eq!(stats.get("scoredStudentCount").and_then(|v| v.as_u64()), Some(1));
    assert_eq!(stats.get("unscoredStudentCount").and_then(|v| v.as_u64()), Some(1));
    let ranked = stats
        .get("rankedStudents")
        .and_then(|v| v.as_array())
        .expect("ranked");
    assert_eq!(ranked.len(), 1);
    assert_eq!(
        ranked[0].get("studentId").and_then(|v| v.as_str()),
        Some(x.as_str())
    );
}

#[test]
fn ranking_is_descending_and_stable_for_ties() {
    let workspace = temp_dir("gradebook-ranking");
    let (_child, mut stdin, mut reader) = spawn_sidecar();
    select_workspace(&mut stdin, &mut reader, &workspace);

    let class_id = create_class(&mut stdin, &mut reader, "8D Math");
    let first = create_student(&mut stdin, &mut reader, &class_id, "First");
    let second = create_student(&mut stdin, &mut reader, &class_id, "Second");
    let third = create_student(&mut stdin, &mut reader, &class_id, "Third");

    let assessment_id = create_assessment(
        &mut stdin,
        &mut reader,
        json!({ "classId": class_id, "name": "Quiz 1", "kind": "formative" }),
    );
    let c = create_criterion(&mut stdin, &mut reader, &assessment_id, "Total", 10.0);
    set_score(&mut stdin, &mut reader, &first, &c, 8.5);
    set_score(&mut stdin, &mut reader, &second, &c, 8.5);
    set_score(&mut stdin, &mut reader, &third, &c, 9.2);

    let stats = request_ok(
        &mut stdin,
        &mut reader,
        "stats",
        "analytics.classStatistics",
        json!({ "classId": class_id }),
    );
    let ranked = stats
        .get("rankedStudents")
        .and_then(|v| v.as_array())
        .expect("ranked");
    let ids: Vec<&str> = ranked
        .iter()
        .filter_map(|r| r.get("studentId").and_then(|v| v.as_str()))
        .collect();
    // Descending by average; the tied pair keeps roster order.
    assert_eq!(ids, vec![third.as_str(), first.as_str(), second.as_str()]);
    assert_eq!(stats.get("max").and_then(|v| v.as_f64()), Some(92.0));
    assert_eq!(stats.get("min").and_then(|v| v.as_f64()), Some(85.0));
}

#[test]
fn every_student_counts_once_regardless_of_assessment_count() {
    let workspace = temp_dir("gradebook-two-level");
    let (_child, mut stdin, mut reader) = spawn_sidecar();
    select_workspace(&mut stdin, &mut reader, &workspace);

    let class_id = create_class(&mut stdin, &mut reader, "8D Math");
    let many = create_student(&mut stdin, &mut reader, &class_id, "Many");
    let few = create_student(&mut stdin, &mut reader, &class_id, "Few");

    // Four assessments scored for one student, one for the other.
    let mut first_criterion = None;
    for i in 0..4 {
        let assessment_id = create_assessment(
            &mut stdin,
            &mut reader,
            json!({ "classId": class_id, "name": format!("Quiz {}", i + 1), "kind": "formative" }),
        );
        let c = create_criterion(&mut stdin, &mut reader, &assessment_id, "Total", 10.0);
        set_score(&mut stdin, &mut reader, &many, &c, 10.0);
        if first_criterion.is_none() {
            first_criterion = Some(c);
        }
    }
    set_score(
        &mut stdin,
        &mut reader,
        &few,
        first_criterion.as_ref().expect("criterion"),
        5.0,
    );

    let stats = request_ok(
        &mut stdin,
        &mut reader,
        "stats",
        "analytics.classStatistics",
        json!({ "classId": class_id }),
    );
    // Two-level averaging: (100 + 50) / 2, not a flat sum over all rows.
    assert_eq!(stats.get("classAverage").and_then(|v| v.as_f64()), Some(75.0));
}
