
use serde_json::json;
use test_support::{
    create_assessment, create_class, create_criterion, create_student, request_err_code,
    request_ok, select_workspace, set_score, spawn_sidecar, temp_dir,
};

#[test]
fn deleting_a_student_cascades_scores_and_attendance() {
    let workspace = temp_dir("gradebook-student-delete");
    let (_child, mut stdin, mut reader) = spawn_sidecar();
    select_workspace(&mut stdin, &mut reader, &workspace);

    let class_id = create_class(&mut stdin, &mut reader, "8D Math");
    let keep = create_student(&mut stdin, &mut reader, &class_id, "Keep");
    let gone = create_student(&mut stdin, &mut reader, &class_id, "Gone");

    let assessment_id = create_assessment(
        &mut stdin,
        &mut reader,
        json!({ "classId": class_id, "name": "Quiz 1", "kind": "formative" }),
    );
    let c = create_criterion(&mut stdin, &mut reader, &assessment_id, "Total", 10.0);
    set_score(&mut stdin, &mut reader, &keep, &c, 8.0);
    set_score(&mut stdin, &mut reader, &gone, &c, 2.0);
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "att",
        "attendance.record",
        json!({ "studentId": gone, "meetingDate": "2025-03-03", "status": "present" }),
    );

    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "del",
        "students.delete",
        json!({ "studentId": gone }),
    );

    let students = request_ok(
        &mut stdin,
        &mut reader,
        "list",
        "students.list",
        json!({ "classId": class_id }),
    );
    assert_eq!(
        students
            .get("students")
            .and_then(|v| v.as_array())
            .map(|a| a.len()),
        Some(1)
    );

    // The departed student's marks no longer shape the statistics.
    let stats = request_ok(
        &mut stdin,
        &mut reader,
        "stats",
        "analytics.classStatistics",
        json!({ "classId": class_id }),
    );
    assert_eq!(stats.get("classAverage").and_then(|v| v.as_f64()), Some(80.0));

    let code = request_err_code(
        &mut stdin,
        &mut reader,
        "gone",
        "attendance.studentSummary",
        json!({ "studentId": gone, "from": "2025-03-01", "to": "2025-03-31" }),
    );
    assert_eq!(code, "not_found");
}

#[test]
fn deleting_an_assessment_cascades_criteria_and_scores() {
    let workspace = temp_dir("gradebook-assessment-delete");
    let (_child, mut stdin, mut reader) = spawn_sidecar();
    select_workspace(&mut stdin, &mut reader, &workspace);

    let class_id = create_class(&mut stdin, &mut reader, "8D Math");
    let student = create_student(&mut stdin, &mut reader, &class_id, "Aisha");

    let keep = create_assessment(
        &mut stdin,
        &mut reader,
        json!({ "classId": class_id, "name": "Quiz 1", "kind": "formative" }),
    );
    let keep_c = create_criterion(&mut stdin, &mut reader, &keep, "Total", 10.0);
    set_score(&mut stdin, &mut reader, &student, &keep_c, 6.0);

    let gone = create_assessment(
        &mut stdin,
        &mut reader,
        json!({ "classId": class_id, "name": "Quiz 2", "kind": "formative" }),
    );
    let gone_c = create_criterion(&mut stdin, &mut reader, &gone, "Total", 10.0);
    set_score(&mut stdin, &mut reader, &student, &gone_c, 10.0);

    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "del",
        "assessments.delete",
        json!({ "assessmentId": gone }),
    );

    let stats = request_ok(
        &mut stdin,
        &mut reader,
        "stats",
        "analytics.classStatistics",
        json!({ "classId": class_id }),
    );
    assert_eq!(stats.get("classAverage").and_then(|v| v.as_f64()), Some(60.0));
    assert_eq!(stats.get("assessmentCount").and_then(|v| v.as_u64()), Some(1));
}

#[test]
fn class_statistics_can_be_scoped_to_an_assessment_subset() {
    let workspace = temp_dir("gradebook-stats-subset");
    let (_child, mut stdin, mut reader) = spawn_sidecar();
    select_workspace(&mut stdin, &mut reader, &workspace);

    let class_id = create_class(&mut stdin, &mut reader, "8D Math");
    let student = create_student(&mut stdin, &mut reader, &class_id, "Aisha");

    let a1 = create_assessment(
        &mut stdin,
        &mut reader,
        json!({ "classId": class_id, "name": "Quiz 1", "kind": "formative" }),
    );
    let c1 = create_criterion(&mut stdin, &mut reader, &a1, "Total", 10.0);
    set_score(&mut stdin, &mut reader, &student, &c1, 6.0);

    let a2 = create_assessment(
        &mut stdin,
        &mut reader,
        json!({ "classId": class_id, "name": "Quiz 2", "kind": "formative" }),
    );
    let c2 = create_criterion(&mut stdin, &mut reader, &a2, "Total", 10.0);
    set_score(&mut stdin, &mut reader, &student, &c2, 10.0);

    let scoped = request_ok(
        &mut stdin,
        &mut reader,
        "scoped",
        "analytics.classStatistics",
        json!({ "classId": class_id, "assessmentIds": [a2] }),
    );
    assert_eq!(scoped.get("classAverage").and_then(|v| v.as_f64()), Some(100.0));

    let code = request_err_code(
        &mut stdin,
        &mut reader,
        "bad",
        "analytics.classStatistics",
        json!({ "classId": class_id, "assessmentIds": ["nonexistent"] }),
    );
    assert_eq!(code, "bad_params");
}
