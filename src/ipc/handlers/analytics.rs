use crate::calc;
use crate::ipc::error::ok;
use crate::ipc::helpers::{db_conn, get_id_list, get_required_str, HandlerErr};
use crate::ipc::types::{AppState, Request};
use crate::store;
use rusqlite::Connection;
use serde_json::json;
use std::collections::HashSet;

/// Resolves the assessment set for a class query. When `assessmentIds` is
/// given, every id must belong to the class.
fn selected_assessments(
    conn: &Connection,
    class_id: &str,
    assessment_ids: Option<&[String]>,
) -> Result<Vec<store::AssessmentRow>, HandlerErr> {
    let all = store::assessments_for_class(conn, class_id)?;
    let Some(ids) = assessment_ids else {
        return Ok(all);
    };
    let known: HashSet<&str> = all.iter().map(|a| a.id.as_str()).collect();
    let missing: Vec<&String> = ids.iter().filter(|id| !known.contains(id.as_str())).collect();
    if !missing.is_empty() {
        return Err(HandlerErr {
            code: "bad_params",
            message: "assessmentIds contains ids not in this class".to_string(),
            details: Some(json!({ "missingAssessmentIds": missing })),
        });
    }
    let wanted: HashSet<&str> = ids.iter().map(|s| s.as_str()).collect();
    Ok(all
        .into_iter()
        .filter(|a| wanted.contains(a.id.as_str()))
        .collect())
}

/// One percentage per (student, assessment) over the selected set, folded
/// into per-student lists in roster order. Undefined percentages simply do
/// not appear.
fn student_percents(
    conn: &Connection,
    class_id: &str,
    assessments: &[store::AssessmentRow],
) -> Result<Vec<calc::StudentPercents>, HandlerErr> {
    let roster = store::students_for_class(conn, class_id)?;
    let mut out: Vec<calc::StudentPercents> = roster
        .iter()
        .map(|s| calc::StudentPercents {
            student_id: s.id.clone(),
            display_name: s.name.clone(),
            percents: Vec::new(),
        })
        .collect();

    for a in assessments {
        let by_student = store::percentages_by_student(conn, &a.id)?;
        for sp in out.iter_mut() {
            if let Some(pct) = by_student.get(&sp.student_id) {
                sp.percents.push(*pct);
            }
        }
    }
    Ok(out)
}

fn handle_assessment_percentage(
    conn: &Connection,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let student_id = get_required_str(params, "studentId")?;
    let assessment_id = get_required_str(params, "assessmentId")?;
    let student_class = store::student_class(conn, &student_id)?;
    let assessment_class = store::assessment_class(conn, &assessment_id)?;
    if student_class != assessment_class {
        return Err(HandlerErr::new(
            "bad_params",
            "student and assessment belong to different classes",
        ));
    }

    let percentage = store::percentages_by_student(conn, &assessment_id)?
        .get(&student_id)
        .copied();
    // null means "no criteria graded yet": undefined, not zero.
    Ok(json!({
        "studentId": student_id,
        "assessmentId": assessment_id,
        "percentage": percentage.map(calc::round2)
    }))
}

fn handle_final_grade(
    conn: &Connection,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let student_id = get_required_str(params, "studentId")?;
    let class_id = get_required_str(params, "classId")?;
    store::class_exists(conn, &class_id)?;
    if store::student_class(conn, &student_id)? != class_id {
        return Err(HandlerErr::new(
            "bad_params",
            "student does not belong to this class",
        ));
    }

    let assessments = store::assessments_for_class(conn, &class_id)?;
    let mut percents: Vec<calc::CategorizedPercent> = Vec::new();
    for a in &assessments {
        let by_student = store::percentages_by_student(conn, &a.id)?;
        if let Some(pct) = by_student.get(&student_id) {
            percents.push(calc::CategorizedPercent {
                assessment_id: a.id.clone(),
                weight_category_id: a.weight_category_id.clone(),
                percent: *pct,
            });
        }
    }

    // Settings may have changed since last validated; the engine re-checks.
    let settings = store::weight_settings(conn, &class_id)?;
    let fg = calc::final_grade(&percents, &settings)?;

    let per_category = fg
        .per_category
        .iter()
        .map(|c| {
            json!({
                "weightCategoryId": c.weight_category_id,
                "name": c.name,
                "weightPercent": c.weight_percent,
                "average": c.average.map(calc::round2),
                "assessmentCount": c.assessment_count
            })
        })
        .collect::<Vec<_>>();
    let warnings = fg
        .warnings
        .iter()
        .map(|w| json!({ "code": w.code, "weightCategoryId": w.weight_category_id }))
        .collect::<Vec<_>>();

    Ok(json!({
        "studentId": student_id,
        "classId": class_id,
        "finalGrade": calc::round2(fg.grade),
        "perCategory": per_category,
        "warnings": warnings
    }))
}

fn handle_class_statistics(
    conn: &Connection,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let class_id = get_required_str(params, "classId")?;
    store::class_exists(conn, &class_id)?;
    let ids = get_id_list(params, "assessmentIds")?;
    let assessments = selected_assessments(conn, &class_id, ids.as_deref())?;
    let percents = student_percents(conn, &class_id, &assessments)?;
    let stats = calc::class_statistics(&percents);

    let ranked = stats
        .ranked
        .iter()
        .map(|r| {
            json!({
                "studentId": r.student_id,
                "displayName": r.display_name,
                "average": calc::round2(r.average)
            })
        })
        .collect::<Vec<_>>();

    Ok(json!({
        "classId": class_id,
        "assessmentCount": assessments.len(),
        "classAverage": stats.class_average.map(calc::round2),
        "max": stats.max.map(calc::round2),
        "min": stats.min.map(calc::round2),
        "rankedStudents": ranked,
        "scoredStudentCount": stats.scored_student_count,
        "unscoredStudentCount": stats.unscored_student_count
    }))
}

fn handle_student_trend(
    conn: &Connection,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let student_id = get_required_str(params, "studentId")?;
    let class_id = store::student_class(conn, &student_id)?;
    let ids = get_id_list(params, "assessmentIds")?;
    let assessments = selected_assessments(conn, &class_id, ids.as_deref())?;

    let mut points: Vec<calc::TrendPoint> = Vec::new();
    let mut undated = 0usize;
    for a in &assessments {
        let by_student = store::percentages_by_student(conn, &a.id)?;
        let Some(pct) = by_student.get(&student_id) else {
            continue;
        };
        // A point needs a date to sit on the time axis.
        let Some(date) = a.date.clone() else {
            undated += 1;
            continue;
        };
        points.push(calc::TrendPoint {
            assessment_id: a.id.clone(),
            date,
            percent: *pct,
        });
    }

    let series = calc::TrendSeries::new(points);
    let points_json = series
        .iter()
        .map(|p| {
            json!({
                "assessmentId": p.assessment_id,
                "date": p.date,
                "percent": calc::round2(p.percent)
            })
        })
        .collect::<Vec<_>>();

    Ok(json!({
        "studentId": student_id,
        "classId": class_id,
        "points": points_json,
        "undatedSkippedCount": undated
    }))
}

fn handle_compare_classes(
    conn: &Connection,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let class_a = get_required_str(params, "classIdA")?;
    let class_b = get_required_str(params, "classIdB")?;
    store::class_exists(conn, &class_a)?;
    store::class_exists(conn, &class_b)?;

    let assessments_a = store::assessments_for_class(conn, &class_a)?;
    let assessments_b = store::assessments_for_class(conn, &class_b)?;
    let stats_a = calc::class_statistics(&student_percents(conn, &class_a, &assessments_a)?);
    let stats_b = calc::class_statistics(&student_percents(conn, &class_b, &assessments_b)?);
    let cmp = calc::comparative_averages(&stats_a, &stats_b);

    Ok(json!({
        "classA": { "classId": class_a, "classAverage": cmp.average_a.map(calc::round2) },
        "classB": { "classId": class_b, "classAverage": cmp.average_b.map(calc::round2) },
        "difference": cmp.difference.map(calc::round2)
    }))
}

fn handle_relational_pairs(
    conn: &Connection,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let assessment_id = get_required_str(params, "assessmentId")?;
    let criterion_a = get_required_str(params, "criterionIdA")?;
    let criterion_b = get_required_str(params, "criterionIdB")?;
    if criterion_a == criterion_b {
        return Err(HandlerErr::new(
            "bad_params",
            "criterionIdA and criterionIdB must differ",
        ));
    }
    store::assessment_class(conn, &assessment_id)?;
    let criteria = store::criteria_for_assessment(conn, &assessment_id)?;
    for wanted in [&criterion_a, &criterion_b] {
        if !criteria.iter().any(|c| &c.id == wanted) {
            return Err(HandlerErr {
                code: "not_found",
                message: "criterion not in this assessment".to_string(),
                details: Some(json!({ "criterionId": wanted })),
            });
        }
    }

    let rows = store::raw_scores_for_criteria(conn, &assessment_id, &criterion_a, &criterion_b)?;
    let pairs = calc::relational_pairs(&rows, &criterion_a, &criterion_b)
        .into_iter()
        .map(|(x, y)| json!({ "x": x, "y": y }))
        .collect::<Vec<_>>();

    Ok(json!({
        "assessmentId": assessment_id,
        "criterionIdA": criterion_a,
        "criterionIdB": criterion_b,
        "pairs": pairs
    }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let run = |f: &dyn Fn(&Connection, &serde_json::Value) -> Result<serde_json::Value, HandlerErr>| {
        let conn = match db_conn(state, &req.id) {
            Ok(v) => v,
            Err(e) => return e,
        };
        match f(conn, &req.params) {
            Ok(result) => ok(&req.id, result),
            Err(error) => error.response(&req.id),
        }
    };

    match req.method.as_str() {
        "analytics.assessmentPercentage" => Some(run(&handle_assessment_percentage)),
        "analytics.finalGrade" => Some(run(&handle_final_grade)),
        "analytics.classStatistics" => Some(run(&handle_class_statistics)),
        "analytics.studentTrend" => Some(run(&handle_student_trend)),
        "analytics.compareClasses" => Some(run(&handle_compare_classes)),
        "analytics.relationalPairs" => Some(run(&handle_relational_pairs)),
        _ => None,
    }
}
