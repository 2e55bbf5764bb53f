use crate::calc;
use crate::ipc::error::ok;
use crate::ipc::helpers::{db_conn, get_required_str, HandlerErr};
use crate::ipc::types::{AppState, Request};
use crate::store;
use rusqlite::Connection;
use serde_json::json;
use std::collections::HashMap;

/// Tabular view of one assessment: a row per student, a column per
/// criterion, plus the raw total and the scaled-to-100 score. The scaled
/// value is exactly the aggregation percentage; an ungraded student has a
/// null scaled value rendered as an em dash, never "0.00".
fn score_table(conn: &Connection, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let assessment_id = get_required_str(params, "assessmentId")?;
    let class_id = store::assessment_class(conn, &assessment_id)?;
    let assessment = store::assessment(conn, &assessment_id)?;
    let criteria = store::criteria_for_assessment(conn, &assessment_id)?;
    let roster = store::students_for_class(conn, &class_id)?;
    let scores = store::scores_for_assessment(conn, &assessment_id)?;

    let mut by_pair: HashMap<(&str, &str), f64> = HashMap::new();
    for row in &scores {
        by_pair.insert((row.student_id.as_str(), row.criterion_id.as_str()), row.score);
    }

    let columns = criteria
        .iter()
        .map(|c| {
            json!({
                "criterionId": c.id,
                "description": c.description,
                "maxScore": c.max_score
            })
        })
        .collect::<Vec<_>>();

    let mut rows = Vec::with_capacity(roster.len());
    for s in &roster {
        let mut cells = Vec::with_capacity(criteria.len());
        let mut scored: Vec<calc::ScoredCriterion> = Vec::new();
        for c in &criteria {
            match by_pair.get(&(s.id.as_str(), c.id.as_str())) {
                Some(v) => {
                    cells.push(json!(v));
                    scored.push(calc::ScoredCriterion {
                        criterion_id: c.id.clone(),
                        score: *v,
                        max_score: c.max_score,
                    });
                }
                None => cells.push(serde_json::Value::Null),
            }
        }
        let total_raw: f64 = scored.iter().map(|sc| sc.score).sum();
        let scaled = calc::assessment_percentage(&scored);
        rows.push(json!({
            "studentId": s.id,
            "displayName": s.name,
            "scores": cells,
            "totalRaw": total_raw,
            "scaled": scaled.map(calc::round2),
            "scaledDisplay": match scaled {
                Some(v) => format!("{:.2}", v),
                None => "—".to_string(),
            }
        }));
    }

    Ok(json!({
        "assessment": {
            "id": assessment.id,
            "name": assessment.name,
            "date": assessment.date,
            "kind": assessment.kind
        },
        "columns": columns,
        "rows": rows
    }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "reports.scoreTable" => {
            let conn = match db_conn(state, &req.id) {
                Ok(v) => v,
                Err(e) => return Some(e),
            };
            Some(match score_table(conn, &req.params) {
                Ok(result) => ok(&req.id, result),
                Err(error) => error.response(&req.id),
            })
        }
        _ => None,
    }
}
