use crate::ipc::error::ok;
use crate::ipc::helpers::{
    db_conn, get_optional_str, get_required_f64, get_required_str, parse_iso_date, HandlerErr,
};
use crate::ipc::types::{AppState, Request};
use crate::store;
use rusqlite::{Connection, OptionalExtension};
use serde_json::json;
use uuid::Uuid;

fn assessments_create(conn: &Connection, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let class_id = get_required_str(params, "classId")?;
    let name = get_required_str(params, "name")?;
    let name = name.trim().to_string();
    if name.is_empty() {
        return Err(HandlerErr::new("bad_params", "name must not be empty"));
    }
    let kind = get_required_str(params, "kind")?.to_ascii_lowercase();
    if kind != "formative" && kind != "summative" {
        return Err(HandlerErr {
            code: "bad_params",
            message: "kind must be one of: formative, summative".to_string(),
            details: Some(json!({ "kind": kind })),
        });
    }
    let date = match get_optional_str(params, "date")? {
        Some(d) => Some(parse_iso_date(&d, "date")?),
        None => None,
    };
    let weight_category_id = get_optional_str(params, "weightCategoryId")?;
    store::class_exists(conn, &class_id)?;
    if let Some(cat) = &weight_category_id {
        let found: Option<i64> = conn
            .query_row("SELECT 1 FROM weight_categories WHERE id = ?", [cat], |r| {
                r.get(0)
            })
            .optional()
            .map_err(|e| HandlerErr::new("db_query_failed", e.to_string()))?;
        if found.is_none() {
            return Err(HandlerErr::new("not_found", "weight category not found"));
        }
    }

    let next_sort: i64 = conn
        .query_row(
            "SELECT COALESCE(MAX(sort_order) + 1, 0) FROM assessments WHERE class_id = ?",
            [&class_id],
            |r| r.get(0),
        )
        .map_err(|e| HandlerErr::new("db_query_failed", e.to_string()))?;

    let assessment_id = Uuid::new_v4().to_string();
    conn.execute(
        "INSERT INTO assessments(id, class_id, name, date, kind, weight_category_id, sort_order)
         VALUES(?, ?, ?, ?, ?, ?, ?)",
        (
            &assessment_id,
            &class_id,
            &name,
            &date,
            &kind,
            &weight_category_id,
            next_sort,
        ),
    )
    .map_err(|e| HandlerErr {
        code: "db_insert_failed",
        message: e.to_string(),
        details: Some(json!({ "table": "assessments" })),
    })?;

    Ok(json!({ "assessmentId": assessment_id, "name": name, "sortOrder": next_sort }))
}

fn assessments_list(conn: &Connection, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let class_id = get_required_str(params, "classId")?;
    store::class_exists(conn, &class_id)?;
    let assessments = store::assessments_for_class(conn, &class_id)?
        .into_iter()
        .map(|a| {
            json!({
                "id": a.id,
                "name": a.name,
                "date": a.date,
                "kind": a.kind,
                "weightCategoryId": a.weight_category_id,
                "sortOrder": a.sort_order
            })
        })
        .collect::<Vec<_>>();
    Ok(json!({ "assessments": assessments }))
}

fn assessments_delete(conn: &Connection, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let assessment_id = get_required_str(params, "assessmentId")?;
    store::assessment_class(conn, &assessment_id)?;

    let tx = conn
        .unchecked_transaction()
        .map_err(|e| HandlerErr::new("db_tx_failed", e.to_string()))?;
    let steps: &[(&str, &str)] = &[
        (
            "criterion_scores",
            "DELETE FROM criterion_scores
             WHERE criterion_id IN (SELECT id FROM criteria WHERE assessment_id = ?)",
        ),
        ("criteria", "DELETE FROM criteria WHERE assessment_id = ?"),
        ("assessments", "DELETE FROM assessments WHERE id = ?"),
    ];
    for (table, sql) in steps {
        if let Err(e) = tx.execute(sql, [&assessment_id]) {
            let _ = tx.rollback();
            return Err(HandlerErr {
                code: "db_delete_failed",
                message: e.to_string(),
                details: Some(json!({ "table": table })),
            });
        }
    }
    tx.commit()
        .map_err(|e| HandlerErr::new("db_commit_failed", e.to_string()))?;
    Ok(json!({ "ok": true }))
}

fn criteria_create(conn: &Connection, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let assessment_id = get_required_str(params, "assessmentId")?;
    let description = get_required_str(params, "description")?;
    let max_score = get_required_f64(params, "maxScore")?;
    if max_score <= 0.0 {
        return Err(HandlerErr {
            code: "bad_params",
            message: "maxScore must be > 0".to_string(),
            details: Some(json!({ "maxScore": max_score })),
        });
    }
    store::assessment_class(conn, &assessment_id)?;

    let next_sort: i64 = conn
        .query_row(
            "SELECT COALESCE(MAX(sort_order) + 1, 0) FROM criteria WHERE assessment_id = ?",
            [&assessment_id],
            |r| r.get(0),
        )
        .map_err(|e| HandlerErr::new("db_query_failed", e.to_string()))?;

    let criterion_id = Uuid::new_v4().to_string();
    conn.execute(
        "INSERT INTO criteria(id, assessment_id, description, max_score, sort_order)
         VALUES(?, ?, ?, ?, ?)",
        (&criterion_id, &assessment_id, &description, max_score, next_sort),
    )
    .map_err(|e| HandlerErr {
        code: "db_insert_failed",
        message: e.to_string(),
        details: Some(json!({ "table": "criteria" })),
    })?;

    Ok(json!({ "criterionId": criterion_id, "sortOrder": next_sort }))
}

fn criteria_list(conn: &Connection, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let assessment_id = get_required_str(params, "assessmentId")?;
    store::assessment_class(conn, &assessment_id)?;
    let criteria = store::criteria_for_assessment(conn, &assessment_id)?
        .into_iter()
        .map(|c| {
            json!({
                "id": c.id,
                "description": c.description,
                "maxScore": c.max_score,
                "sortOrder": c.sort_order
            })
        })
        .collect::<Vec<_>>();
    Ok(json!({ "criteria": criteria }))
}

fn criteria_delete(conn: &Connection, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let criterion_id = get_required_str(params, "criterionId")?;
    let exists: Option<i64> = conn
        .query_row("SELECT 1 FROM criteria WHERE id = ?", [&criterion_id], |r| {
            r.get(0)
        })
        .optional()
        .map_err(|e| HandlerErr::new("db_query_failed", e.to_string()))?;
    if exists.is_none() {
        return Err(HandlerErr::new("not_found", "criterion not found"));
    }

    let tx = conn
        .unchecked_transaction()
        .map_err(|e| HandlerErr::new("db_tx_failed", e.to_string()))?;
    for (table, sql) in [
        (
            "criterion_scores",
            "DELETE FROM criterion_scores WHERE criterion_id = ?",
        ),
        ("criteria", "DELETE FROM criteria WHERE id = ?"),
    ] {
        if let Err(e) = tx.execute(sql, [&criterion_id]) {
            let _ = tx.rollback();
            return Err(HandlerErr {
                code: "db_delete_failed",
                message: e.to_string(),
                details: Some(json!({ "table": table })),
            });
        }
    }
    tx.commit()
        .map_err(|e| HandlerErr::new("db_commit_failed", e.to_string()))?;
    Ok(json!({ "ok": true }))
}

/// Records or replaces one raw score. Scores live in [0, maxScore]; removing
/// a score (returning the criterion to "ungraded") goes through scores.clear,
/// never through writing a zero.
fn scores_set(conn: &Connection, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let student_id = get_required_str(params, "studentId")?;
    let criterion_id = get_required_str(params, "criterionId")?;
    let score = get_required_f64(params, "score")?;

    let student_class = store::student_class(conn, &student_id)?;
    let row: Option<(f64, String)> = conn
        .query_row(
            "SELECT c.max_score, a.class_id
             FROM criteria c
             JOIN assessments a ON a.id = c.assessment_id
             WHERE c.id = ?",
            [&criterion_id],
            |r| Ok((r.get(0)?, r.get(1)?)),
        )
        .optional()
        .map_err(|e| HandlerErr::new("db_query_failed", e.to_string()))?;
    let Some((max_score, assessment_class)) = row else {
        return Err(HandlerErr::new("not_found", "criterion not found"));
    };
    if student_class != assessment_class {
        return Err(HandlerErr::new(
            "bad_params",
            "student and criterion belong to different classes",
        ));
    }
    if score < 0.0 || score > max_score {
        return Err(HandlerErr {
            code: "bad_params",
            message: format!("score must be within 0..={}", max_score),
            details: Some(json!({ "score": score, "maxScore": max_score })),
        });
    }

    conn.execute(
        "INSERT INTO criterion_scores(student_id, criterion_id, score)
         VALUES(?, ?, ?)
         ON CONFLICT(student_id, criterion_id) DO UPDATE SET
           score = excluded.score",
        (&student_id, &criterion_id, score),
    )
    .map_err(|e| HandlerErr {
        code: "db_update_failed",
        message: e.to_string(),
        details: Some(json!({ "table": "criterion_scores" })),
    })?;
    Ok(json!({ "ok": true }))
}

fn scores_clear(conn: &Connection, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let student_id = get_required_str(params, "studentId")?;
    let criterion_id = get_required_str(params, "criterionId")?;
    conn.execute(
        "DELETE FROM criterion_scores WHERE student_id = ? AND criterion_id = ?",
        (&student_id, &criterion_id),
    )
    .map_err(|e| HandlerErr::new("db_delete_failed", e.to_string()))?;
    Ok(json!({ "ok": true }))
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
        "assessments.create" => Some(run(&assessments_create)),
        "assessments.list" => Some(run(&assessments_list)),
        "assessments.delete" => Some(run(&assessments_delete)),
        "criteria.create" => Some(run(&criteria_create)),
        "criteria.list" => Some(run(&criteria_list)),
        "criteria.delete" => Some(run(&criteria_delete)),
        "scores.set" => Some(run(&scores_set)),
        "scores.clear" => Some(run(&scores_clear)),
        _ => None,
    }
}
