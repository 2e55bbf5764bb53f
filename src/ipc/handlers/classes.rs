use crate::ipc::error::ok;
use crate::ipc::helpers::{db_conn, get_optional_str, get_required_str, HandlerErr};
use crate::ipc::types::{AppState, Request};
use rusqlite::Connection;
use serde_json::json;
use uuid::Uuid;

fn classes_create(conn: &Connection, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let name = get_required_str(params, "name")?;
    let name = name.trim().to_string();
    if name.is_empty() {
        return Err(HandlerErr::new("bad_params", "name must not be empty"));
    }
    let term = get_optional_str(params, "term")?;
    let teacher_id = get_optional_str(params, "teacherId")?;

    let class_id = Uuid::new_v4().to_string();
    conn.execute(
        "INSERT INTO classes(id, name, term, teacher_id) VALUES(?, ?, ?, ?)",
        (&class_id, &name, &term, &teacher_id),
    )
    .map_err(|e| HandlerErr {
        code: "db_insert_failed",
        message: e.to_string(),
        details: Some(json!({ "table": "classes" })),
    })?;

    Ok(json!({ "classId": class_id, "name": name }))
}

fn classes_list(conn: &Connection) -> Result<serde_json::Value, HandlerErr> {
    // Basic counts so a dashboard has something to show.
    let mut stmt = conn
        .prepare(
            "SELECT
               c.id,
               c.name,
               c.term,
               (SELECT COUNT(*) FROM students s WHERE s.class_id = c.id) AS student_count,
               (SELECT COUNT(*) FROM assessments a WHERE a.class_id = c.id) AS assessment_count
             FROM classes c
             ORDER BY c.name",
        )
        .map_err(|e| HandlerErr::new("db_query_failed", e.to_string()))?;
    let classes = stmt
        .query_map([], |row| {
            let id: String = row.get(0)?;
            let name: String = row.get(1)?;
            let term: Option<String> = row.get(2)?;
            let student_count: i64 = row.get(3)?;
            let assessment_count: i64 = row.get(4)?;
            Ok(json!({
                "id": id,
                "name": name,
                "term": term,
                "studentCount": student_count,
                "assessmentCount": assessment_count
            }))
        })
        .and_then(|it| it.collect::<Result<Vec<_>, _>>())
        .map_err(|e| HandlerErr::new("db_query_failed", e.to_string()))?;
    Ok(json!({ "classes": classes }))
}

fn classes_delete(conn: &Connection, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let class_id = get_required_str(params, "classId")?;
    crate::store::class_exists(conn, &class_id)?;

    let tx = conn
        .unchecked_transaction()
        .map_err(|e| HandlerErr::new("db_tx_failed", e.to_string()))?;

    // Explicit deletes in dependency order (no ON DELETE CASCADE).
    let steps: &[(&str, &str)] = &[
        (
            "criterion_scores",
            "DELETE FROM criterion_scores
             WHERE criterion_id IN (
               SELECT c.id FROM criteria c
               JOIN assessments a ON a.id = c.assessment_id
               WHERE a.class_id = ?
             )",
        ),
        (
            "criteria",
            "DELETE FROM criteria
             WHERE assessment_id IN (SELECT id FROM assessments WHERE class_id = ?)",
        ),
        ("assessments", "DELETE FROM assessments WHERE class_id = ?"),
        (
            "attendance_events",
            "DELETE FROM attendance_events
             WHERE student_id IN (SELECT id FROM students WHERE class_id = ?)",
        ),
        ("students", "DELETE FROM students WHERE class_id = ?"),
        (
            "class_weight_settings",
            "DELETE FROM class_weight_settings WHERE class_id = ?",
        ),
        ("classes", "DELETE FROM classes WHERE id = ?"),
    ];
    for (table, sql) in steps {
        if let Err(e) = tx.execute(sql, [&class_id]) {
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
        "classes.create" => Some(run(&classes_create)),
        "classes.list" => Some(run(&|conn, _| classes_list(conn))),
        "classes.delete" => Some(run(&classes_delete)),
        _ => None,
    }
}
