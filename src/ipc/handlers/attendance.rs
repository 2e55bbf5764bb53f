use crate::calc;
use crate::ipc::error::ok;
use crate::ipc::helpers::{db_conn, get_date_range, get_required_str, parse_iso_date, HandlerErr};
use crate::ipc::types::{AppState, Request};
use crate::store;
use rusqlite::Connection;
use serde_json::json;

fn attendance_record(conn: &Connection, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let student_id = get_required_str(params, "studentId")?;
    let meeting_date = parse_iso_date(&get_required_str(params, "meetingDate")?, "meetingDate")?;
    let status_raw = get_required_str(params, "status")?.to_ascii_lowercase();
    let Some(status) = calc::AttendanceStatus::parse(&status_raw) else {
        return Err(HandlerErr {
            code: "bad_params",
            message: "status must be one of: present, sick, excused_absence, unexcused_absence"
                .to_string(),
            details: Some(json!({ "status": status_raw })),
        });
    };
    store::student_class(conn, &student_id)?;

    // One event per (student, date); re-recording replaces the status.
    conn.execute(
        "INSERT INTO attendance_events(student_id, meeting_date, status)
         VALUES(?, ?, ?)
         ON CONFLICT(student_id, meeting_date) DO UPDATE SET
           status = excluded.status",
        (&student_id, &meeting_date, status.as_str()),
    )
    .map_err(|e| HandlerErr {
        code: "db_update_failed",
        message: e.to_string(),
        details: Some(json!({ "table": "attendance_events" })),
    })?;
    Ok(json!({ "ok": true }))
}

fn attendance_delete(conn: &Connection, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let student_id = get_required_str(params, "studentId")?;
    let meeting_date = parse_iso_date(&get_required_str(params, "meetingDate")?, "meetingDate")?;
    conn.execute(
        "DELETE FROM attendance_events WHERE student_id = ? AND meeting_date = ?",
        (&student_id, &meeting_date),
    )
    .map_err(|e| HandlerErr::new("db_delete_failed", e.to_string()))?;
    Ok(json!({ "ok": true }))
}

fn counts_json(counts: &calc::AttendanceCounts) -> serde_json::Value {
    json!({
        "present": counts.present,
        "sick": counts.sick,
        "excusedAbsence": counts.excused_absence,
        "unexcusedAbsence": counts.unexcused_absence,
        "totalRecorded": counts.total()
    })
}

/// Per-status counts and the attendance rate over the recorded meetings in
/// range. `attendanceRate` is null when nothing was recorded; the caller
/// renders the gap instead of inventing a 0.
fn attendance_student_summary(
    conn: &Connection,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let student_id = get_required_str(params, "studentId")?;
    let (from, to) = get_date_range(params)?;
    store::student_class(conn, &student_id)?;

    let events = store::attendance_for_student(conn, &student_id, &from, &to)?;
    let counts = calc::AttendanceCounts::tally(events);
    let rate = calc::attendance_rate(&counts).map(calc::round2);

    Ok(json!({
        "studentId": student_id,
        "from": from,
        "to": to,
        "counts": counts_json(&counts),
        "attendanceRate": rate
    }))
}

/// Class-wide tally: counts per status summed over all students, each also as
/// a share of the class-wide event total.
fn attendance_class_summary(
    conn: &Connection,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let class_id = get_required_str(params, "classId")?;
    let (from, to) = get_date_range(params)?;
    store::class_exists(conn, &class_id)?;

    let events = store::attendance_for_class(conn, &class_id, &from, &to)?;
    let counts = calc::AttendanceCounts::tally(events.iter().map(|(_, s)| *s));
    let total = counts.total();

    let share = |count: usize| calc::percent_share(count, total).map(calc::round2);
    Ok(json!({
        "classId": class_id,
        "from": from,
        "to": to,
        "counts": counts_json(&counts),
        "shares": {
            "present": share(counts.present),
            "sick": share(counts.sick),
            "excusedAbsence": share(counts.excused_absence),
            "unexcusedAbsence": share(counts.unexcused_absence)
        }
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
        "attendance.record" => Some(run(&attendance_record)),
        "attendance.delete" => Some(run(&attendance_delete)),
        "attendance.studentSummary" => Some(run(&attendance_student_summary)),
        "attendance.classSummary" => Some(run(&attendance_class_summary)),
        _ => None,
    }
}
