//! Read side of the record store. Every loader returns a plain in-memory
//! snapshot so the engine in `calc` stays a pure function of its inputs.
//! Store failures propagate unchanged; nothing here retries.

use rusqlite::{Connection, OptionalExtension};
use std::collections::HashMap;

use crate::calc;

#[derive(Debug)]
pub enum StoreError {
    NotFound(&'static str),
    Db(rusqlite::Error),
}

impl StoreError {
    pub fn code(&self) -> &'static str {
        match self {
            StoreError::NotFound(_) => "not_found",
            StoreError::Db(_) => "db_query_failed",
        }
    }

    pub fn message(&self) -> String {
        match self {
            StoreError::NotFound(what) => (*what).to_string(),
            StoreError::Db(e) => e.to_string(),
        }
    }
}

impl From<rusqlite::Error> for StoreError {
    fn from(e: rusqlite::Error) -> Self {
        StoreError::Db(e)
    }
}

#[derive(Debug, Clone)]
pub struct StudentRow {
    pub id: String,
    pub name: String,
    pub external_id: Option<String>,
    pub sort_order: i64,
}

#[derive(Debug, Clone)]
pub struct AssessmentRow {
    pub id: String,
    pub name: String,
    pub date: Option<String>,
    pub kind: String,
    pub weight_category_id: Option<String>,
    pub sort_order: i64,
}

#[derive(Debug, Clone)]
pub struct CriterionRow {
    pub id: String,
    pub description: String,
    pub max_score: f64,
    pub sort_order: i64,
}

/// One recorded score joined with its criterion's ceiling, so percentage
/// math never needs a second lookup.
#[derive(Debug, Clone)]
pub struct ScoreRow {
    pub student_id: String,
    pub criterion_id: String,
    pub score: f64,
    pub max_score: f64,
}

pub fn class_exists(conn: &Connection, class_id: &str) -> Result<(), StoreError> {
    let found: Option<i64> = conn
        .query_row("SELECT 1 FROM classes WHERE id = ?", [class_id], |r| {
            r.get(0)
        })
        .optional()?;
    if found.is_none() {
        return Err(StoreError::NotFound("class not found"));
    }
    Ok(())
}

pub fn student_class(conn: &Connection, student_id: &str) -> Result<String, StoreError> {
    conn.query_row(
        "SELECT class_id FROM students WHERE id = ?",
        [student_id],
        |r| r.get(0),
    )
    .optional()?
    .ok_or(StoreError::NotFound("student not found"))
}

pub fn assessment_class(conn: &Connection, assessment_id: &str) -> Result<String, StoreError> {
    conn.query_row(
        "SELECT class_id FROM assessments WHERE id = ?",
        [assessment_id],
        |r| r.get(0),
    )
    .optional()?
    .ok_or(StoreError::NotFound("assessment not found"))
}

pub fn students_for_class(
    conn: &Connection,
    class_id: &str,
) -> Result<Vec<StudentRow>, StoreError> {
    let mut stmt = conn.prepare(
        "SELECT id, name, external_id, sort_order
         FROM students
         WHERE class_id = ?
         ORDER BY sort_order",
    )?;
    let rows = stmt
        .query_map([class_id], |r| {
            Ok(StudentRow {
                id: r.get(0)?,
                name: r.get(1)?,
                external_id: r.get(2)?,
                sort_order: r.get(3)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub fn assessments_for_class(
    conn: &Connection,
    class_id: &str,
) -> Result<Vec<AssessmentRow>, StoreError> {
    let mut stmt = conn.prepare(
        "SELECT id, name, date, kind, weight_category_id, sort_order
         FROM assessments
         WHERE class_id = ?
         ORDER BY sort_order",
    )?;
    let rows = stmt
        .query_map([class_id], |r| {
            Ok(AssessmentRow {
                id: r.get(0)?,
                name: r.get(1)?,
                date: r.get(2)?,
                kind: r.get(3)?,
                weight_category_id: r.get(4)?,
                sort_order: r.get(5)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub fn assessment(conn: &Connection, assessment_id: &str) -> Result<AssessmentRow, StoreError> {
    conn.query_row(
        "SELECT id, name, date, kind, weight_category_id, sort_order
         FROM assessments
         WHERE id = ?",
        [assessment_id],
        |r| {
            Ok(AssessmentRow {
                id: r.get(0)?,
                name: r.get(1)?,
                date: r.get(2)?,
                kind: r.get(3)?,
                weight_category_id: r.get(4)?,
                sort_order: r.get(5)?,
            })
        },
    )
    .optional()?
    .ok_or(StoreError::NotFound("assessment not found"))
}

pub fn criteria_for_assessment(
    conn: &Connection,
    assessment_id: &str,
) -> Result<Vec<CriterionRow>, StoreError> {
    let mut stmt = conn.prepare(
        "SELECT id, description, max_score, sort_order
         FROM criteria
         WHERE assessment_id = ?
         ORDER BY sort_order",
    )?;
    let rows = stmt
        .query_map([assessment_id], |r| {
            Ok(CriterionRow {
                id: r.get(0)?,
                description: r.get(1)?,
                max_score: r.get(2)?,
                sort_order: r.get(3)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// All recorded scores for one assessment, across its students, each joined
/// with the criterion ceiling.
pub fn scores_for_assessment(
    conn: &Connection,
    assessment_id: &str,
) -> Result<Vec<ScoreRow>, StoreError> {
    let mut stmt = conn.prepare(
        "SELECT cs.student_id, cs.criterion_id, cs.score, c.max_score
         FROM criterion_scores cs
         JOIN criteria c ON c.id = cs.criterion_id
         WHERE c.assessment_id = ?
         ORDER BY c.sort_order",
    )?;
    let rows = stmt
        .query_map([assessment_id], |r| {
            Ok(ScoreRow {
                student_id: r.get(0)?,
                criterion_id: r.get(1)?,
                score: r.get(2)?,
                max_score: r.get(3)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// Defined percentage per student for one assessment. Students with nothing
/// recorded simply have no entry.
pub fn percentages_by_student(
    conn: &Connection,
    assessment_id: &str,
) -> Result<HashMap<String, f64>, StoreError> {
    let rows = scores_for_assessment(conn, assessment_id)?;
    let mut by_student: HashMap<String, Vec<calc::ScoredCriterion>> = HashMap::new();
    for row in rows {
        by_student
            .entry(row.student_id)
            .or_default()
            .push(calc::ScoredCriterion {
                criterion_id: row.criterion_id,
                score: row.score,
                max_score: row.max_score,
            });
    }

    let mut out = HashMap::new();
    for (student_id, scored) in by_student {
        if let Some(pct) = calc::assessment_percentage(&scored) {
            out.insert(student_id, pct);
        }
    }
    Ok(out)
}

/// Weight settings for a class, joined with category names. Validation is the
/// caller's job: the engine re-checks the 100-percent invariant every time.
pub fn weight_settings(
    conn: &Connection,
    class_id: &str,
) -> Result<Vec<calc::WeightSetting>, StoreError> {
    let mut stmt = conn.prepare(
        "SELECT cws.weight_category_id, wc.name, cws.weight_percent
         FROM class_weight_settings cws
         JOIN weight_categories wc ON wc.id = cws.weight_category_id
         WHERE cws.class_id = ?
         ORDER BY wc.name",
    )?;
    let rows = stmt
        .query_map([class_id], |r| {
            Ok(calc::WeightSetting {
                weight_category_id: r.get(0)?,
                name: r.get(1)?,
                weight_percent: r.get(2)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub fn attendance_for_student(
    conn: &Connection,
    student_id: &str,
    from: &str,
    to: &str,
) -> Result<Vec<calc::AttendanceStatus>, StoreError> {
    let mut stmt = conn.prepare(
        "SELECT status
         FROM attendance_events
         WHERE student_id = ? AND meeting_date >= ? AND meeting_date <= ?",
    )?;
    let raw = stmt
        .query_map((student_id, from, to), |r| r.get::<_, String>(0))?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(raw
        .iter()
        .filter_map(|s| calc::AttendanceStatus::parse(s))
        .collect())
}

pub fn attendance_for_class(
    conn: &Connection,
    class_id: &str,
    from: &str,
    to: &str,
) -> Result<Vec<(String, calc::AttendanceStatus)>, StoreError> {
    let mut stmt = conn.prepare(
        "SELECT ae.student_id, ae.status
         FROM attendance_events ae
         JOIN students s ON s.id = ae.student_id
         WHERE s.class_id = ? AND ae.meeting_date >= ? AND ae.meeting_date <= ?",
    )?;
    let raw = stmt
        .query_map((class_id, from, to), |r| {
            Ok((r.get::<_, String>(0)?, r.get::<_, String>(1)?))
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(raw
        .into_iter()
        .filter_map(|(sid, s)| calc::AttendanceStatus::parse(&s).map(|st| (sid, st)))
        .collect())
}

/// Raw scores for one assessment restricted to two criteria, in roster order
/// so downstream pairing is deterministic.
pub fn raw_scores_for_criteria(
    conn: &Connection,
    assessment_id: &str,
    criterion_a: &str,
    criterion_b: &str,
) -> Result<Vec<calc::RawScore>, StoreError> {
    let mut stmt = conn.prepare(
        "SELECT cs.student_id, cs.criterion_id, cs.score
         FROM criterion_scores cs
         JOIN criteria c ON c.id = cs.criterion_id
         JOIN students s ON s.id = cs.student_id
         WHERE c.assessment_id = ? AND cs.criterion_id IN (?, ?)
         ORDER BY s.sort_order",
    )?;
    let rows = stmt
        .query_map((assessment_id, criterion_a, criterion_b), |r| {
            Ok(calc::RawScore {
                student_id: r.get(0)?,
                criterion_id: r.get(1)?,
                score: r.get(2)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}
