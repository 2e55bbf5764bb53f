use rusqlite::Connection;
use std::path::Path;

pub fn open_db(workspace: &Path) -> anyhow::Result<Connection> {
    std::fs::create_dir_all(workspace)?;
    let db_path = workspace.join("gradebook.sqlite3");
    let conn = Connection::open(db_path)?;
    conn.execute("PRAGMA foreign_keys = ON", [])?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS classes(
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            term TEXT,
            teacher_id TEXT
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS students(
            id TEXT PRIMARY KEY,
            class_id TEXT NOT NULL,
            name TEXT NOT NULL,
            external_id TEXT,
            sort_order INTEGER NOT NULL,
            FOREIGN KEY(class_id) REFERENCES classes(id)
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_students_class_sort ON students(class_id, sort_order)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS weight_categories(
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL UNIQUE
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS class_weight_settings(
            class_id TEXT NOT NULL,
            weight_category_id TEXT NOT NULL,
            weight_percent REAL NOT NULL,
            PRIMARY KEY(class_id, weight_category_id),
            FOREIGN KEY(class_id) REFERENCES classes(id),
            FOREIGN KEY(weight_category_id) REFERENCES weight_categories(id)
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS assessments(
            id TEXT PRIMARY KEY,
            class_id TEXT NOT NULL,
            name TEXT NOT NULL,
            date TEXT,
            kind TEXT NOT NULL CHECK(kind IN ('formative', 'summative')),
            weight_category_id TEXT,
            sort_order INTEGER NOT NULL,
            FOREIGN KEY(class_id) REFERENCES classes(id),
            FOREIGN KEY(weight_category_id) REFERENCES weight_categories(id)
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_assessments_class ON assessments(class_id, sort_order)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS criteria(
            id TEXT PRIMARY KEY,
            assessment_id TEXT NOT NULL,
            description TEXT NOT NULL,
            max_score REAL NOT NULL CHECK(max_score > 0),
            sort_order INTEGER NOT NULL,
            FOREIGN KEY(assessment_id) REFERENCES assessments(id)
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_criteria_assessment ON criteria(assessment_id, sort_order)",
        [],
    )?;

    // Absence of a score row means "ungraded", never zero.
    conn.execute(
        "CREATE TABLE IF NOT EXISTS criterion_scores(
            student_id TEXT NOT NULL,
            criterion_id TEXT NOT NULL,
            score REAL NOT NULL,
            PRIMARY KEY(student_id, criterion_id),
            FOREIGN KEY(student_id) REFERENCES students(id),
            FOREIGN KEY(criterion_id) REFERENCES criteria(id)
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_criterion_scores_criterion ON criterion_scores(criterion_id)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS attendance_events(
            student_id TEXT NOT NULL,
            meeting_date TEXT NOT NULL,
            status TEXT NOT NULL CHECK(status IN ('present', 'sick', 'excused_absence', 'unexcused_absence')),
            PRIMARY KEY(student_id, meeting_date),
            FOREIGN KEY(student_id) REFERENCES students(id)
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_attendance_events_date ON attendance_events(meeting_date)",
        [],
    )?;

    Ok(conn)
}
