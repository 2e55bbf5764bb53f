use serde::Serialize;
use std::cmp::Ordering;
use std::collections::HashMap;

/// Tolerance for the "class weights must sum to 100" check.
pub const WEIGHT_SUM_EPSILON: f64 = 1e-6;

#[derive(Debug, Clone, Serialize)]
pub struct CalcError {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl CalcError {
    pub fn new(code: &str, message: impl Into<String>) -> Self {
        Self {
            code: code.to_string(),
            message: message.into(),
            details: None,
        }
    }

    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }
}

/// Display rounding for percentages: two decimals.
pub fn round2(x: f64) -> f64 {
    (x * 100.0).round() / 100.0
}

/// One recorded score for one student on one criterion of an assessment,
/// joined with the criterion's ceiling. Ungraded criteria have no row here.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredCriterion {
    pub criterion_id: String,
    pub score: f64,
    pub max_score: f64,
}

/// Percentage for one (student, assessment): 100 * sum(score) / sum(maxScore)
/// over the criteria that actually have a recorded score. Criteria without a
/// score contribute to neither side. With nothing recorded the percentage is
/// undefined and the caller decides how to render the absence.
pub fn assessment_percentage(scored: &[ScoredCriterion]) -> Option<f64> {
    let mut sum_raw = 0.0_f64;
    let mut sum_max = 0.0_f64;
    for c in scored {
        sum_raw += c.score;
        sum_max += c.max_score;
    }
    if sum_max > 0.0 {
        Some(100.0 * sum_raw / sum_max)
    } else {
        None
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WeightSetting {
    pub weight_category_id: String,
    pub name: String,
    pub weight_percent: f64,
}

/// The weights of a class must cover exactly 100 percent before any final
/// grade may be computed. Enforced at save time and re-checked at grade time,
/// since settings may have changed since last validated.
pub fn validate_weights(settings: &[WeightSetting]) -> Result<(), CalcError> {
    if settings.is_empty() {
        return Err(CalcError::new(
            "invalid_weight_configuration",
            "no weight settings for class",
        ));
    }
    let sum: f64 = settings.iter().map(|s| s.weight_percent).sum();
    if (sum - 100.0).abs() > WEIGHT_SUM_EPSILON {
        return Err(
            CalcError::new(
                "invalid_weight_configuration",
                format!("class weights sum to {} instead of 100", sum),
            )
            .with_details(serde_json::json!({ "weightSum": sum })),
        );
    }
    Ok(())
}

/// One defined assessment percentage for a student, tagged with the
/// assessment's weight category. Uncategorized assessments carry `None` and
/// never reach the final grade.
#[derive(Debug, Clone)]
pub struct CategorizedPercent {
    pub assessment_id: String,
    pub weight_category_id: Option<String>,
    pub percent: f64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryBreakdown {
    pub weight_category_id: String,
    pub name: Option<String>,
    pub weight_percent: f64,
    pub average: Option<f64>,
    pub assessment_count: usize,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GradeWarning {
    pub code: &'static str,
    pub weight_category_id: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FinalGrade {
    pub grade: f64,
    pub per_category: Vec<CategoryBreakdown>,
    pub warnings: Vec<GradeWarning>,
}

/// Category-weighted final grade for one student in one class.
///
/// CategoryAverage is the plain mean of the student's defined assessment
/// percentages in that category; assessments with no recorded percentage are
/// excluded from the mean, not zero-filled. FinalGrade is
/// sum(catAvg * weight / 100). A weighted category with no contributing
/// assessments adds 0 and is reported as an `unredeemed_weight` warning,
/// which is routine early in a term and never an error.
pub fn final_grade(
    percents: &[CategorizedPercent],
    settings: &[WeightSetting],
) -> Result<FinalGrade, CalcError> {
    validate_weights(settings)?;

    let mut by_category: HashMap<&str, (f64, usize)> = HashMap::new();
    for p in percents {
        let Some(cat) = p.weight_category_id.as_deref() else {
            continue;
        };
        let entry = by_category.entry(cat).or_insert((0.0, 0));
        entry.0 += p.percent;
        entry.1 += 1;
    }

    let mut grade = 0.0_f64;
    let mut per_category = Vec::new();
    let mut warnings = Vec::new();

    for s in settings {
        let (average, count) = match by_category.remove(s.weight_category_id.as_str()) {
            Some((sum, n)) if n > 0 => (Some(sum / n as f64), n),
            _ => (None, 0),
        };
        match average {
            Some(avg) => grade += avg * s.weight_percent / 100.0,
            None => {
                if s.weight_percent > 0.0 {
                    warnings.push(GradeWarning {
                        code: "unredeemed_weight",
                        weight_category_id: s.weight_category_id.clone(),
                    });
                }
            }
        }
        per_category.push(CategoryBreakdown {
            weight_category_id: s.weight_category_id.clone(),
            name: Some(s.name.clone()),
            weight_percent: s.weight_percent,
            average,
            assessment_count: count,
        });
    }

    // Categories the student has assessments in but the class never weighted.
    // They contribute nothing; surface them so the caller can see the gap.
    let mut leftover: Vec<(&str, (f64, usize))> = by_category.into_iter().collect();
    leftover.sort_by(|a, b| a.0.cmp(b.0));
    for (cat, (sum, n)) in leftover {
        per_category.push(CategoryBreakdown {
            weight_category_id: cat.to_string(),
            name: None,
            weight_percent: 0.0,
            average: Some(sum / n as f64),
            assessment_count: n,
        });
    }

    Ok(FinalGrade {
        grade,
        per_category,
        warnings,
    })
}

/// One student's defined assessment percentages over the assessment set of
/// interest, in roster order.
#[derive(Debug, Clone)]
pub struct StudentPercents {
    pub student_id: String,
    pub display_name: String,
    pub percents: Vec<f64>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RankedStudent {
    pub student_id: String,
    pub display_name: String,
    pub average: f64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassStatistics {
    pub class_average: Option<f64>,
    pub max: Option<f64>,
    pub min: Option<f64>,
    pub ranked: Vec<RankedStudent>,
    pub scored_student_count: usize,
    pub unscored_student_count: usize,
}

/// Two-level averaging: assessment -> student, then student -> class. Every
/// student counts once no matter how many assessments they have marks for.
/// A flat sum(score)/sum(max) across all rows gives materially different
/// results when students have uneven numbers of recorded assessments, so it
/// is deliberately not used here. Students with no defined percentage are
/// excluded from both the numerator and the denominator of the class average.
pub fn class_statistics(students: &[StudentPercents]) -> ClassStatistics {
    let mut ranked: Vec<RankedStudent> = Vec::new();
    let mut unscored = 0usize;
    for s in students {
        if s.percents.is_empty() {
            unscored += 1;
            continue;
        }
        let avg = s.percents.iter().sum::<f64>() / s.percents.len() as f64;
        ranked.push(RankedStudent {
            student_id: s.student_id.clone(),
            display_name: s.display_name.clone(),
            average: avg,
        });
    }

    let class_average = if ranked.is_empty() {
        None
    } else {
        Some(ranked.iter().map(|r| r.average).sum::<f64>() / ranked.len() as f64)
    };
    let max = ranked
        .iter()
        .map(|r| r.average)
        .fold(None, |acc: Option<f64>, v| {
            Some(acc.map_or(v, |m| m.max(v)))
        });
    let min = ranked
        .iter()
        .map(|r| r.average)
        .fold(None, |acc: Option<f64>, v| {
            Some(acc.map_or(v, |m| m.min(v)))
        });

    // Stable: ties keep roster order.
    ranked.sort_by(|a, b| {
        b.average
            .partial_cmp(&a.average)
            .unwrap_or(Ordering::Equal)
    });

    ClassStatistics {
        class_average,
        max,
        min,
        ranked,
        scored_student_count: students.len() - unscored,
        unscored_student_count: unscored,
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TrendPoint {
    pub assessment_id: String,
    pub date: String,
    pub percent: f64,
}

/// One student's percentages in chronological order, for direct plotting.
/// No interpolation or smoothing; iteration restarts from the front every
/// time.
#[derive(Debug, Clone)]
pub struct TrendSeries {
    points: Vec<TrendPoint>,
}

impl TrendSeries {
    /// Dates are ISO `YYYY-MM-DD`, so lexicographic order is chronological.
    /// The sort is stable: same-day assessments keep their input order.
    pub fn new(mut points: Vec<TrendPoint>) -> Self {
        points.sort_by(|a, b| a.date.cmp(&b.date));
        Self { points }
    }

    pub fn iter(&self) -> std::slice::Iter<'_, TrendPoint> {
        self.points.iter()
    }

    pub fn points(&self) -> &[TrendPoint] {
        &self.points
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassComparison {
    pub average_a: Option<f64>,
    pub average_b: Option<f64>,
    pub difference: Option<f64>,
}

/// Side-by-side class averages. Both are plain percentages in [0, 100];
/// no cross-class normalization.
pub fn comparative_averages(a: &ClassStatistics, b: &ClassStatistics) -> ClassComparison {
    let difference = match (a.class_average, b.class_average) {
        (Some(x), Some(y)) => Some(x - y),
        _ => None,
    };
    ClassComparison {
        average_a: a.class_average,
        average_b: b.class_average,
        difference,
    }
}

/// Raw score row for one assessment, used by the relational pairing.
#[derive(Debug, Clone)]
pub struct RawScore {
    pub student_id: String,
    pub criterion_id: String,
    pub score: f64,
}

/// Paired raw scores of two criteria within one assessment, one point per
/// student. A student contributes only when both scores are recorded; a
/// missing side drops the student entirely, with no substitution. The pairs
/// are raw scores for scatter inspection; no correlation coefficient is
/// computed here.
pub fn relational_pairs(
    rows: &[RawScore],
    criterion_a: &str,
    criterion_b: &str,
) -> Vec<(f64, f64)> {
    let mut by_student: HashMap<&str, (Option<f64>, Option<f64>)> = HashMap::new();
    let mut order: Vec<&str> = Vec::new();
    for r in rows {
        if r.criterion_id != criterion_a && r.criterion_id != criterion_b {
            continue;
        }
        let entry = by_student.entry(r.student_id.as_str()).or_insert_with(|| {
            order.push(r.student_id.as_str());
            (None, None)
        });
        if r.criterion_id == criterion_a {
            entry.0 = Some(r.score);
        } else {
            entry.1 = Some(r.score);
        }
    }

    order
        .iter()
        .filter_map(|sid| match by_student.get(sid) {
            Some((Some(x), Some(y))) => Some((*x, *y)),
            _ => None,
        })
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttendanceStatus {
    Present,
    Sick,
    ExcusedAbsence,
    UnexcusedAbsence,
}

impl AttendanceStatus {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "present" => Some(Self::Present),
            "sick" => Some(Self::Sick),
            "excused_absence" => Some(Self::ExcusedAbsence),
            "unexcused_absence" => Some(Self::UnexcusedAbsence),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Present => "present",
            Self::Sick => "sick",
            Self::ExcusedAbsence => "excused_absence",
            Self::UnexcusedAbsence => "unexcused_absence",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AttendanceCounts {
    pub present: usize,
    pub sick: usize,
    pub excused_absence: usize,
    pub unexcused_absence: usize,
}

impl AttendanceCounts {
    pub fn tally<I>(events: I) -> Self
    where
        I: IntoIterator<Item = AttendanceStatus>,
    {
        let mut counts = Self::default();
        for e in events {
            match e {
                AttendanceStatus::Present => counts.present += 1,
                AttendanceStatus::Sick => counts.sick += 1,
                AttendanceStatus::ExcusedAbsence => counts.excused_absence += 1,
                AttendanceStatus::UnexcusedAbsence => counts.unexcused_absence += 1,
            }
        }
        counts
    }

    /// Recorded meetings, not calendar days.
    pub fn total(&self) -> usize {
        self.present + self.sick + self.excused_absence + self.unexcused_absence
    }
}

/// 100 * present / recorded meetings. A student with zero recorded events in
/// range has an undefined rate, not 0.
pub fn attendance_rate(counts: &AttendanceCounts) -> Option<f64> {
    let total = counts.total();
    if total == 0 {
        return None;
    }
    Some(100.0 * counts.present as f64 / total as f64)
}

/// One status bucket as a percentage of the group-wide event total.
pub fn percent_share(count: usize, total: usize) -> Option<f64> {
    if total == 0 {
        return None;
    }
    Some(100.0 * count as f64 / total as f64)
}
