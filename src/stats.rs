use crate::access::{
    self, classes::Class, evaluations::Evaluation, periods::InternshipPeriod, students::Student,
};
use crate::error::AppResult;
use crate::rubric::LEVELS;
use rusqlite::Connection;
use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LevelCount {
    pub niveau: &'static str,
    pub label: &'static str,
    pub color: &'static str,
    pub count: usize,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Overview {
    pub students: i64,
    pub classes: i64,
    pub periods: i64,
    pub evaluations: i64,
    /// Sub-competency ratings per level across every evaluation.
    pub levels: Vec<LevelCount>,
}

pub fn overview(conn: &Connection) -> AppResult<Overview> {
    let mut totals = [0usize; LEVELS.len()];
    let evaluations = access::list_all::<Evaluation>(conn)?;
    for e in &evaluations {
        for (t, n) in totals.iter_mut().zip(e.record.competences.level_counts()) {
            *t += n;
        }
    }
    Ok(Overview {
        students: access::count_all::<Student>(conn)?,
        classes: access::count_all::<Class>(conn)?,
        periods: access::count_all::<InternshipPeriod>(conn)?,
        evaluations: evaluations.len() as i64,
        levels: LEVELS
            .iter()
            .zip(totals)
            .map(|(l, count)| LevelCount {
                niveau: l.wire,
                label: l.label,
                color: l.color,
                count,
            })
            .collect(),
    })
}
