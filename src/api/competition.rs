use serde::Serialize;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CompetitionPhase {
    Upcoming,
    Live,
    Results,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CompetitionStatus {
    pub phase: CompetitionPhase,
    pub start: i64,
    pub end: i64,
    /// Only set while the competition has not started.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seconds_to_start: Option<i64>,
}

pub fn competition_status(start: i64, end: i64, now: i64) -> CompetitionStatus {
    let phase = if now < start {
        CompetitionPhase::Upcoming
    } else if now > end {
        CompetitionPhase::Results
    } else {
        CompetitionPhase::Live
    };

    CompetitionStatus {
        phase,
        start,
        end,
        seconds_to_start: (phase == CompetitionPhase::Upcoming).then(|| start - now),
    }
}
