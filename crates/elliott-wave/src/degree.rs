use chrono::Duration;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Elliott wave degree, ordered from the largest to the smallest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Degree {
    GrandSupercycle,
    Supercycle,
    Cycle,
    Primary,
    Intermediate,
    Minor,
    Minute,
    Minuette,
    SubMinuette,
}

/// Historical span (in days) that comfortably holds one full cycle of a degree.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HistoryRange {
    pub min_days: f64,
    /// `None` for an open-ended range.
    pub max_days: Option<f64>,
}

impl Degree {
    pub fn all() -> [Degree; 9] {
        [
            Degree::GrandSupercycle,
            Degree::Supercycle,
            Degree::Cycle,
            Degree::Primary,
            Degree::Intermediate,
            Degree::Minor,
            Degree::Minute,
            Degree::Minuette,
            Degree::SubMinuette,
        ]
    }

    pub fn name(&self) -> &'static str {
        match self {
            Degree::GrandSupercycle => "GRAND_SUPERCYCLE",
            Degree::Supercycle => "SUPERCYCLE",
            Degree::Cycle => "CYCLE",
            Degree::Primary => "PRIMARY",
            Degree::Intermediate => "INTERMEDIATE",
            Degree::Minor => "MINOR",
            Degree::Minute => "MINUTE",
            Degree::Minuette => "MINUETTE",
            Degree::SubMinuette => "SUB_MINUETTE",
        }
    }

    /// Position in the ordering, 0 for the largest degree.
    pub fn rank(&self) -> usize {
        *self as usize
    }

    /// One step larger, `None` at the top.
    pub fn higher(&self) -> Option<Degree> {
        self.rank().checked_sub(1).and_then(|i| Degree::all().get(i).copied())
    }

    /// One step smaller, `None` at the bottom.
    pub fn lower(&self) -> Option<Degree> {
        Degree::all().get(self.rank() + 1).copied()
    }

    /// Up to `steps` degrees above this one, nearest first.
    pub fn steps_higher(&self, steps: usize) -> Vec<Degree> {
        std::iter::successors(self.higher(), Degree::higher).take(steps).collect()
    }

    /// Up to `steps` degrees below this one, nearest first.
    pub fn steps_lower(&self, steps: usize) -> Vec<Degree> {
        std::iter::successors(self.lower(), Degree::lower).take(steps).collect()
    }

    /// Contiguous band around `central`, largest degree first. The band is
    /// truncated where the ordering runs out.
    pub fn band(central: Degree, higher: usize, lower: usize) -> Vec<Degree> {
        let mut band: Vec<Degree> = central.steps_higher(higher).into_iter().rev().collect();
        band.push(central);
        band.extend(central.steps_lower(lower));
        band
    }

    /// Signed number of steps from `self` to `other`; positive when `other` is larger.
    pub fn steps_to(&self, other: Degree) -> i32 {
        self.rank() as i32 - other.rank() as i32
    }

    pub fn history_range(&self) -> HistoryRange {
        let (min_days, max_days) = match self {
            Degree::GrandSupercycle => (20000.0, None),
            Degree::Supercycle => (7000.0, Some(20000.0)),
            Degree::Cycle => (1000.0, Some(7000.0)),
            Degree::Primary => (400.0, Some(1000.0)),
            Degree::Intermediate => (180.0, Some(400.0)),
            Degree::Minor => (60.0, Some(180.0)),
            Degree::Minute => (30.0, Some(90.0)),
            Degree::Minuette => (7.0, Some(30.0)),
            Degree::SubMinuette => (2.0, Some(7.0)),
        };
        HistoryRange { min_days, max_days }
    }

    /// How well `days` of history suits this degree, in `[0, 1]`.
    pub fn history_fit(&self, days: f64) -> f64 {
        if !days.is_finite() || days <= 0.0 {
            return 0.0;
        }
        let range = self.history_range();
        if days < range.min_days {
            return days / range.min_days;
        }
        match range.max_days {
            Some(max) if days > max => max / days,
            _ => 1.0,
        }
    }

    /// History fit for a series of `bar_count` bars spaced `bar_duration` apart.
    pub fn history_fit_score(&self, bar_duration: Duration, bar_count: usize) -> f64 {
        self.history_fit(history_days(bar_duration, bar_count))
    }

    /// Smallest degree that can be resolved from bars of the given duration.
    pub fn finest_for_bar(bar_duration: Duration) -> Degree {
        if bar_duration >= Duration::days(7) {
            Degree::Intermediate
        } else if bar_duration >= Duration::days(1) {
            Degree::Minute
        } else if bar_duration > Duration::minutes(15) {
            Degree::Minuette
        } else {
            Degree::SubMinuette
        }
    }

    /// Degrees whose typical history span matches the series, best fit first.
    ///
    /// Degrees finer than the bar duration can resolve are excluded. When no
    /// degree reaches a fit of 0.5 the single best candidate is returned.
    pub fn recommended_degrees(bar_duration: Duration, bar_count: usize) -> Vec<Degree> {
        let days = history_days(bar_duration, bar_count);
        let finest = Degree::finest_for_bar(bar_duration);
        let mut scored: Vec<(Degree, f64)> = Degree::all()
            .into_iter()
            .filter(|d| *d <= finest)
            .map(|d| (d, d.history_fit(days)))
            .filter(|(_, s)| *s > 0.0)
            .collect();
        scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal).then(a.0.cmp(&b.0)));

        let strong: Vec<Degree> = scored.iter().filter(|(_, s)| *s >= 0.5).map(|(d, _)| *d).collect();
        if strong.is_empty() {
            scored.first().map(|(d, _)| vec![*d]).unwrap_or_default()
        } else {
            strong
        }
    }
}

fn history_days(bar_duration: Duration, bar_count: usize) -> f64 {
    bar_duration.num_seconds() as f64 * bar_count as f64 / 86_400.0
}

impl fmt::Display for Degree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}
