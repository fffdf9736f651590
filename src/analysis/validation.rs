//! Historical validation: how price behaved every time it met a candidate level.

use rayon::prelude::*;

use crate::analysis::volume_profile::LevelCandidate;
use crate::config::ValidationSettings;
#[cfg(debug_assertions)]
use crate::config::DEBUG_FLAGS;
use crate::models::{LevelKind, OhlcvTimeSeries};

/// One stretch of consecutive bars within tolerance of a level.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TouchEpisode {
    pub start_index: usize,
    pub end_index: usize,
    pub reacted: bool,
}

/// A candidate together with its touch history.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedLevel {
    pub candidate: LevelCandidate,
    pub touches: Vec<TouchEpisode>,
    pub validation_rate: f64,
    pub is_validated: bool,
}

impl ValidatedLevel {
    pub fn touch_count(&self) -> usize {
        self.touches.len()
    }

    pub fn reaction_count(&self) -> usize {
        self.touches.iter().filter(|t| t.reacted).count()
    }

    pub fn first_touch_index(&self) -> Option<usize> {
        self.touches.first().map(|t| t.start_index)
    }

    pub fn last_touch_index(&self) -> Option<usize> {
        self.touches.last().map(|t| t.end_index)
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ValidationOutcome {
    /// Candidates with at least one touch, in input order
    pub levels: Vec<ValidatedLevel>,
    pub dropped_no_touches: usize,
}

impl ValidationOutcome {
    pub fn validated_count(&self) -> usize {
        self.levels.iter().filter(|l| l.is_validated).count()
    }

    pub fn flagged_count(&self) -> usize {
        self.levels.len() - self.validated_count()
    }
}

/// Validate all candidates against the full series. Levels with a rate below
/// `min_validation_rate` are kept but flagged; levels never touched are dropped.
pub fn validate_candidates(
    series: &OhlcvTimeSeries,
    candidates: &[LevelCandidate],
    settings: &ValidationSettings,
) -> ValidationOutcome {
    let evaluated: Vec<Option<ValidatedLevel>> = candidates
        .par_iter()
        .map(|candidate| validate_one(series, candidate, settings))
        .collect();

    let dropped_no_touches = evaluated.iter().filter(|l| l.is_none()).count();
    let levels: Vec<ValidatedLevel> = evaluated.into_iter().flatten().collect();

    #[cfg(debug_assertions)]
    if DEBUG_FLAGS.print_validation_details {
        for level in &levels {
            log::info!(
                "{} {} @ {:.4}: {} touches, {} reactions, rate {:.2}{}",
                series.key,
                level.candidate.kind,
                level.candidate.price,
                level.touch_count(),
                level.reaction_count(),
                level.validation_rate,
                if level.is_validated { "" } else { " (unvalidated)" }
            );
        }
    }

    ValidationOutcome {
        levels,
        dropped_no_touches,
    }
}

fn validate_one(
    series: &OhlcvTimeSeries,
    candidate: &LevelCandidate,
    settings: &ValidationSettings,
) -> Option<ValidatedLevel> {
    let touches = find_touch_episodes(series, candidate.price, candidate.kind, settings);
    if touches.is_empty() {
        return None;
    }

    let reactions = touches.iter().filter(|t| t.reacted).count();
    let validation_rate = reactions as f64 / touches.len() as f64;

    Some(ValidatedLevel {
        candidate: candidate.clone(),
        touches,
        validation_rate,
        is_validated: validation_rate >= settings.min_validation_rate,
    })
}

/// Scan the series for touch episodes and score each for a reaction.
pub fn find_touch_episodes(
    series: &OhlcvTimeSeries,
    level_price: f64,
    kind: LevelKind,
    settings: &ValidationSettings,
) -> Vec<TouchEpisode> {
    let mut episodes = Vec::new();
    let mut open_episode: Option<usize> = None;

    for i in 0..series.len() {
        let touching = series.bar(i).touches(level_price, settings.touch_tolerance);
        match (touching, open_episode) {
            (true, None) => open_episode = Some(i),
            (false, Some(start)) => {
                episodes.push(close_episode(series, level_price, kind, settings, start, i - 1));
                open_episode = None;
            }
            _ => {}
        }
    }
    if let Some(start) = open_episode {
        episodes.push(close_episode(
            series,
            level_price,
            kind,
            settings,
            start,
            series.len() - 1,
        ));
    }
    episodes
}

fn close_episode(
    series: &OhlcvTimeSeries,
    level_price: f64,
    kind: LevelKind,
    settings: &ValidationSettings,
    start_index: usize,
    end_index: usize,
) -> TouchEpisode {
    let window_start = end_index + 1;
    let window_end = (window_start + settings.reaction_window_bars).min(series.len());

    let reacted = match kind {
        // Bounce
        LevelKind::Support => {
            let target = level_price * (1.0 + settings.min_reaction_pct);
            series.high_prices[window_start.min(window_end)..window_end]
                .iter()
                .any(|&high| high >= target)
        }
        // Rejection
        LevelKind::Resistance => {
            let target = level_price * (1.0 - settings.min_reaction_pct);
            series.low_prices[window_start.min(window_end)..window_end]
                .iter()
                .any(|&low| low <= target)
        }
    };

    TouchEpisode {
        start_index,
        end_index,
        reacted,
    }
}
