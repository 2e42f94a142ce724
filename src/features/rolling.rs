//! Rolling window calculators
//!
//! Pure functions over a chronological slice of past values. Callers pass
//! history that is already truncated to "before the target match"; each
//! function looks only at the trailing `window` entries and falls back to a
//! fixed default when there is too little history.

/// Reference length of a full match, used to scale minutes-based signals
pub const FULL_MATCH_MINUTES: f64 = 90.0;

/// Minutes at or above which an appearance counts as a start
pub const STARTER_MINUTES: f64 = 60.0;

/// Appearances shorter than this count as partial (substitute) games
pub const PARTIAL_MINUTES: f64 = 45.0;

/// Trailing `n` entries of a chronological slice
pub fn tail<T>(values: &[T], n: usize) -> &[T] {
    &values[values.len().saturating_sub(n)..]
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Population variance (divides by n)
fn variance(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let m = mean(values);
    values.iter().map(|x| (x - m).powi(2)).sum::<f64>() / values.len() as f64
}

fn fraction(values: &[f64], predicate: impl Fn(f64) -> bool) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().filter(|v| predicate(**v)).count() as f64 / values.len() as f64
}

/// Average points over the last `window` matches
pub fn form(points: &[f64], window: usize) -> f64 {
    mean(tail(points, window))
}

/// Mean minutes over the last `window` matches
pub fn mean_minutes(minutes: &[f64], window: usize) -> f64 {
    mean(tail(minutes, window))
}

/// 1 - std/90 over the window, clipped to [0, 1]. Needs two samples.
pub fn minutes_consistency(minutes: &[f64], window: usize) -> f64 {
    let recent = tail(minutes, window);
    if recent.len() < 2 {
        return 0.0;
    }
    let std = variance(recent).sqrt();
    (1.0 - std / FULL_MATCH_MINUTES).clamp(0.0, 1.0)
}

/// Raw standard deviation of minutes over the window. Needs two samples.
pub fn minutes_std(minutes: &[f64], window: usize) -> f64 {
    minutes_variance(minutes, window).sqrt()
}

/// Population variance of minutes over the window. Needs two samples.
pub fn minutes_variance(minutes: &[f64], window: usize) -> f64 {
    let recent = tail(minutes, window);
    if recent.len() < 2 {
        return 0.0;
    }
    variance(recent)
}

/// Least-squares slope of minutes against match index, fitted on played
/// (nonzero) games only, in full matches per game and clipped to [-1, 1].
pub fn minutes_trend(minutes: &[f64], window: usize) -> f64 {
    let played: Vec<(f64, f64)> = tail(minutes, window)
        .iter()
        .enumerate()
        .filter(|(_, m)| **m > 0.0)
        .map(|(i, m)| (i as f64, *m))
        .collect();

    if played.len() < 2 {
        return 0.0;
    }

    let n = played.len() as f64;
    let x_mean = played.iter().map(|(x, _)| x).sum::<f64>() / n;
    let y_mean = played.iter().map(|(_, y)| y).sum::<f64>() / n;
    let sxy: f64 = played
        .iter()
        .map(|(x, y)| (x - x_mean) * (y - y_mean))
        .sum();
    let sxx: f64 = played.iter().map(|(x, _)| (x - x_mean).powi(2)).sum();

    if sxx == 0.0 {
        return 0.0;
    }
    (sxy / sxx / FULL_MATCH_MINUTES).clamp(-1.0, 1.0)
}

/// Relative change between the two most recent appearances, clipped to [-1, 1]
pub fn minutes_momentum(minutes: &[f64], window: usize) -> f64 {
    let recent = tail(minutes, window);
    if minutes.len() < 2 || recent.len() < 2 {
        return 0.0;
    }

    let latest = recent[recent.len() - 1];
    let previous = recent[recent.len() - 2];

    let momentum = if previous == 0.0 {
        if latest > 0.0 {
            0.5
        } else {
            0.0
        }
    } else {
        (latest - previous) / previous
    };
    momentum.clamp(-1.0, 1.0)
}

/// 0.7 x share of benched games + 0.3 x share of partial games.
/// Unknown players sit at medium risk.
pub fn rotation_risk(minutes: &[f64], window: usize) -> f64 {
    let recent = tail(minutes, window);
    if recent.is_empty() {
        return 0.5;
    }
    let bench_rate = fraction(recent, |m| m == 0.0);
    let sub_rate = fraction(recent, |m| m > 0.0 && m < PARTIAL_MINUTES);
    (0.7 * bench_rate + 0.3 * sub_rate).clamp(0.0, 1.0)
}

/// Share of recent games with 60+ minutes
pub fn starter_probability(minutes: &[f64], window: usize) -> f64 {
    let recent = tail(minutes, window);
    if recent.is_empty() {
        return 0.5;
    }
    fraction(recent, |m| m >= STARTER_MINUTES).clamp(0.0, 1.0)
}

/// Drop in average minutes from the early half of the window to the late
/// half. A zero-minute latest game is treated as maximum risk.
pub fn injury_risk(minutes: &[f64], window: usize) -> f64 {
    if minutes.len() < 2 {
        return 0.0;
    }
    let recent = tail(minutes, window);
    match recent.last() {
        None => return 0.0,
        Some(latest) if *latest == 0.0 => return 1.0,
        Some(_) => {}
    }

    let mid = recent.len() / 2;
    let early_avg = mean(&recent[..mid]);
    let late_avg = mean(&recent[mid..]);

    if early_avg == 0.0 {
        return 0.0;
    }
    ((early_avg - late_avg) / early_avg).clamp(0.0, 1.0)
}

/// Mean goal contributions (goals + assists) per match
pub fn goal_threat(contributions: &[f64], window: usize) -> f64 {
    mean(tail(contributions, window))
}

/// Share of recent games where the player got on the pitch
pub fn games_with_minutes(minutes: &[f64], window: usize) -> f64 {
    fraction(tail(minutes, window), |m| m >= 1.0)
}

/// Average of start rate and minutes stability, in [0, 1]
pub fn playing_time_reliability(minutes: &[f64], window: usize) -> f64 {
    let recent = tail(minutes, window);
    if recent.is_empty() {
        return 0.0;
    }

    let start_rate = fraction(recent, |m| m > 0.0);

    let consistency = if recent.len() > 1 {
        let played: Vec<f64> = recent.iter().copied().filter(|m| *m > 0.0).collect();
        if played.is_empty() {
            0.0
        } else {
            1.0 / (1.0 + variance(&played) / PARTIAL_MINUTES)
        }
    } else if recent[0] > 0.0 {
        1.0
    } else {
        0.0
    };

    ((start_rate + consistency) / 2.0).clamp(0.0, 1.0)
}

/// Share of available minutes actually played across the whole history
pub fn minutes_per_90(minutes: &[f64]) -> f64 {
    if minutes.is_empty() {
        return 0.0;
    }
    let potential = minutes.len() as f64 * FULL_MATCH_MINUTES;
    (minutes.iter().sum::<f64>() / potential).min(1.0)
}

/// Mean of the values present in the window; `None` when the source never
/// reported one. Missing entries are skipped, never read as zero.
pub fn optional_mean(values: &[Option<f64>], window: usize) -> Option<f64> {
    let present: Vec<f64> = tail(values, window).iter().flatten().copied().collect();
    if present.is_empty() {
        None
    } else {
        Some(mean(&present))
    }
}

/// Goals minus expected goals over the window, counting only matches that
/// carry an xG value. `None` without xG data or when the window's xG sums
/// to zero.
pub fn xg_outperformance(xg: &[Option<f64>], goals: &[f64], window: usize) -> Option<f64> {
    debug_assert_eq!(xg.len(), goals.len());
    let (total_xg, total_goals, paired) = tail(xg, window)
        .iter()
        .zip(tail(goals, window))
        .filter_map(|(x, g)| x.map(|x| (x, *g)))
        .fold((0.0, 0.0, 0usize), |(sx, sg, n), (x, g)| (sx + x, sg + g, n + 1));

    if paired == 0 || total_xg <= 0.0 {
        return None;
    }
    Some(total_goals - total_xg)
}
