//! Average speed derivation for race participants.
//!
//! Trotting races publish each horse's elapsed time, so speed is direct.
//! Other disciplines only publish the winner's time and, per horse, the gap
//! to the horse that finished just ahead. Those speeds are derived by walking
//! the arrival order and subtracting each gap from the distance the previous
//! horse covered when the winner crossed the line.

use std::sync::OnceLock;

use regex::Regex;
use tracing::warn;

/// Approximate length of a horse in metres
pub const HORSE_LENGTH_METRES: f64 = 2.4;

/// Sort rank used for participants without a finishing rank
pub const UNRANKED: u32 = 1000;

/// How speeds are obtained for a race
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpeedBasis {
    /// Every participant has its own elapsed time
    ElapsedTime,
    /// Only the winner's time is known; others are placed by distance behind
    DistanceBehind,
}

impl SpeedBasis {
    /// Pick the basis from a meeting's parent discipline
    pub fn for_discipline(discipline: &str) -> Self {
        if discipline == "TROT" {
            SpeedBasis::ElapsedTime
        } else {
            SpeedBasis::DistanceBehind
        }
    }
}

/// Per-participant inputs, in arrival order
#[derive(Debug, Clone, Copy, Default)]
pub struct SpeedInput<'a> {
    pub rank: Option<u32>,
    /// Elapsed time, same unit as the race duration
    pub elapsed: Option<f64>,
    /// Raw distance-behind label, e.g. "1 Lon 1/2"
    pub distance_behind: Option<&'a str>,
}

/// Derive one speed per input.
///
/// `inputs` must already be sorted by arrival (see [`arrival_rank`]); the
/// distance-behind basis depends on that order.
pub fn derive_speeds(
    basis: SpeedBasis,
    length: f64,
    duration: Option<f64>,
    inputs: &[SpeedInput<'_>],
) -> Vec<Option<f64>> {
    match basis {
        SpeedBasis::ElapsedTime => inputs
            .iter()
            .map(|input| input.elapsed.and_then(|t| positive(length / t)))
            .collect(),
        SpeedBasis::DistanceBehind => {
            let (_, speeds) = inputs.iter().fold(
                (length, Vec::with_capacity(inputs.len())),
                |(covered, mut speeds), input| {
                    let (covered, speed) = distance_step(length, duration, covered, input);
                    speeds.push(speed);
                    (covered, speeds)
                },
            );
            speeds
        }
    }
}

/// One step of the arrival walk: returns the distance this horse had covered
/// when the winner finished (carried to the next horse) and its speed.
fn distance_step(
    length: f64,
    duration: Option<f64>,
    covered: f64,
    input: &SpeedInput<'_>,
) -> (f64, Option<f64>) {
    let Some(duration) = duration.filter(|d| *d > 0.0) else {
        return (covered, None);
    };

    match (input.rank, input.distance_behind) {
        (Some(1), _) => (covered, positive(length / duration)),
        (None, _) | (Some(_), None) => (covered, None),
        (Some(rank), Some(label)) => match convert_horse_distance(label) {
            Some(gap) => {
                let covered = covered - gap;
                (covered, positive(covered / duration))
            }
            None => {
                warn!("Unknown distance label '{}' for rank {}", label, rank);
                (covered, None)
            }
        },
    }
}

/// Sort key placing unranked participants after every ranked one
pub fn arrival_rank(rank: Option<u32>) -> u32 {
    rank.unwrap_or(UNRANKED)
}

fn positive(value: f64) -> Option<f64> {
    (value.is_finite() && value > 0.0).then_some(value)
}

fn lengths_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        // "2 lon", "3/4 lon", "1 lon 1/4", "1 1/2 l"
        Regex::new(r"^(?:(\d+)\s*)?(?:(\d+)/(\d+)\s*)?(?:longueurs?|lon|l)\.?\s*(?:(\d+)/(\d+))?$")
            .unwrap()
    })
}

/// Convert a distance-behind label into metres.
///
/// Returns `None` for labels that do not describe a distance.
pub fn convert_horse_distance(label: &str) -> Option<f64> {
    let normalized = label
        .trim()
        .to_lowercase()
        .replace(['ê', 'é', 'è'], "e")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ");

    let lengths = match normalized.as_str() {
        "" => return None,
        "nez" => 0.05,
        "courte tete" | "ct tete" => 0.1,
        "tete" => 0.2,
        "courte encolure" | "ct encolure" => 0.25,
        "encolure" => 0.3,
        "loin" => 30.0,
        other => match other.replace(',', ".").parse::<f64>() {
            Ok(value) => value,
            Err(_) => parse_lengths(other)?,
        },
    };

    positive(lengths).map(|l| l * HORSE_LENGTH_METRES)
}

fn parse_lengths(label: &str) -> Option<f64> {
    let caps = lengths_regex().captures(label)?;
    let number = |i: usize| caps.get(i).and_then(|m| m.as_str().parse::<f64>().ok());
    let fraction = |num: usize, den: usize| match (number(num), number(den)) {
        (Some(n), Some(d)) if d > 0.0 => Some(n / d),
        _ => None,
    };

    let whole = number(1);
    let before = fraction(2, 3);
    let after = fraction(4, 5);
    if whole.is_none() && before.is_none() {
        return None;
    }

    Some(whole.unwrap_or(0.0) + before.unwrap_or(0.0) + after.unwrap_or(0.0))
}
