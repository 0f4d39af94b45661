//! Void-tolerant bilinear interpolation over a 2x2 sample neighbourhood.

use crate::grid::VOID_VALUE;

/// What kind of track a lookup is filling in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TrackKind {
    /// A track the user recorded or edited. Values near voids are synthesised.
    #[default]
    Primary,
    /// A track built by the application, such as a terrain profile. Any void
    /// in the neighbourhood yields no value.
    Derived,
}

/// Four neighbouring samples around a point.
///
/// Order is `[bottom_left, bottom_right, top_left, top_right]`.
pub type Neighbourhood = [i16; 4];

/// Interpolate an elevation from four neighbours.
///
/// `alpha` is the fractional offset towards the right-hand column and
/// `beta` towards the top row, both in `[0, 1)`.
///
/// | voids | result                                          |
/// |-------|-------------------------------------------------|
/// | 0     | bilinear                                        |
/// | 1     | void replaced by the mean of the others, then bilinear |
/// | 2, 3  | mean of the remaining samples                   |
/// | 4     | `None`                                          |
///
/// For [`TrackKind::Derived`] any void at all yields `None`.
pub fn interpolate(samples: Neighbourhood, alpha: f64, beta: f64, kind: TrackKind) -> Option<f64> {
    let voids = samples.iter().filter(|&&s| s == VOID_VALUE).count();
    if voids > 0 && kind == TrackKind::Derived {
        return None;
    }

    match voids {
        0 => Some(bilinear(samples.map(f64::from), alpha, beta)),
        1 => {
            let fill = round_half_up(mean_non_void(&samples)?);
            let filled = samples.map(|s| if s == VOID_VALUE { fill } else { f64::from(s) });
            Some(bilinear(filled, alpha, beta))
        }
        2 | 3 => mean_non_void(&samples),
        _ => None,
    }
}

fn bilinear([bl, br, tl, tr]: [f64; 4], alpha: f64, beta: f64) -> f64 {
    (1.0 - alpha) * (1.0 - beta) * bl
        + alpha * (1.0 - beta) * br
        + (1.0 - alpha) * beta * tl
        + alpha * beta * tr
}

/// Mean of the non-void samples, `None` if all are void.
fn mean_non_void(samples: &Neighbourhood) -> Option<f64> {
    let (sum, count) = samples
        .iter()
        .filter(|&&s| s != VOID_VALUE)
        .fold((0.0, 0u32), |(sum, n), &s| (sum + f64::from(s), n + 1));
    (count > 0).then(|| sum / f64::from(count))
}

// Ties round towards positive infinity.
fn round_half_up(value: f64) -> f64 {
    (value + 0.5).floor()
}
