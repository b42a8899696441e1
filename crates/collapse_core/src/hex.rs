//! Axial hex-grid geometry.
//!
//! Coordinates are axial `(q, r)` with the cube component `s = -q - r`
//! implied. A map of radius `R` contains every hex with
//! `max(|q|, |r|, |s|) <= R`.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::rng::SimRng;

/// An axial hex coordinate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub struct HexCoord {
    /// Column axis.
    pub q: i32,
    /// Row axis.
    pub r: i32,
}

/// Axial direction offsets: E, NE, NW, W, SW, SE.
pub const DIRECTIONS: [HexCoord; 6] = [
    HexCoord::new(1, 0),
    HexCoord::new(1, -1),
    HexCoord::new(0, -1),
    HexCoord::new(-1, 0),
    HexCoord::new(-1, 1),
    HexCoord::new(0, 1),
];

impl HexCoord {
    /// Create a coordinate.
    #[must_use]
    pub const fn new(q: i32, r: i32) -> Self {
        Self { q, r }
    }

    /// The map centre.
    pub const ORIGIN: Self = Self::new(0, 0);

    /// Implied cube component.
    #[must_use]
    pub const fn s(self) -> i32 {
        -self.q - self.r
    }

    /// Hex distance between two coordinates.
    #[must_use]
    pub fn distance(self, other: Self) -> u32 {
        let dq = self.q - other.q;
        let dr = self.r - other.r;
        (dq.unsigned_abs() + (dq + dr).unsigned_abs() + dr.unsigned_abs()) / 2
    }

    /// Distance from the map centre.
    #[must_use]
    pub fn length(self) -> u32 {
        self.distance(Self::ORIGIN)
    }

    /// Component-wise offset.
    #[must_use]
    pub const fn offset(self, by: Self) -> Self {
        Self::new(self.q + by.q, self.r + by.r)
    }

    /// Scale an offset by an integer factor.
    #[must_use]
    pub const fn scale(self, factor: i32) -> Self {
        Self::new(self.q * factor, self.r * factor)
    }
}

impl fmt::Display for HexCoord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.q, self.r)
    }
}

/// Bounded hexagonal map.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct HexGrid {
    radius: u32,
}

impl HexGrid {
    /// Create a map of the given radius.
    #[must_use]
    pub const fn new(radius: u32) -> Self {
        Self { radius }
    }

    /// Map radius.
    #[must_use]
    pub const fn radius(&self) -> u32 {
        self.radius
    }

    /// Whether a coordinate lies on the map.
    #[must_use]
    pub fn is_valid(&self, hex: HexCoord) -> bool {
        hex.q.unsigned_abs() <= self.radius
            && hex.r.unsigned_abs() <= self.radius
            && hex.s().unsigned_abs() <= self.radius
    }

    /// Valid neighbours of a hex, in E, NE, NW, W, SW, SE order.
    #[must_use]
    pub fn neighbors(&self, hex: HexCoord) -> Vec<HexCoord> {
        DIRECTIONS
            .iter()
            .map(|&dir| hex.offset(dir))
            .filter(|&n| self.is_valid(n))
            .collect()
    }

    /// Uniformly random valid hex.
    pub fn random_hex(&self, rng: &mut SimRng) -> HexCoord {
        let r = self.radius as i32;
        loop {
            let hex = HexCoord::new(rng.range_inclusive(-r, r), rng.range_inclusive(-r, r));
            if self.is_valid(hex) {
                return hex;
            }
        }
    }

    /// Hexes at exactly `radius` steps from `center`, in ring order.
    ///
    /// Hexes that fall off the map are skipped. A radius of zero yields the
    /// centre itself.
    #[must_use]
    pub fn ring(&self, center: HexCoord, radius: u32) -> Vec<HexCoord> {
        if radius == 0 {
            return if self.is_valid(center) {
                vec![center]
            } else {
                Vec::new()
            };
        }

        let mut out = Vec::with_capacity(6 * radius as usize);
        // Start at the SW corner and walk each of the six sides.
        let mut hex = center.offset(DIRECTIONS[4].scale(radius as i32));
        for dir in DIRECTIONS {
            for _ in 0..radius {
                if self.is_valid(hex) {
                    out.push(hex);
                }
                hex = hex.offset(dir);
            }
        }
        out
    }

    /// Straight-line path from `start` to `end`, excluding `start`.
    ///
    /// Samples `N = distance(start, end)` points at `t = i / N` and rounds
    /// each axial axis on its own (half rounds toward positive infinity).
    /// There is no cube correction, so a sample may leave the hex line or
    /// even fall off the map near the rim; callers get exactly those points.
    #[must_use]
    pub fn line(start: HexCoord, end: HexCoord) -> Vec<HexCoord> {
        let n = start.distance(end) as i64;
        if n == 0 {
            return Vec::new();
        }
        (1..=n)
            .map(|i| {
                HexCoord::new(
                    lerp_round(start.q, end.q, i, n),
                    lerp_round(start.r, end.r, i, n),
                )
            })
            .collect()
    }
}

/// `round(a * (1 - i/n) + b * (i/n))` with round-half-up, in exact integers.
fn lerp_round(a: i32, b: i32, i: i64, n: i64) -> i32 {
    let numerator = i64::from(a) * (n - i) + i64::from(b) * i;
    (2 * numerator + n).div_euclid(2 * n) as i32
}
