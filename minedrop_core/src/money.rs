use serde::{Deserialize, Serialize};
use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign, Sub, SubAssign};

// Fixed-point amounts so balance accounting never drifts:
// Credits are 1/10_000 units, Multipliers are hundredths.

/// Number of credit units per whole currency unit.
pub const CREDIT_SCALE: i64 = 10_000;

/// Number of multiplier units per `1.0×`.
pub const MULTIPLIER_SCALE: u32 = 100;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Credits(i64);

impl Credits {
    pub const ZERO: Credits = Credits(0);

    pub const fn from_units(units: i64) -> Self {
        Self(units)
    }

    pub const fn units(self) -> i64 {
        self.0
    }

    pub const fn whole(amount: i64) -> Self {
        Self(amount * CREDIT_SCALE)
    }

    /// Whole cents, the granularity bets are quoted in.
    pub const fn cents(cents: i64) -> Self {
        Self(cents * (CREDIT_SCALE / 100))
    }

    /// Rounds a display amount to the nearest credit unit.
    pub fn from_f64(amount: f64) -> Self {
        Self((amount * CREDIT_SCALE as f64).round() as i64)
    }

    pub fn as_f64(self) -> f64 {
        self.0 as f64 / CREDIT_SCALE as f64
    }

    pub fn is_positive(self) -> bool {
        self.0 > 0
    }

    /// `self × multiplier`, truncated toward zero at one credit unit.
    /// `None` if the product does not fit.
    pub fn times(self, multiplier: Multiplier) -> Option<Credits> {
        let scaled = i128::from(self.0).checked_mul(i128::from(multiplier.hundredths()))?;
        i64::try_from(scaled / i128::from(MULTIPLIER_SCALE)).ok().map(Credits)
    }

    pub fn checked_add(self, rhs: Credits) -> Option<Credits> {
        self.0.checked_add(rhs.0).map(Credits)
    }

    pub fn checked_sub(self, rhs: Credits) -> Option<Credits> {
        self.0.checked_sub(rhs.0).map(Credits)
    }

    /// Sum that reports overflow instead of wrapping.
    pub fn checked_sum(amounts: impl IntoIterator<Item = Credits>) -> Option<Credits> {
        amounts.into_iter().try_fold(Credits::ZERO, Credits::checked_add)
    }

    /// How many times `bet` fits into `self`, as a multiplier (truncated).
    pub fn ratio_to(self, bet: Credits) -> Option<Multiplier> {
        if bet.0 <= 0 || self.0 < 0 {
            return None;
        }
        let hundredths = i128::from(self.0) * i128::from(MULTIPLIER_SCALE) / i128::from(bet.0);
        u32::try_from(hundredths).ok().map(Multiplier::from_hundredths)
    }
}

impl Add for Credits {
    type Output = Credits;
    fn add(self, rhs: Credits) -> Credits {
        Credits(self.0 + rhs.0)
    }
}

impl AddAssign for Credits {
    fn add_assign(&mut self, rhs: Credits) {
        self.0 += rhs.0;
    }
}

impl Sub for Credits {
    type Output = Credits;
    fn sub(self, rhs: Credits) -> Credits {
        Credits(self.0 - rhs.0)
    }
}

impl SubAssign for Credits {
    fn sub_assign(&mut self, rhs: Credits) {
        self.0 -= rhs.0;
    }
}

impl Sum for Credits {
    fn sum<I: Iterator<Item = Credits>>(iter: I) -> Credits {
        iter.fold(Credits::ZERO, Add::add)
    }
}

impl fmt::Display for Credits {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.unsigned_abs();
        let scale = CREDIT_SCALE as u64;
        write!(f, "{sign}{}.{:04}", abs / scale, abs % scale)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Multiplier(u32);

impl Multiplier {
    pub const ZERO: Multiplier = Multiplier(0);

    pub const fn from_hundredths(hundredths: u32) -> Self {
        Self(hundredths)
    }

    pub const fn whole(times: u32) -> Self {
        Self(times * MULTIPLIER_SCALE)
    }

    pub fn whole_checked(times: u32) -> Option<Self> {
        times.checked_mul(MULTIPLIER_SCALE).map(Self)
    }

    pub const fn hundredths(self) -> u32 {
        self.0
    }

    pub fn as_f64(self) -> f64 {
        f64::from(self.0) / f64::from(MULTIPLIER_SCALE)
    }
}

impl Add for Multiplier {
    type Output = Multiplier;
    fn add(self, rhs: Multiplier) -> Multiplier {
        Multiplier(self.0 + rhs.0)
    }
}

impl AddAssign for Multiplier {
    fn add_assign(&mut self, rhs: Multiplier) {
        self.0 += rhs.0;
    }
}

impl Sum for Multiplier {
    fn sum<I: Iterator<Item = Multiplier>>(iter: I) -> Multiplier {
        iter.fold(Multiplier::ZERO, Add::add)
    }
}

impl fmt::Display for Multiplier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{:02}x", self.0 / MULTIPLIER_SCALE, self.0 % MULTIPLIER_SCALE)
    }
}
