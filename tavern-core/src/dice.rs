//! Dice rolling for the turn resolver.
//!
//! Supports simple dice notation: `<count>d<sides>[+|-<modifier>]`, e.g.
//! "1d20", "2d6+3", "3d8-2". Bounds are deliberately wider than tabletop
//! dice (up to 100 dice of up to 1000 sides) so that generator-suggested
//! expressions are tolerated rather than rejected.

use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Maximum number of dice in one expression.
const MAX_COUNT: u32 = 100;

/// Maximum number of sides per die.
const MAX_SIDES: u32 = 1000;

/// Error type for dice parsing and rolling.
#[derive(Debug, Error)]
pub enum DiceError {
    #[error("Invalid dice expression: {0}")]
    InvalidExpression(String),
}

/// A parsed dice expression (e.g. 2d6+3).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiceExpression {
    pub count: u32,
    pub sides: u32,
    pub modifier: i32,
}

impl DiceExpression {
    /// Parse a dice notation string.
    pub fn parse(notation: &str) -> Result<Self, DiceError> {
        let normalized = notation.trim().to_lowercase();
        let invalid = || DiceError::InvalidExpression(notation.to_string());

        let (count_str, rest) = normalized.split_once('d').ok_or_else(invalid)?;

        let (sides_str, modifier) = if let Some(pos) = rest.find(['+', '-']) {
            let sides_str = &rest[..pos];
            let modifier: i32 = rest[pos..].parse().map_err(|_| invalid())?;
            (sides_str, modifier)
        } else {
            (rest, 0)
        };

        let count: u32 = count_str.parse().map_err(|_| invalid())?;
        let sides: u32 = sides_str.parse().map_err(|_| invalid())?;

        if count == 0 || count > MAX_COUNT {
            return Err(invalid());
        }
        if sides == 0 || sides > MAX_SIDES {
            return Err(invalid());
        }

        Ok(DiceExpression {
            count,
            sides,
            modifier,
        })
    }

    /// Roll with a specific RNG (useful for testing).
    pub fn roll_with_rng<R: Rng>(&self, rng: &mut R) -> i32 {
        let dice: i32 = (0..self.count)
            .map(|_| rng.gen_range(1..=self.sides) as i32)
            .sum();
        dice + self.modifier
    }

    /// Roll the expression with the thread RNG.
    pub fn roll(&self) -> i32 {
        self.roll_with_rng(&mut rand::thread_rng())
    }

    /// Smallest possible result.
    pub fn min(&self) -> i32 {
        self.count as i32 + self.modifier
    }

    /// Largest possible result.
    pub fn max(&self) -> i32 {
        (self.count * self.sides) as i32 + self.modifier
    }
}

impl FromStr for DiceExpression {
    type Err = DiceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        DiceExpression::parse(s)
    }
}

impl fmt::Display for DiceExpression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}d{}", self.count, self.sides)?;
        if self.modifier > 0 {
            write!(f, "+{}", self.modifier)?;
        } else if self.modifier < 0 {
            write!(f, "{}", self.modifier)?;
        }
        Ok(())
    }
}

/// Convenience function to roll dice from a notation string.
pub fn roll(notation: &str) -> Result<i32, DiceError> {
    Ok(DiceExpression::parse(notation)?.roll())
}

/// Roll a single d20 with a specific RNG.
///
/// Returned as the raw face value so callers can detect a natural 20.
pub fn d20_with_rng<R: Rng>(rng: &mut R) -> u32 {
    rng.gen_range(1..=20)
}

/// Roll a single d20 with the thread RNG.
pub fn d20() -> u32 {
    d20_with_rng(&mut rand::thread_rng())
}
