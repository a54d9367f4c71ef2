//! Dice rolling value objects and parsing
//!
//! Supports dice formulas like "1d20+5", "2d6-1", "4d6kh3" (keep highest
//! three), "2d20kl1" (keep lowest one). Rolling takes the RNG as a closure so
//! callers inject entropy and tests stay deterministic.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

const MAX_DICE_COUNT: u32 = 100;
const MAX_DIE_SIZE: u32 = 1000;

/// Error when parsing a dice formula
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DiceParseError {
    /// The formula string is empty
    #[error("Empty dice formula")]
    Empty,
    /// Invalid format - expected XdY with optional khK/klK and +Z/-Z
    #[error("Invalid dice format: {0}")]
    InvalidFormat(String),
    /// Dice count must be 1..=100
    #[error("Dice count must be between 1 and {MAX_DICE_COUNT}")]
    InvalidDiceCount,
    /// Die size must be 2..=1000
    #[error("Die size must be between 2 and {MAX_DIE_SIZE}")]
    InvalidDieSize,
    /// Keep count must be at least 1 and no larger than the dice count
    #[error("Keep count must be between 1 and the number of dice")]
    InvalidKeepCount,
}

/// Which rolled dice count toward the total.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum KeepRule {
    /// Keep the K highest rolls (`khK`)
    Highest(u32),
    /// Keep the K lowest rolls (`klK`)
    Lowest(u32),
}

/// A parsed dice formula like "4d6kh3+2"
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiceFormula {
    /// Number of dice to roll (X in XdY)
    pub dice_count: u32,
    /// Size of each die (Y in XdY)
    pub die_size: u32,
    /// Optional keep-highest / keep-lowest rule
    pub keep: Option<KeepRule>,
    /// Modifier to add/subtract after rolling (+Z or -Z)
    pub modifier: i32,
}

impl DiceFormula {
    /// Create a new dice formula
    pub fn new(
        dice_count: u32,
        die_size: u32,
        keep: Option<KeepRule>,
        modifier: i32,
    ) -> Result<Self, DiceParseError> {
        if dice_count == 0 || dice_count > MAX_DICE_COUNT {
            return Err(DiceParseError::InvalidDiceCount);
        }
        if die_size < 2 || die_size > MAX_DIE_SIZE {
            return Err(DiceParseError::InvalidDieSize);
        }
        if let Some(KeepRule::Highest(k) | KeepRule::Lowest(k)) = keep {
            if k == 0 || k > dice_count {
                return Err(DiceParseError::InvalidKeepCount);
            }
        }
        Ok(Self {
            dice_count,
            die_size,
            keep,
            modifier,
        })
    }

    /// Parse a dice formula string.
    ///
    /// Supported formats:
    /// - "XdY" - Roll X dice of size Y ("dY" is shorthand for one die)
    /// - "XdYkhK" / "XdYklK" - keep the K highest / lowest rolls
    /// - trailing "+Z" / "-Z" - modifier applied after keeping
    ///
    /// Parsed by hand rather than with a regex dependency in the domain layer.
    pub fn parse(input: &str) -> Result<Self, DiceParseError> {
        let input = input.trim().to_lowercase();
        if input.is_empty() {
            return Err(DiceParseError::Empty);
        }

        // Find 'd' separator
        let d_pos = input.find('d').ok_or_else(|| {
            DiceParseError::InvalidFormat(format!("Missing 'd' separator in '{}'", input))
        })?;

        // Parse dice count (before 'd')
        let dice_count_str = &input[..d_pos];
        let dice_count: u32 = if dice_count_str.is_empty() {
            1 // "d20" means "1d20"
        } else {
            dice_count_str.parse().map_err(|_| {
                DiceParseError::InvalidFormat(format!("Invalid dice count: '{}'", dice_count_str))
            })?
        };

        // Die size: the run of digits after 'd'
        let after_d = &input[d_pos + 1..];
        let size_end = after_d
            .find(|c: char| !c.is_ascii_digit())
            .unwrap_or(after_d.len());
        let die_size_str = &after_d[..size_end];
        let die_size: u32 = die_size_str.parse().map_err(|_| {
            DiceParseError::InvalidFormat(format!("Invalid die size: '{}'", die_size_str))
        })?;

        // Optional keep rule: "khK" or "klK"
        let mut rest = &after_d[size_end..];
        let keep = if let Some(keep_str) = rest.strip_prefix("kh").or_else(|| rest.strip_prefix("kl")) {
            let highest = rest.starts_with("kh");
            let keep_end = keep_str
                .find(|c: char| !c.is_ascii_digit())
                .unwrap_or(keep_str.len());
            let count: u32 = keep_str[..keep_end].parse().map_err(|_| {
                DiceParseError::InvalidFormat(format!("Invalid keep count in '{}'", input))
            })?;
            rest = &keep_str[keep_end..];
            Some(if highest {
                KeepRule::Highest(count)
            } else {
                KeepRule::Lowest(count)
            })
        } else {
            None
        };

        // Optional trailing modifier: "+Z" or "-Z"
        let modifier: i32 = if rest.is_empty() {
            0
        } else if let Some(mod_str) = rest.strip_prefix('+') {
            mod_str.parse().map_err(|_| {
                DiceParseError::InvalidFormat(format!("Invalid modifier: '+{}'", mod_str))
            })?
        } else if let Some(mod_str) = rest.strip_prefix('-') {
            let value: i32 = mod_str.parse().map_err(|_| {
                DiceParseError::InvalidFormat(format!("Invalid modifier: '-{}'", mod_str))
            })?;
            -value
        } else {
            return Err(DiceParseError::InvalidFormat(format!(
                "Unexpected trailing input: '{}'",
                rest
            )));
        };

        Self::new(dice_count, die_size, keep, modifier)
    }

    /// Roll the dice, drawing each die from `roll_die(die_size)` which must
    /// return a value in `1..=die_size`.
    pub fn roll_with<R>(&self, mut roll_die: R) -> DiceRollResult
    where
        R: FnMut(u32) -> u32,
    {
        let mut individual_rolls = Vec::with_capacity(self.dice_count as usize);
        for _ in 0..self.dice_count {
            individual_rolls.push(roll_die(self.die_size) as i32);
        }

        let (kept_rolls, dropped_rolls) = self.split_kept(&individual_rolls);
        let dice_total: i32 = kept_rolls.iter().sum();
        let total = dice_total + self.modifier;

        DiceRollResult {
            formula: self.clone(),
            individual_rolls,
            kept_rolls,
            dropped_rolls,
            dice_total,
            modifier_applied: self.modifier,
            total,
        }
    }

    /// Split rolls into (kept, dropped) per the keep rule, preserving the
    /// rolled order within each group. Ties drop the earlier occurrence.
    fn split_kept(&self, rolls: &[i32]) -> (Vec<i32>, Vec<i32>) {
        let keep_count = match self.keep {
            None => return (rolls.to_vec(), Vec::new()),
            Some(KeepRule::Highest(k) | KeepRule::Lowest(k)) => k as usize,
        };

        let mut sorted = rolls.to_vec();
        sorted.sort_unstable();
        let drop_set: Vec<i32> = match self.keep {
            Some(KeepRule::Highest(_)) => sorted[..rolls.len() - keep_count].to_vec(),
            Some(KeepRule::Lowest(_)) => sorted[keep_count..].to_vec(),
            None => Vec::new(),
        };

        let mut to_drop = drop_set;
        let mut kept = Vec::with_capacity(keep_count);
        let mut dropped = Vec::with_capacity(rolls.len() - keep_count);
        for &roll in rolls {
            if let Some(pos) = to_drop.iter().position(|&d| d == roll) {
                to_drop.swap_remove(pos);
                dropped.push(roll);
            } else {
                kept.push(roll);
            }
        }
        (kept, dropped)
    }

    /// Number of dice that count toward the total.
    fn kept_count(&self) -> u32 {
        match self.keep {
            None => self.dice_count,
            Some(KeepRule::Highest(k) | KeepRule::Lowest(k)) => k,
        }
    }

    /// Get the minimum possible roll
    pub fn min_roll(&self) -> i32 {
        self.kept_count() as i32 + self.modifier
    }

    /// Get the maximum possible roll
    pub fn max_roll(&self) -> i32 {
        (self.kept_count() * self.die_size) as i32 + self.modifier
    }

    /// Format as a display string (e.g., "4d6kh3+2")
    pub fn display(&self) -> String {
        let mut out = format!("{}d{}", self.dice_count, self.die_size);
        match self.keep {
            Some(KeepRule::Highest(k)) => out.push_str(&format!("kh{}", k)),
            Some(KeepRule::Lowest(k)) => out.push_str(&format!("kl{}", k)),
            None => {}
        }
        if self.modifier > 0 {
            out.push_str(&format!("+{}", self.modifier));
        } else if self.modifier < 0 {
            out.push_str(&format!("{}", self.modifier));
        }
        out
    }
}

impl fmt::Display for DiceFormula {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.display())
    }
}

/// Result of rolling dice
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiceRollResult {
    /// The formula that was rolled
    pub formula: DiceFormula,
    /// Individual die results in rolled order
    pub individual_rolls: Vec<i32>,
    /// The rolls that count toward the total (all of them without a keep rule)
    pub kept_rolls: Vec<i32>,
    /// The rolls discarded by the keep rule
    pub dropped_rolls: Vec<i32>,
    /// Sum of kept dice before modifier
    pub dice_total: i32,
    /// Modifier that was applied
    pub modifier_applied: i32,
    /// Final total (dice_total + modifier)
    pub total: i32,
}

impl DiceRollResult {
    /// Format as a breakdown string, e.g. "4d6kh3[6, 5, 4, (1)] = 15".
    /// Dropped rolls appear in parentheses.
    pub fn breakdown(&self) -> String {
        let mut to_drop = self.dropped_rolls.clone();
        let rolls_str: Vec<String> = self
            .individual_rolls
            .iter()
            .map(|&roll| {
                if let Some(pos) = to_drop.iter().position(|&d| d == roll) {
                    to_drop.swap_remove(pos);
                    format!("({})", roll)
                } else {
                    roll.to_string()
                }
            })
            .collect();

        let dice_part = format!("{}[{}]", self.formula.display_bare(), rolls_str.join(", "));
        if self.modifier_applied == 0 {
            format!("{} = {}", dice_part, self.total)
        } else if self.modifier_applied > 0 {
            format!("{} + {} = {}", dice_part, self.modifier_applied, self.total)
        } else {
            format!("{} - {} = {}", dice_part, -self.modifier_applied, self.total)
        }
    }
}

impl DiceFormula {
    /// Display without the modifier suffix, for breakdown strings.
    fn display_bare(&self) -> String {
        let mut out = format!("{}d{}", self.dice_count, self.die_size);
        match self.keep {
            Some(KeepRule::Highest(k)) => out.push_str(&format!("kh{}", k)),
            Some(KeepRule::Lowest(k)) => out.push_str(&format!("kl{}", k)),
            None => {}
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fixed_rolls(values: &[u32]) -> impl FnMut(u32) -> u32 + '_ {
        let mut iter = values.iter().copied();
        move |_| iter.next().unwrap()
    }

    #[test]
    fn test_parse_simple_d20() {
        let formula = DiceFormula::parse("1d20").unwrap();
        assert_eq!(formula.dice_count, 1);
        assert_eq!(formula.die_size, 20);
        assert_eq!(formula.keep, None);
        assert_eq!(formula.modifier, 0);
    }

    #[test]
    fn test_parse_shorthand_d20() {
        let formula = DiceFormula::parse("d20").unwrap();
        assert_eq!(formula.dice_count, 1);
        assert_eq!(formula.die_size, 20);
    }

    #[test]
    fn test_parse_with_positive_modifier() {
        let formula = DiceFormula::parse("1d20+5").unwrap();
        assert_eq!(formula.modifier, 5);
    }

    #[test]
    fn test_parse_with_negative_modifier() {
        let formula = DiceFormula::parse("1d20-3").unwrap();
        assert_eq!(formula.modifier, -3);
    }

    #[test]
    fn test_parse_keep_highest() {
        let formula = DiceFormula::parse("4d6kh3").unwrap();
        assert_eq!(formula.dice_count, 4);
        assert_eq!(formula.die_size, 6);
        assert_eq!(formula.keep, Some(KeepRule::Highest(3)));
        assert_eq!(formula.modifier, 0);
    }

    #[test]
    fn test_parse_keep_lowest() {
        let formula = DiceFormula::parse("2d20kl1").unwrap();
        assert_eq!(formula.keep, Some(KeepRule::Lowest(1)));
    }

    #[test]
    fn test_parse_keep_with_modifier() {
        let formula = DiceFormula::parse("4d6kh3+2").unwrap();
        assert_eq!(formula.keep, Some(KeepRule::Highest(3)));
        assert_eq!(formula.modifier, 2);
    }

    #[test]
    fn test_parse_case_insensitive() {
        let formula = DiceFormula::parse("4D6KH3").unwrap();
        assert_eq!(formula.keep, Some(KeepRule::Highest(3)));
    }

    #[test]
    fn test_parse_with_whitespace() {
        let formula = DiceFormula::parse("  1d20+5  ").unwrap();
        assert_eq!(formula.modifier, 5);
    }

    #[test]
    fn test_parse_empty() {
        assert!(matches!(DiceFormula::parse(""), Err(DiceParseError::Empty)));
    }

    #[test]
    fn test_parse_invalid_no_d() {
        assert!(matches!(
            DiceFormula::parse("20"),
            Err(DiceParseError::InvalidFormat(_))
        ));
    }

    #[test]
    fn test_parse_invalid_zero_dice() {
        assert!(matches!(
            DiceFormula::parse("0d20"),
            Err(DiceParseError::InvalidDiceCount)
        ));
    }

    #[test]
    fn test_parse_invalid_die_size() {
        assert!(matches!(
            DiceFormula::parse("1d1"),
            Err(DiceParseError::InvalidDieSize)
        ));
    }

    #[test]
    fn test_parse_keep_more_than_rolled() {
        assert!(matches!(
            DiceFormula::parse("2d6kh3"),
            Err(DiceParseError::InvalidKeepCount)
        ));
    }

    #[test]
    fn test_parse_keep_zero() {
        assert!(matches!(
            DiceFormula::parse("4d6kh0"),
            Err(DiceParseError::InvalidKeepCount)
        ));
    }

    #[test]
    fn test_parse_trailing_garbage() {
        assert!(matches!(
            DiceFormula::parse("1d20x"),
            Err(DiceParseError::InvalidFormat(_))
        ));
    }

    #[test]
    fn test_roll_keep_highest_drops_lowest() {
        let formula = DiceFormula::parse("4d6kh3").unwrap();
        let result = formula.roll_with(fixed_rolls(&[6, 5, 4, 1]));

        assert_eq!(result.individual_rolls, vec![6, 5, 4, 1]);
        assert_eq!(result.kept_rolls, vec![6, 5, 4]);
        assert_eq!(result.dropped_rolls, vec![1]);
        assert_eq!(result.total, 15);
    }

    #[test]
    fn test_roll_keep_lowest() {
        let formula = DiceFormula::parse("2d20kl1").unwrap();
        let result = formula.roll_with(fixed_rolls(&[17, 3]));

        assert_eq!(result.kept_rolls, vec![3]);
        assert_eq!(result.dropped_rolls, vec![17]);
        assert_eq!(result.total, 3);
    }

    #[test]
    fn test_roll_keep_with_duplicate_values() {
        let formula = DiceFormula::parse("4d6kh3").unwrap();
        let result = formula.roll_with(fixed_rolls(&[4, 4, 4, 4]));

        assert_eq!(result.kept_rolls.len(), 3);
        assert_eq!(result.dropped_rolls, vec![4]);
        assert_eq!(result.total, 12);
    }

    #[test]
    fn test_roll_without_keep_keeps_everything() {
        let formula = DiceFormula::parse("2d6+3").unwrap();
        let result = formula.roll_with(fixed_rolls(&[4, 5]));

        assert_eq!(result.kept_rolls, vec![4, 5]);
        assert!(result.dropped_rolls.is_empty());
        assert_eq!(result.dice_total, 9);
        assert_eq!(result.total, 12);
    }

    #[test]
    fn test_min_max_respect_keep() {
        let formula = DiceFormula::parse("4d6kh3").unwrap();
        assert_eq!(formula.min_roll(), 3);
        assert_eq!(formula.max_roll(), 18);
    }

    #[test]
    fn test_breakdown_simple() {
        let formula = DiceFormula::parse("2d6+3").unwrap();
        let result = formula.roll_with(fixed_rolls(&[4, 5]));
        assert_eq!(result.breakdown(), "2d6[4, 5] + 3 = 12");
    }

    #[test]
    fn test_breakdown_marks_dropped_rolls() {
        let formula = DiceFormula::parse("4d6kh3").unwrap();
        let result = formula.roll_with(fixed_rolls(&[6, 5, 4, 1]));
        assert_eq!(result.breakdown(), "4d6kh3[6, 5, 4, (1)] = 15");
    }

    #[test]
    fn test_breakdown_negative_modifier() {
        let formula = DiceFormula::parse("1d20-3").unwrap();
        let result = formula.roll_with(fixed_rolls(&[11]));
        assert_eq!(result.breakdown(), "1d20[11] - 3 = 8");
    }

    #[test]
    fn test_display() {
        assert_eq!(DiceFormula::parse("1d20").unwrap().display(), "1d20");
        assert_eq!(DiceFormula::parse("1d20+5").unwrap().display(), "1d20+5");
        assert_eq!(DiceFormula::parse("1d20-3").unwrap().display(), "1d20-3");
        assert_eq!(
            DiceFormula::parse("4d6kh3+2").unwrap().display(),
            "4d6kh3+2"
        );
        assert_eq!(DiceFormula::parse("2d20kl1").unwrap().display(), "2d20kl1");
    }
}
