use std::fmt;

use rand::Rng;
use serde::{Deserialize, Serialize};

/// Destination category an actor must match when delivering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Instruction {
    Sorting,
    Stacking,
    Delivery,
}

impl Instruction {
    pub const ALL: [Instruction; 3] = [
        Instruction::Sorting,
        Instruction::Stacking,
        Instruction::Delivery,
    ];

    pub fn random<R: Rng + ?Sized>(rng: &mut R) -> Self {
        Self::ALL[rng.random_range(0..Self::ALL.len())]
    }

    pub fn index(&self) -> usize {
        match self {
            Instruction::Sorting => 0,
            Instruction::Stacking => 1,
            Instruction::Delivery => 2,
        }
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Instruction::Sorting => "SortingArea",
            Instruction::Stacking => "StackingArea",
            Instruction::Delivery => "DeliveryArea",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TaskAssignment {
    instruction: Instruction,
}

impl TaskAssignment {
    pub fn new<R: Rng + ?Sized>(rng: &mut R) -> Self {
        Self {
            instruction: Instruction::random(rng),
        }
    }

    pub fn fixed(instruction: Instruction) -> Self {
        Self { instruction }
    }

    pub fn instruction(&self) -> Instruction {
        self.instruction
    }

    pub fn matches(&self, zone: Instruction) -> bool {
        self.instruction == zone
    }

    /// Draws a fresh instruction from the full enumeration.
    pub fn reroll<R: Rng + ?Sized>(&mut self, rng: &mut R) -> Instruction {
        self.instruction = Instruction::random(rng);
        self.instruction
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    #[test]
    fn reroll_is_roughly_uniform() {
        let mut rng = StdRng::seed_from_u64(2024);
        let mut task = TaskAssignment::new(&mut rng);
        let mut counts = [0usize; 3];
        for _ in 0..3000 {
            counts[task.reroll(&mut rng).index()] += 1;
        }
        for count in counts {
            assert!((850..=1150).contains(&count), "counts: {:?}", counts);
        }
    }

    #[test]
    fn display_uses_zone_tags() {
        assert_eq!(Instruction::Stacking.to_string(), "StackingArea");
    }
}
