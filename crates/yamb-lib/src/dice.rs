use rand::Rng;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Rolls available at the start of every turn.
pub const ROLLS_PER_TURN: u8 = 3;
pub const FACES: u8 = 6;

const LOW_STRAIGHT_BONUS: u32 = 55;
const HIGH_STRAIGHT_BONUS: u32 = 60;
const FULL_HOUSE_BONUS: u32 = 30;
const POKER_BONUS: u32 = 50;
const YAMB_BONUS: u32 = 80;

#[derive(Debug, Copy, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub enum DiceCount {
    #[default]
    Five,
    Six,
}

impl DiceCount {
    pub fn get(self) -> usize {
        match self {
            DiceCount::Five => 5,
            DiceCount::Six => 6,
        }
    }
}

/// Reasons a category can't be scored with the currently held dice.
///
/// A category that *can* be evaluated but doesn't match (e.g. a full house
/// without a pair) is not an error, it simply scores 0 so a player can strike it.
#[derive(Copy, Clone, Debug, Error, PartialEq, Eq)]
pub enum CategoryError {
    #[error("All {0} dice must be held to score this category")]
    NeedAllDice(usize),
    #[error("Exactly four dice must be held to score poker")]
    NeedFourDice,
    #[error("Held die showing {held} does not match {face}")]
    FaceMismatch { face: u8, held: u8 },
    #[error("{0} is not a face of a die")]
    InvalidFace(u8),
}

pub type CategoryResult = Result<u32, CategoryError>;

/// The dice shared by everyone in a room. Only the player whose turn it is rolls them.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Dice {
    values: Vec<u8>,
    held: Vec<bool>,
    rolls_left: u8,
}

impl Dice {
    pub fn new(count: DiceCount) -> Self {
        let count = count.get();
        Self {
            values: (1..=count as u8).collect(),
            held: vec![false; count],
            rolls_left: ROLLS_PER_TURN,
        }
    }

    /// Dice showing `faces` as they would after the first roll of a turn, with nothing held.
    ///
    /// # Errors
    ///
    /// Returns [`CategoryError::InvalidFace`] if any face is outside `1..=6`.
    pub fn with_faces(faces: &[u8]) -> Result<Self, CategoryError> {
        if let Some(&face) = faces.iter().find(|f| !(1..=FACES).contains(*f)) {
            return Err(CategoryError::InvalidFace(face));
        }
        Ok(Self {
            values: faces.to_vec(),
            held: vec![false; faces.len()],
            rolls_left: ROLLS_PER_TURN - 1,
        })
    }

    pub fn values(&self) -> &[u8] {
        &self.values
    }

    pub fn held(&self) -> &[bool] {
        &self.held
    }

    pub fn rolls_left(&self) -> u8 {
        self.rolls_left
    }

    /// True once the dice have been rolled at least once this turn.
    pub fn rolled(&self) -> bool {
        self.rolls_left < ROLLS_PER_TURN
    }

    /// Re-rolls every die that isn't held. Returns `false` without touching anything
    /// when no rolls are left; deciding what happens then is up to the caller.
    pub fn roll(&mut self) -> bool {
        self.roll_with(&mut rand::thread_rng())
    }

    pub fn roll_with<R: Rng + ?Sized>(&mut self, rng: &mut R) -> bool {
        if self.rolls_left == 0 {
            return false;
        }
        for (value, held) in self.values.iter_mut().zip(&self.held) {
            if !held {
                *value = rng.gen_range(1..=FACES);
            }
        }
        self.rolls_left -= 1;
        true
    }

    /// Flips whether the die at `index` is held. Out of range indices are ignored.
    pub fn toggle(&mut self, index: usize) {
        if let Some(held) = self.held.get_mut(index) {
            *held = !*held;
        }
    }

    fn held_values(&self) -> impl Iterator<Item = u8> + '_ {
        self.values
            .iter()
            .zip(&self.held)
            .filter_map(|(&v, &held)| held.then_some(v))
    }

    fn len(&self) -> usize {
        self.values.len()
    }

    fn held_count(&self) -> usize {
        self.held.iter().filter(|&&h| h).count()
    }

    fn held_sum(&self) -> u32 {
        self.held_values().map(u32::from).sum()
    }

    fn require_all_held(&self) -> Result<(), CategoryError> {
        if self.held_count() != self.len() {
            return Err(CategoryError::NeedAllDice(self.len()));
        }
        Ok(())
    }

    /// Occurrences of each face among the held dice, indexed by face.
    fn counts(&self) -> [u8; FACES as usize + 1] {
        let mut counts = [0; FACES as usize + 1];
        for v in self.held_values() {
            counts[usize::from(v)] += 1;
        }
        counts
    }

    /// Sum of the held dice, all of which must show `face`. Holding nothing scores 0.
    pub fn number(&self, face: u8) -> CategoryResult {
        if !(1..=FACES).contains(&face) {
            return Err(CategoryError::InvalidFace(face));
        }
        if let Some(held) = self.held_values().find(|&v| v != face) {
            return Err(CategoryError::FaceMismatch { face, held });
        }
        Ok(self.held_sum())
    }

    /// Used for both the max and min rows.
    pub fn min_max(&self) -> CategoryResult {
        self.require_all_held()?;
        Ok(self.held_sum())
    }

    pub fn straight(&self) -> CategoryResult {
        self.require_all_held()?;
        let counts = self.counts();
        let covers = |mut faces: std::ops::RangeInclusive<usize>| faces.all(|f| counts[f] > 0);

        if covers(2..=6) {
            Ok(HIGH_STRAIGHT_BONUS)
        } else if covers(1..=5) {
            Ok(LOW_STRAIGHT_BONUS)
        } else {
            Ok(0)
        }
    }

    pub fn full_house(&self) -> CategoryResult {
        self.require_all_held()?;
        let counts = self.counts();
        let triple = counts.iter().any(|&c| c == 3);
        let pair = counts.iter().any(|&c| c == 2);
        if triple && pair {
            Ok(self.held_sum() + FULL_HOUSE_BONUS)
        } else {
            Ok(0)
        }
    }

    /// Four of a kind. Exactly four dice must be held.
    pub fn poker(&self) -> CategoryResult {
        if self.held_count() != 4 {
            return Err(CategoryError::NeedFourDice);
        }
        Ok(self
            .all_same()
            .map_or(0, |face| u32::from(face) * 4 + POKER_BONUS))
    }

    /// Every die showing the same face.
    pub fn yamb(&self) -> CategoryResult {
        self.require_all_held()?;
        let count = self.len() as u32;
        Ok(self
            .all_same()
            .map_or(0, |face| u32::from(face) * count + YAMB_BONUS))
    }

    fn all_same(&self) -> Option<u8> {
        let mut held = self.held_values();
        let first = held.next()?;
        held.all(|v| v == first).then_some(first)
    }
}

#[cfg(test)]
mod test {
    use proptest::prelude::*;
    use rand::{rngs::StdRng, SeedableRng};

    use super::{CategoryError, Dice, DiceCount, ROLLS_PER_TURN};

    fn held(faces: &[u8]) -> Dice {
        let mut dice = Dice::with_faces(faces).unwrap();
        for i in 0..faces.len() {
            dice.toggle(i);
        }
        dice
    }

    #[test]
    fn new_dice() {
        let dice = Dice::new(DiceCount::Six);
        assert_eq!(dice.values(), &[1, 2, 3, 4, 5, 6]);
        assert_eq!(dice.held(), &[false; 6]);
        assert_eq!(dice.rolls_left(), ROLLS_PER_TURN);
        assert!(!dice.rolled());
    }

    #[test]
    fn roll_keeps_held_dice() {
        let mut rng = StdRng::seed_from_u64(7);
        for count in [DiceCount::Five, DiceCount::Six] {
            let mut dice = Dice::new(count);
            dice.toggle(0);
            dice.toggle(2);

            for _ in 0..ROLLS_PER_TURN {
                assert!(dice.roll_with(&mut rng));
                assert_eq!(dice.values()[0], 1);
                assert_eq!(dice.values()[2], 3);
                assert!(dice.values().iter().all(|v| (1..=6).contains(v)));
                assert_eq!(dice.held().len(), count.get());
            }
            assert_eq!(dice.rolls_left(), 0);

            // Exhausted dice don't change
            let before = dice.clone();
            assert!(!dice.roll_with(&mut rng));
            assert_eq!(dice, before);
        }
    }

    #[test]
    fn with_faces_rejects_invalid_faces() {
        assert_eq!(
            Dice::with_faces(&[1, 2, 7, 4, 5]),
            Err(CategoryError::InvalidFace(7))
        );
        assert_eq!(
            Dice::with_faces(&[0; 5]),
            Err(CategoryError::InvalidFace(0))
        );

        let dice = Dice::with_faces(&[6, 5, 4, 3, 2]).unwrap();
        assert_eq!(dice.values(), &[6, 5, 4, 3, 2]);
        assert!(dice.rolled());
    }

    #[test]
    fn toggle_out_of_range() {
        let mut dice = Dice::new(DiceCount::Five);
        dice.toggle(5);
        dice.toggle(usize::MAX);
        assert_eq!(dice.held(), &[false; 5]);

        dice.toggle(4);
        assert!(dice.held()[4]);
        dice.toggle(4);
        assert!(!dice.held()[4]);
    }

    #[test]
    fn number() {
        assert_eq!(held(&[3, 3, 3, 3, 3]).number(3), Ok(15));
        // Holding nothing is a valid way to strike a number
        assert_eq!(
            Dice::with_faces(&[1, 2, 3, 4, 5]).unwrap().number(6),
            Ok(0)
        );

        let mut partial = Dice::with_faces(&[3, 3, 3, 2, 2]).unwrap();
        partial.toggle(0);
        partial.toggle(1);
        assert_eq!(partial.number(3), Ok(6));

        assert_eq!(
            held(&[3, 3, 3, 2, 2]).number(3),
            Err(CategoryError::FaceMismatch { face: 3, held: 2 })
        );
        assert_eq!(held(&[1; 5]).number(7), Err(CategoryError::InvalidFace(7)));
    }

    #[test]
    fn min_max() {
        assert_eq!(held(&[6, 6, 5, 5, 4]).min_max(), Ok(26));
        assert_eq!(held(&[1, 1, 1, 1, 1, 2]).min_max(), Ok(7));
        assert_eq!(
            Dice::with_faces(&[6, 6, 5, 5, 4]).unwrap().min_max(),
            Err(CategoryError::NeedAllDice(5))
        );
    }

    #[test]
    fn straight() {
        assert_eq!(held(&[5, 3, 1, 2, 4]).straight(), Ok(55));
        assert_eq!(held(&[6, 2, 3, 5, 4]).straight(), Ok(60));
        assert_eq!(held(&[1, 2, 3, 4, 6]).straight(), Ok(0));
        assert_eq!(held(&[1, 2, 3, 4, 5, 6]).straight(), Ok(60));
        assert_eq!(held(&[1, 2, 3, 4, 5, 5]).straight(), Ok(55));
    }

    #[test]
    fn full_house() {
        assert_eq!(held(&[3, 3, 3, 2, 2]).full_house(), Ok(43));
        assert_eq!(held(&[3, 3, 3, 3, 2]).full_house(), Ok(0));
        assert_eq!(held(&[4, 4, 4, 4, 4]).full_house(), Ok(0));

        let mut three_held = Dice::with_faces(&[3, 3, 3, 2, 2]).unwrap();
        (0..3).for_each(|i| three_held.toggle(i));
        assert_eq!(three_held.full_house(), Err(CategoryError::NeedAllDice(5)));
    }

    #[test]
    fn poker() {
        let mut dice = Dice::with_faces(&[5, 5, 2, 5, 5]).unwrap();
        for i in [0, 1, 3, 4] {
            dice.toggle(i);
        }
        assert_eq!(dice.poker(), Ok(70));

        dice.toggle(2);
        assert_eq!(dice.poker(), Err(CategoryError::NeedFourDice));

        let mut mixed = Dice::with_faces(&[5, 5, 2, 5, 5]).unwrap();
        (0..4).for_each(|i| mixed.toggle(i));
        assert_eq!(mixed.poker(), Ok(0));
    }

    #[test]
    fn yamb() {
        assert_eq!(held(&[6; 5]).yamb(), Ok(110));
        assert_eq!(held(&[2; 6]).yamb(), Ok(92));
        assert_eq!(held(&[6, 6, 6, 6, 5]).yamb(), Ok(0));
        assert_eq!(
            Dice::with_faces(&[6; 5]).unwrap().yamb(),
            Err(CategoryError::NeedAllDice(5))
        );
    }

    #[test]
    fn categories_do_not_mutate() {
        let dice = held(&[3, 3, 3, 2, 2]);
        let before = dice.clone();
        let _ = dice.full_house();
        let _ = dice.straight();
        let _ = dice.yamb();
        let _ = dice.number(3);
        assert_eq!(dice, before);
    }

    fn permuted_faces() -> impl Strategy<Value = (Vec<u8>, Vec<u8>)> {
        (5usize..=6)
            .prop_flat_map(|n| proptest::collection::vec(1u8..=6, n))
            .prop_flat_map(|faces| (Just(faces.clone()), Just(faces).prop_shuffle()))
    }

    proptest! {
        #[test]
        fn categories_ignore_die_order((faces, shuffled) in permuted_faces()) {
            let a = held(&faces);
            let b = held(&shuffled);
            prop_assert_eq!(a.yamb(), b.yamb());
            prop_assert_eq!(a.full_house(), b.full_house());
            prop_assert_eq!(a.straight(), b.straight());
            prop_assert_eq!(a.min_max(), b.min_max());

            let mut a = Dice::with_faces(&faces[..4]).unwrap();
            let mut b = Dice::with_faces(&shuffled[..4]).unwrap();
            (0..4).for_each(|i| { a.toggle(i); b.toggle(i); });
            let mut sorted_a = faces[..4].to_vec();
            let mut sorted_b = shuffled[..4].to_vec();
            sorted_a.sort_unstable();
            sorted_b.sort_unstable();
            if sorted_a == sorted_b {
                prop_assert_eq!(a.poker(), b.poker());
            }
        }
    }
}
