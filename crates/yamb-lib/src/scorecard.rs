use std::fmt::Display;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::dice::{CategoryError, CategoryResult, Dice};

const UPPER_BONUS_THRESHOLD: u32 = 60;
const UPPER_BONUS: u32 = 30;

/// Scorecard rows in display order. The three sum rows are calculated, never written by players.
#[derive(Debug, Copy, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum Row {
    One,
    Two,
    Three,
    Four,
    Five,
    Six,
    UpperSum,
    Max,
    Min,
    MiddleSum,
    Straight,
    FullHouse,
    Poker,
    Yamb,
    LowerSum,
}

impl Row {
    pub const COUNT: usize = 15;
    pub const ALL: [Row; Row::COUNT] = [
        Row::One,
        Row::Two,
        Row::Three,
        Row::Four,
        Row::Five,
        Row::Six,
        Row::UpperSum,
        Row::Max,
        Row::Min,
        Row::MiddleSum,
        Row::Straight,
        Row::FullHouse,
        Row::Poker,
        Row::Yamb,
        Row::LowerSum,
    ];
    pub const NUMBERS: [Row; 6] = [
        Row::One,
        Row::Two,
        Row::Three,
        Row::Four,
        Row::Five,
        Row::Six,
    ];
    pub const LOWER: [Row; 4] = [Row::Straight, Row::FullHouse, Row::Poker, Row::Yamb];
    pub const SUMS: [Row; 3] = [Row::UpperSum, Row::MiddleSum, Row::LowerSum];

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn is_sum(self) -> bool {
        matches!(self, Row::UpperSum | Row::MiddleSum | Row::LowerSum)
    }

    pub fn label(self) -> &'static str {
        match self {
            Row::One => "1",
            Row::Two => "2",
            Row::Three => "3",
            Row::Four => "4",
            Row::Five => "5",
            Row::Six => "6",
            Row::Max => "Max",
            Row::Min => "Min",
            Row::Straight => "Straight",
            Row::FullHouse => "Full",
            Row::Poker => "Poker",
            Row::Yamb => "Yamb",
            Row::UpperSum | Row::MiddleSum | Row::LowerSum => "Sum",
        }
    }

    /// The nearest player-written row above this one, if any.
    pub fn above(self) -> Option<Row> {
        self.neighbour(|i| i.checked_sub(1))
    }

    /// The nearest player-written row below this one, if any.
    pub fn below(self) -> Option<Row> {
        self.neighbour(|i| i.checked_add(1))
    }

    fn neighbour(self, step: impl Fn(usize) -> Option<usize>) -> Option<Row> {
        let mut i = step(self.index())?;
        while Row::ALL.get(i)?.is_sum() {
            i = step(i)?;
        }
        Row::ALL.get(i).copied()
    }

    /// Scores this row's category with the held dice. Sum rows have no category.
    fn score(self, dice: &Dice) -> Option<CategoryResult> {
        let score = match self {
            Row::One => dice.number(1),
            Row::Two => dice.number(2),
            Row::Three => dice.number(3),
            Row::Four => dice.number(4),
            Row::Five => dice.number(5),
            Row::Six => dice.number(6),
            // Max and min are scored identically, they only differ in how the middle sum uses them
            Row::Max | Row::Min => dice.min_max(),
            Row::Straight => dice.straight(),
            Row::FullHouse => dice.full_house(),
            Row::Poker => dice.poker(),
            Row::Yamb => dice.yamb(),
            Row::UpperSum | Row::MiddleSum | Row::LowerSum => return None,
        };
        Some(score)
    }
}

impl Display for Row {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Scorecard columns, each with its own rule for when a cell may be written.
#[derive(Debug, Copy, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum Column {
    /// Written in row order, starting from the top.
    TopToBottom,
    /// Written in reverse row order, starting from the bottom.
    BottomToTop,
    Free,
    /// Only written after announcing.
    Announced,
}

impl Column {
    pub const COUNT: usize = 4;
    pub const ALL: [Column; Column::COUNT] = [
        Column::TopToBottom,
        Column::BottomToTop,
        Column::Free,
        Column::Announced,
    ];

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn label(self) -> &'static str {
        match self {
            Column::TopToBottom => "↓",
            Column::BottomToTop => "↑",
            Column::Free => "↑↓",
            Column::Announced => "N",
        }
    }
}

impl Display for Column {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Copy, Clone, Debug, Error, PartialEq, Eq)]
pub enum ScoreCardError {
    #[error("Sum rows are calculated and can't be chosen")]
    SumRow(Row),
    #[error("Row {0} in column {1} is already filled")]
    CellFilled(Row, Column),
    #[error(transparent)]
    Category(#[from] CategoryError),
    #[error("Row {row} in column {column} must wait for its neighbour to be filled")]
    OutOfOrder { row: Row, column: Column },
    #[error("The announced column needs an announcement first")]
    NotAnnounced,
    #[error("An announcement is already pending")]
    AlreadyAnnounced,
    #[error("No cell is selected")]
    NoSelection,
}

pub type ScoreCardResult<T> = Result<T, ScoreCardError>;

type Cells = [[Option<u32>; Column::COUNT]; Row::COUNT];

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ScoreCard {
    cells: Cells,
    selected: Option<(Row, Column)>,
    announced: bool,
}

impl ScoreCard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, row: Row, column: Column) -> Option<u32> {
        self.cells[row.index()][column.index()]
    }

    pub fn is_filled(&self, row: Row, column: Column) -> bool {
        self.get(row, column).is_some()
    }

    pub fn selected_cell(&self) -> Option<(Row, Column)> {
        self.selected
    }

    pub fn is_announced(&self) -> bool {
        self.announced
    }

    /// Selects a cell to be written by the next fill. Selecting the selected cell again clears it.
    pub fn select_cell(&mut self, row: Row, column: Column) -> ScoreCardResult<()> {
        if row.is_sum() {
            return Err(ScoreCardError::SumRow(row));
        }
        if self.is_filled(row, column) {
            return Err(ScoreCardError::CellFilled(row, column));
        }

        if self.selected == Some((row, column)) {
            self.selected = None;
        } else {
            self.selected = Some((row, column));
        }
        Ok(())
    }

    /// Unlocks a single write to the announced column.
    pub fn announce(&mut self) -> ScoreCardResult<()> {
        if self.announced {
            return Err(ScoreCardError::AlreadyAnnounced);
        }
        self.announced = true;
        Ok(())
    }

    pub fn fill_selected(&mut self, dice: &Dice) -> ScoreCardResult<u32> {
        let (row, column) = self.selected.ok_or(ScoreCardError::NoSelection)?;
        self.fill_cell(row, column, dice)
    }

    /// Writes the score `dice` make for `row` into `column` and recalculates the sums.
    ///
    /// # Errors
    ///
    /// Nothing is changed when the cell is a sum or already filled, when the held dice can't be
    /// scored for `row`, or when the column's ordering rule doesn't allow the cell yet.
    pub fn fill_cell(&mut self, row: Row, column: Column, dice: &Dice) -> ScoreCardResult<u32> {
        if self.is_filled(row, column) {
            return Err(ScoreCardError::CellFilled(row, column));
        }
        let score = row.score(dice).ok_or(ScoreCardError::SumRow(row))??;

        let neighbour = match column {
            Column::TopToBottom => row.above(),
            Column::BottomToTop => row.below(),
            Column::Free => None,
            Column::Announced if !self.announced => return Err(ScoreCardError::NotAnnounced),
            Column::Announced => None,
        };
        if neighbour.map_or(false, |n| !self.is_filled(n, column)) {
            return Err(ScoreCardError::OutOfOrder { row, column });
        }

        self.cells[row.index()][column.index()] = Some(score);
        if column == Column::Announced {
            self.announced = false;
        }
        if self.selected == Some((row, column)) {
            self.selected = None;
        }
        self.calculate_sums();
        Ok(score)
    }

    /// Fills in any sum whose rows are now complete. Filled sums are never recalculated.
    pub fn calculate_sums(&mut self) {
        for column in Column::ALL {
            if !self.is_filled(Row::UpperSum, column) {
                if let Some(sum) = self.sum_of(&Row::NUMBERS, column) {
                    let bonus = if sum >= UPPER_BONUS_THRESHOLD {
                        UPPER_BONUS
                    } else {
                        0
                    };
                    self.set(Row::UpperSum, column, sum + bonus);
                }
            }

            if !self.is_filled(Row::MiddleSum, column) {
                let rows = (
                    self.get(Row::Max, column),
                    self.get(Row::Min, column),
                    self.get(Row::One, column),
                );
                if let (Some(max), Some(min), Some(ones)) = rows {
                    self.set(Row::MiddleSum, column, max.saturating_sub(min) * ones);
                }
            }

            if !self.is_filled(Row::LowerSum, column) {
                if let Some(sum) = self.sum_of(&Row::LOWER, column) {
                    self.set(Row::LowerSum, column, sum);
                }
            }
        }
    }

    fn sum_of(&self, rows: &[Row], column: Column) -> Option<u32> {
        rows.iter().map(|&row| self.get(row, column)).sum()
    }

    fn set(&mut self, row: Row, column: Column, score: u32) {
        self.cells[row.index()][column.index()] = Some(score);
    }

    /// True once every sum in every column is filled.
    pub fn is_complete(&self) -> bool {
        Row::SUMS
            .iter()
            .all(|&row| Column::ALL.iter().all(|&column| self.is_filled(row, column)))
    }

    /// Sum of every sum cell on a complete card, 0 on an incomplete one.
    pub fn total_score(&self) -> u32 {
        if !self.is_complete() {
            return 0;
        }
        Row::SUMS
            .iter()
            .flat_map(|&row| Column::ALL.iter().map(move |&column| (row, column)))
            .filter_map(|(row, column)| self.get(row, column))
            .sum()
    }
}
