//! Ternary values and the literal algebra shared by every other module.
//!
//! Two literal spaces coexist:
//! - [`AigLit`]: AIGER literals, `2 * index + complement`. Indices 0 and 1 are
//!   reserved: literal `0` is constant false and literal `1` is constant true.
//! - [`SatLit`]: DIMACS-like signed literals handed to the SAT oracle. `0` is never
//!   valid and variable 1 is reserved for the constant TRUE, so [`SatLit::TRUE`] is `1`
//!   and [`SatLit::FALSE`] is `-1`.
//!
//! Conversions between the two spaces take a variable offset so that two circuits
//! can live in the same oracle without their variables colliding.

use std::{
    fmt::{self, Display},
    ops::Not,
};

/// A ternary value. `Unknown` only appears when a computation could not conclude.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum TVal {
    False,
    True,
    #[default]
    DontCare,
    Unknown,
}

const AND_TABLE: [[TVal; 4]; 4] = {
    use TVal::*;
    [
        // False  True       DontCare   Unknown
        [False, False, False, Unknown],
        [False, True, DontCare, Unknown],
        [False, DontCare, DontCare, Unknown],
        [Unknown, Unknown, Unknown, Unknown],
    ]
};

impl TVal {
    /// Ternary conjunction.
    pub fn and(self, other: TVal) -> TVal {
        AND_TABLE[self as usize][other as usize]
    }

    /// Either `True` or `False`.
    pub fn is_bool(self) -> bool {
        matches!(self, TVal::False | TVal::True)
    }

    /// Complements the value when `complement` is set, used when reading through an edge.
    pub fn complement_if(self, complement: bool) -> TVal {
        if complement { !self } else { self }
    }

    pub fn to_bool(self) -> Option<bool> {
        match self {
            TVal::False => Some(false),
            TVal::True => Some(true),
            _ => None,
        }
    }
}

impl Not for TVal {
    type Output = Self;

    fn not(self) -> Self::Output {
        match self {
            TVal::False => TVal::True,
            TVal::True => TVal::False,
            other => other,
        }
    }
}

impl From<bool> for TVal {
    fn from(value: bool) -> Self {
        if value { TVal::True } else { TVal::False }
    }
}

impl Display for TVal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TVal::False => "0",
            TVal::True => "1",
            TVal::DontCare => "X",
            TVal::Unknown => "Z",
        };
        write!(f, "{s}")
    }
}

/// Index of a node in an AIG. 0 is the constant node.
pub type AigIndex = u32;

/// An AIGER literal: `2 * index + complement`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AigLit(u32);

impl AigLit {
    pub const FALSE: AigLit = AigLit(0);
    pub const TRUE: AigLit = AigLit(1);

    pub fn new(raw: u32) -> Self {
        AigLit(raw)
    }

    /// The positive literal of the node `index`.
    pub fn from_index(index: AigIndex) -> Self {
        AigLit(index << 1)
    }

    pub fn raw(self) -> u32 {
        self.0
    }

    pub fn index(self) -> AigIndex {
        self.0 >> 1
    }

    pub fn is_complemented(self) -> bool {
        self.0 & 1 == 1
    }

    pub fn is_const(self) -> bool {
        self.index() == 0
    }

    /// The literal with its complement bit cleared.
    pub fn regular(self) -> Self {
        AigLit(self.0 & !1)
    }

    /// Maps the literal to a SAT literal under Tseitin encoding: node `i` is variable
    /// `i + 1 + offset`, and the constant node maps onto the reserved constant variable.
    pub fn to_sat(self, offset: u32) -> SatLit {
        let lit = if self.is_const() {
            SatLit::FALSE
        } else {
            SatLit::from_var(self.index() + 1 + offset)
        };
        if self.is_complemented() { !lit } else { lit }
    }

    /// Maps the literal to its dual-rail pair: node `i` owns variables `2(i + offset)`
    /// (positive rail) and `2(i + offset) + 1` (negative rail). A complemented literal
    /// swaps the rails.
    pub fn to_dual_rail(self, offset: u32) -> DualRail {
        if self.is_const() {
            return if self.is_complemented() {
                DualRail::TRUE
            } else {
                DualRail::FALSE
            };
        }
        let base = self.regular().0 + 2 * offset;
        let rails = DualRail {
            pos: SatLit::from_var(base),
            neg: SatLit::from_var(base + 1),
        };
        if self.is_complemented() {
            !rails
        } else {
            rails
        }
    }
}

impl Not for AigLit {
    type Output = Self;

    fn not(self) -> Self::Output {
        AigLit(self.0 ^ 1)
    }
}

impl Display for AigLit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A signed SAT literal. The magnitude is the variable, the sign is the polarity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SatLit(i32);

impl SatLit {
    /// The reserved constant. Every oracle asserts it with a unit clause.
    pub const TRUE: SatLit = SatLit(1);
    pub const FALSE: SatLit = SatLit(-1);

    /// The positive literal of variable `var`.
    pub fn from_var(var: u32) -> Self {
        SatLit::from(var as i32)
    }

    pub fn to_dimacs(self) -> i32 {
        self.0
    }

    pub fn var(self) -> u32 {
        self.0.unsigned_abs()
    }

    pub fn is_positive(self) -> bool {
        self.0 > 0
    }

    pub fn is_const(self) -> bool {
        self.var() == 1
    }
}

impl Not for SatLit {
    type Output = Self;

    fn not(self) -> Self::Output {
        SatLit(-self.0)
    }
}

impl From<i32> for SatLit {
    fn from(value: i32) -> Self {
        if value == 0 {
            panic!("Tried to create a SatLit from 0. 0 is not a valid literal in DIMACS format.");
        }
        SatLit(value)
    }
}

impl Display for SatLit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The two rails of a node under dual-rail encoding.
///
/// `pos` true means the node is 1, `neg` true means the node is 0, neither means
/// don't-care. Both true is forbidden for referenced nodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DualRail {
    pub pos: SatLit,
    pub neg: SatLit,
}

impl DualRail {
    pub const TRUE: DualRail = DualRail {
        pos: SatLit::TRUE,
        neg: SatLit::FALSE,
    };
    pub const FALSE: DualRail = DualRail {
        pos: SatLit::FALSE,
        neg: SatLit::TRUE,
    };

    /// Reads the ternary value of the pair from the rail values.
    pub fn value(pos: bool, neg: bool) -> TVal {
        match (pos, neg) {
            (true, false) => TVal::True,
            (false, true) => TVal::False,
            (false, false) => TVal::DontCare,
            (true, true) => TVal::Unknown,
        }
    }
}

impl Not for DualRail {
    type Output = Self;

    /// Negation in dual-rail is a swap of the rails.
    fn not(self) -> Self::Output {
        DualRail {
            pos: self.neg,
            neg: self.pos,
        }
    }
}

/// A partial assignment to circuit inputs. Absent inputs are implicitly don't-care.
pub type InputAssignment = Vec<(AigLit, TVal)>;

/// An assignment keyed by the 0-based position of the input in the circuit's input list.
pub type IndexedAssignment = Vec<(usize, TVal)>;

/// Removes the don't-care entries of an assignment, keeping the order of the rest.
pub fn remove_dont_cares<K>(assignment: &mut Vec<(K, TVal)>) {
    assignment.retain(|(_, val)| val.is_bool());
}

/// Formats an assignment as `lit=val` pairs, in order.
pub fn assignment_to_string(assignment: &[(AigLit, TVal)]) -> String {
    assignment
        .iter()
        .map(|(lit, val)| format!("{lit}={val}"))
        .collect::<Vec<_>>()
        .join(" ")
}
