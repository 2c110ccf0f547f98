//! Tensor shape and storage-format descriptors.
//!
//! The actual storage-format algorithms (how a compressed mode is laid out
//! in memory) belong to a downstream lowering crate; this module carries
//! only the minimal contract the core needs: per-mode storage kind, mode
//! order (for transposition checks), and whether the layout admits
//! in-place accumulation.

use crate::error::{Result, UserError};
use std::fmt;

/// A single tensor dimension: either a fixed extent or a named symbolic one.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Dim {
    Fixed(u64),
    Symbolic(String),
}

impl fmt::Display for Dim {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Dim::Fixed(n) => write!(f, "{}", n),
            Dim::Symbolic(s) => f.write_str(s),
        }
    }
}

/// An ordered sequence of dimensions. `order()` is the tensor's arity.
#[derive(Clone, Debug, PartialEq, Eq, Default)]
pub struct Shape(Vec<Dim>);

impl Shape {
    pub fn new(dims: Vec<Dim>) -> Self {
        Shape(dims)
    }

    pub fn scalar() -> Self {
        Shape(Vec::new())
    }

    pub fn order(&self) -> usize {
        self.0.len()
    }

    pub fn dims(&self) -> &[Dim] {
        &self.0
    }

    pub fn dim(&self, i: usize) -> Option<&Dim> {
        self.0.get(i)
    }
}

/// Per-mode storage kind. Opaque beyond dense/compressed: the internal
/// layout of a compressed mode is a downstream lowering concern.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ModeFormat {
    Dense,
    Compressed,
}

/// A format descriptor: storage kind per mode, the mode traversal order,
/// and whether the resulting layout can be accumulated into in place.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Format {
    modes: Vec<ModeFormat>,
    mode_order: Vec<usize>,
    in_place_accumulate: bool,
}

impl Format {
    /// Row-major dense format for a tensor of the given order.
    pub fn dense_row_major(order: usize) -> Self {
        Format {
            modes: vec![ModeFormat::Dense; order],
            mode_order: (0..order).collect(),
            in_place_accumulate: true,
        }
    }

    pub fn new(modes: Vec<ModeFormat>, mode_order: Vec<usize>, in_place_accumulate: bool) -> Self {
        Format {
            modes,
            mode_order,
            in_place_accumulate,
        }
    }

    pub fn order(&self) -> usize {
        self.modes.len()
    }

    pub fn mode_order(&self) -> &[usize] {
        &self.mode_order
    }

    pub fn modes(&self) -> &[ModeFormat] {
        &self.modes
    }

    pub fn admits_in_place_accumulate(&self) -> bool {
        self.in_place_accumulate
    }

    /// Parses a per-mode format string such as `"dd"` (two dense modes) or
    /// `"dc"` (dense-then-compressed), in mode-traversal order. `'d'` is
    /// dense, `'c'` is compressed; any other character is a `UserError`.
    /// Mode order is left identity (the parser has no syntax for mode
    /// permutation) and in-place accumulation is permitted iff every mode
    /// is dense, matching the reference lowering's restriction that
    /// accumulating into a compressed mode requires a separate workspace.
    pub fn parse(spec: &str) -> Result<Self> {
        let mut modes = Vec::with_capacity(spec.len());
        for (position, ch) in spec.chars().enumerate() {
            let mode = match ch {
                'd' => ModeFormat::Dense,
                'c' => ModeFormat::Compressed,
                found => return Err(UserError::BadFormatChar { found, position }),
            };
            modes.push(mode);
        }
        let in_place_accumulate = modes.iter().all(|m| *m == ModeFormat::Dense);
        let mode_order = (0..modes.len()).collect();
        Ok(Format {
            modes,
            mode_order,
            in_place_accumulate,
        })
    }
}
