use super::element::{Element, ElementError};
use nalgebra::Point3;
use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StructureError {
    #[error("Neighbour list has {entries} entries for {atoms} atoms")]
    NeighborListLength { entries: usize, atoms: usize },
    #[error("Neighbour index {index} is out of range for {atoms} atoms")]
    NeighborOutOfRange { index: usize, atoms: usize },
}

/// A single atom: its element and Cartesian position in Angstroms.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Atom {
    /// Atomic number of the element.
    pub number: u8,
    /// Position in Angstroms.
    pub position: Point3<f64>,
}

impl Atom {
    pub fn new(number: u8, position: Point3<f64>) -> Self {
        Self { number, position }
    }

    /// Creates an atom from an element symbol.
    pub fn from_symbol(symbol: &str, position: Point3<f64>) -> Result<Self, ElementError> {
        let element = Element::by_symbol(symbol)?;
        Ok(Self::new(element.number, position))
    }

    /// Static element data for this atom.
    pub fn element(&self) -> Result<&'static Element, ElementError> {
        Element::by_number(self.number)
    }
}

/// A value stored in a structure's info record.
#[derive(Debug, Clone, PartialEq)]
pub enum InfoValue {
    Float(f64),
    Int(i64),
    Bool(bool),
    Text(String),
}

impl InfoValue {
    /// Numeric view of the value; integers are widened, other kinds yield `None`.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            InfoValue::Float(v) => Some(*v),
            InfoValue::Int(v) => Some(*v as f64),
            _ => None,
        }
    }

    /// Parses a raw token, preferring integer, then float, then boolean, then text.
    pub fn parse(raw: &str) -> Self {
        if let Ok(v) = raw.parse::<i64>() {
            return InfoValue::Int(v);
        }
        if let Ok(v) = raw.parse::<f64>() {
            return InfoValue::Float(v);
        }
        match raw.to_ascii_lowercase().as_str() {
            "true" | "t" => InfoValue::Bool(true),
            "false" | "f" => InfoValue::Bool(false),
            _ => InfoValue::Text(raw.to_string()),
        }
    }
}

/// Renders the value so that [`InfoValue::parse`] (or a quoted read) restores it.
///
/// Floats use the shortest representation that parses back to the same bits and always
/// carry a decimal point or exponent. Text is quoted whenever it would otherwise read
/// back as another kind.
impl fmt::Display for InfoValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InfoValue::Float(v) => write!(f, "{:?}", v),
            InfoValue::Int(v) => write!(f, "{}", v),
            InfoValue::Bool(v) => write!(f, "{}", if *v { "T" } else { "F" }),
            InfoValue::Text(v) if needs_quotes(v) => write!(f, "\"{}\"", v),
            InfoValue::Text(v) => f.write_str(v),
        }
    }
}

fn needs_quotes(text: &str) -> bool {
    text.is_empty()
        || text.contains(|c: char| c.is_whitespace() || c == '=')
        || !matches!(InfoValue::parse(text), InfoValue::Text(_))
}

/// An atomistic structure together with its key-value record.
///
/// The info map carries everything that is not geometry, most importantly the
/// scalar targets (e.g. `energy`) that regression models are trained against.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Structure {
    unique_id: String,
    atoms: Vec<Atom>,
    info: BTreeMap<String, InfoValue>,
    neighborlist: Option<Vec<Vec<usize>>>,
}

impl Structure {
    pub fn new(unique_id: &str) -> Self {
        Self {
            unique_id: unique_id.to_string(),
            ..Self::default()
        }
    }

    pub fn with_atoms(unique_id: &str, atoms: Vec<Atom>) -> Self {
        Self {
            unique_id: unique_id.to_string(),
            atoms,
            ..Self::default()
        }
    }

    pub fn unique_id(&self) -> &str {
        &self.unique_id
    }

    pub fn set_unique_id(&mut self, unique_id: &str) {
        self.unique_id = unique_id.to_string();
    }

    pub fn atoms(&self) -> &[Atom] {
        &self.atoms
    }

    pub fn push_atom(&mut self, atom: Atom) {
        self.atoms.push(atom);
        self.neighborlist = None;
    }

    pub fn len(&self) -> usize {
        self.atoms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.atoms.is_empty()
    }

    pub fn numbers(&self) -> Vec<u8> {
        self.atoms.iter().map(|a| a.number).collect()
    }

    pub fn positions(&self) -> Vec<Point3<f64>> {
        self.atoms.iter().map(|a| a.position).collect()
    }

    /// Chemical symbols in atom order; unknown atomic numbers are rendered as `X`.
    pub fn symbols(&self) -> Vec<&'static str> {
        self.atoms
            .iter()
            .map(|a| a.element().map(|e| e.symbol).unwrap_or("X"))
            .collect()
    }

    /// Distance in Angstroms between atoms `i` and `j`.
    ///
    /// # Panics
    ///
    /// Panics if either index is out of bounds.
    pub fn distance(&self, i: usize, j: usize) -> f64 {
        (self.atoms[i].position - self.atoms[j].position).norm()
    }

    pub fn info(&self) -> &BTreeMap<String, InfoValue> {
        &self.info
    }

    pub fn info_value(&self, key: &str) -> Option<&InfoValue> {
        self.info.get(key)
    }

    pub fn set_info(&mut self, key: &str, value: InfoValue) {
        self.info.insert(key.to_string(), value);
    }

    /// Numeric value of an info key, used as a regression target.
    ///
    /// Returns `None` if the key is absent or does not hold a number.
    pub fn target(&self, key: &str) -> Option<f64> {
        self.info.get(key).and_then(InfoValue::as_f64)
    }

    /// Neighbour list supplied with the structure, if any.
    pub fn neighborlist(&self) -> Option<&[Vec<usize>]> {
        self.neighborlist.as_deref()
    }

    /// Attaches a precomputed neighbour list.
    ///
    /// The list must have one entry per atom; entries referencing atoms outside the
    /// structure are rejected.
    pub fn set_neighborlist(
        &mut self,
        neighborlist: Vec<Vec<usize>>,
    ) -> Result<(), StructureError> {
        let atoms = self.atoms.len();
        if neighborlist.len() != atoms {
            return Err(StructureError::NeighborListLength {
                entries: neighborlist.len(),
                atoms,
            });
        }
        if let Some(&index) = neighborlist.iter().flatten().find(|&&j| j >= atoms) {
            return Err(StructureError::NeighborOutOfRange { index, atoms });
        }
        self.neighborlist = Some(neighborlist);
        Ok(())
    }
}
