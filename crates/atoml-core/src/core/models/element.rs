use phf::phf_map;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Static data for a single chemical element.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Element {
    /// Atomic number (Z).
    pub number: u8,
    /// IUPAC symbol with canonical capitalisation.
    pub symbol: &'static str,
    /// Standard atomic mass in Daltons.
    pub mass: f64,
    /// Single-bond covalent radius in Angstroms (Cordero et al., 2008).
    pub covalent_radius: f64,
    /// Pauling electronegativity, absent for the noble gases.
    pub electronegativity: Option<f64>,
}

const fn el(
    number: u8,
    symbol: &'static str,
    mass: f64,
    covalent_radius: f64,
    electronegativity: Option<f64>,
) -> Element {
    Element {
        number,
        symbol,
        mass,
        covalent_radius,
        electronegativity,
    }
}

// Sorted by atomic number; `by_number` relies on this ordering.
static ELEMENTS: [Element; 51] = [
    el(1, "H", 1.008, 0.31, Some(2.20)),
    el(2, "He", 4.0026, 0.28, None),
    el(3, "Li", 6.94, 1.28, Some(0.98)),
    el(4, "Be", 9.0122, 0.96, Some(1.57)),
    el(5, "B", 10.81, 0.84, Some(2.04)),
    el(6, "C", 12.011, 0.76, Some(2.55)),
    el(7, "N", 14.007, 0.71, Some(3.04)),
    el(8, "O", 15.999, 0.66, Some(3.44)),
    el(9, "F", 18.998, 0.57, Some(3.98)),
    el(10, "Ne", 20.180, 0.58, None),
    el(11, "Na", 22.990, 1.66, Some(0.93)),
    el(12, "Mg", 24.305, 1.41, Some(1.31)),
    el(13, "Al", 26.982, 1.21, Some(1.61)),
    el(14, "Si", 28.085, 1.11, Some(1.90)),
    el(15, "P", 30.974, 1.07, Some(2.19)),
    el(16, "S", 32.06, 1.05, Some(2.58)),
    el(17, "Cl", 35.45, 1.02, Some(3.16)),
    el(18, "Ar", 39.948, 1.06, None),
    el(19, "K", 39.098, 2.03, Some(0.82)),
    el(20, "Ca", 40.078, 1.76, Some(1.00)),
    el(21, "Sc", 44.956, 1.70, Some(1.36)),
    el(22, "Ti", 47.867, 1.60, Some(1.54)),
    el(23, "V", 50.942, 1.53, Some(1.63)),
    el(24, "Cr", 51.996, 1.39, Some(1.66)),
    el(25, "Mn", 54.938, 1.39, Some(1.55)),
    el(26, "Fe", 55.845, 1.32, Some(1.83)),
    el(27, "Co", 58.933, 1.26, Some(1.88)),
    el(28, "Ni", 58.693, 1.24, Some(1.91)),
    el(29, "Cu", 63.546, 1.32, Some(1.90)),
    el(30, "Zn", 65.38, 1.22, Some(1.65)),
    el(31, "Ga", 69.723, 1.22, Some(1.81)),
    el(32, "Ge", 72.630, 1.20, Some(2.01)),
    el(33, "As", 74.922, 1.19, Some(2.18)),
    el(34, "Se", 78.971, 1.20, Some(2.55)),
    el(35, "Br", 79.904, 1.20, Some(2.96)),
    el(36, "Kr", 83.798, 1.16, Some(3.00)),
    el(42, "Mo", 95.95, 1.54, Some(2.16)),
    el(44, "Ru", 101.07, 1.46, Some(2.20)),
    el(45, "Rh", 102.91, 1.42, Some(2.28)),
    el(46, "Pd", 106.42, 1.39, Some(2.20)),
    el(47, "Ag", 107.87, 1.45, Some(1.93)),
    el(48, "Cd", 112.41, 1.44, Some(1.69)),
    el(50, "Sn", 118.71, 1.39, Some(1.96)),
    el(74, "W", 183.84, 1.62, Some(2.36)),
    el(75, "Re", 186.21, 1.51, Some(1.90)),
    el(76, "Os", 190.23, 1.44, Some(2.20)),
    el(77, "Ir", 192.22, 1.41, Some(2.20)),
    el(78, "Pt", 195.08, 1.36, Some(2.28)),
    el(79, "Au", 196.97, 1.36, Some(2.54)),
    el(80, "Hg", 200.59, 1.32, Some(2.00)),
    el(82, "Pb", 207.2, 1.46, Some(2.33)),
];

static SYMBOL_INDEX: phf::Map<&'static str, usize> = phf_map! {
    "H" => 0, "He" => 1, "Li" => 2, "Be" => 3, "B" => 4, "C" => 5, "N" => 6, "O" => 7,
    "F" => 8, "Ne" => 9, "Na" => 10, "Mg" => 11, "Al" => 12, "Si" => 13, "P" => 14,
    "S" => 15, "Cl" => 16, "Ar" => 17, "K" => 18, "Ca" => 19, "Sc" => 20, "Ti" => 21,
    "V" => 22, "Cr" => 23, "Mn" => 24, "Fe" => 25, "Co" => 26, "Ni" => 27, "Cu" => 28,
    "Zn" => 29, "Ga" => 30, "Ge" => 31, "As" => 32, "Se" => 33, "Br" => 34, "Kr" => 35,
    "Mo" => 36, "Ru" => 37, "Rh" => 38, "Pd" => 39, "Ag" => 40, "Cd" => 41, "Sn" => 42,
    "W" => 43, "Re" => 44, "Os" => 45, "Ir" => 46, "Pt" => 47, "Au" => 48, "Hg" => 49,
    "Pb" => 50,
};

#[derive(Debug, Error, Clone, PartialEq)]
pub enum ElementError {
    #[error("Unknown element symbol: '{0}'")]
    UnknownSymbol(String),
    #[error("Unknown atomic number: {0}")]
    UnknownNumber(u8),
    #[error("Unknown atomic property: '{0}'")]
    UnknownProperty(String),
    #[error("Element {symbol} has no tabulated {property}")]
    MissingProperty {
        symbol: &'static str,
        property: AtomicProperty,
    },
}

impl Element {
    /// Looks up an element by symbol.
    ///
    /// The lookup tolerates lower- or upper-case input (`"cu"`, `"CU"` and `"Cu"` all
    /// resolve to copper).
    pub fn by_symbol(symbol: &str) -> Result<&'static Element, ElementError> {
        let trimmed = symbol.trim();
        let mut chars = trimmed.chars();
        let canonical: String = match chars.next() {
            Some(first) => first
                .to_uppercase()
                .chain(chars.flat_map(|c| c.to_lowercase()))
                .collect(),
            None => String::new(),
        };
        SYMBOL_INDEX
            .get(canonical.as_str())
            .map(|&idx| &ELEMENTS[idx])
            .ok_or_else(|| ElementError::UnknownSymbol(trimmed.to_string()))
    }

    /// Looks up an element by atomic number.
    pub fn by_number(number: u8) -> Result<&'static Element, ElementError> {
        ELEMENTS
            .binary_search_by_key(&number, |e| e.number)
            .map(|idx| &ELEMENTS[idx])
            .map_err(|_| ElementError::UnknownNumber(number))
    }

    /// Returns the value of the requested atomic property.
    pub fn property(&self, property: AtomicProperty) -> Result<f64, ElementError> {
        match property {
            AtomicProperty::AtomicNumber => Ok(self.number as f64),
            AtomicProperty::Mass => Ok(self.mass),
            AtomicProperty::CovalentRadius => Ok(self.covalent_radius),
            AtomicProperty::Electronegativity => {
                self.electronegativity
                    .ok_or(ElementError::MissingProperty {
                        symbol: self.symbol,
                        property,
                    })
            }
        }
    }
}

/// Per-atom properties that can weight graph fingerprints.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum AtomicProperty {
    AtomicNumber,
    Mass,
    CovalentRadius,
    Electronegativity,
}

impl AtomicProperty {
    pub fn as_str(&self) -> &'static str {
        match self {
            AtomicProperty::AtomicNumber => "atomic-number",
            AtomicProperty::Mass => "mass",
            AtomicProperty::CovalentRadius => "covalent-radius",
            AtomicProperty::Electronegativity => "electronegativity",
        }
    }
}

impl fmt::Display for AtomicProperty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AtomicProperty {
    type Err = ElementError;

    /// Parses a property name; case-insensitive, accepting `-`, `_` or no separator.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized: String = s
            .to_ascii_lowercase()
            .chars()
            .filter(|c| *c != '-' && *c != '_')
            .collect();
        match normalized.as_str() {
            "atomicnumber" | "z" => Ok(AtomicProperty::AtomicNumber),
            "mass" | "atomicmass" | "atomicweight" => Ok(AtomicProperty::Mass),
            "covalentradius" => Ok(AtomicProperty::CovalentRadius),
            "electronegativity" | "paulingelectronegativity" => {
                Ok(AtomicProperty::Electronegativity)
            }
            _ => Err(ElementError::UnknownProperty(s.to_string())),
        }
    }
}
