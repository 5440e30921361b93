use crate::core::models::structure::Structure;
use std::error::Error;
use std::fs::File;
use std::io::{self, BufRead, BufReader, BufWriter, Write};
use std::path::Path;

/// Defines the interface for reading and writing multi-structure file formats.
///
/// Implementors handle format-specific parsing and serialization; the path-based
/// helpers wrap them with buffered file handles.
pub trait StructureFile {
    /// The error type for I/O operations.
    type Error: Error + From<io::Error>;

    /// Reads every structure from a buffered reader, in file order.
    ///
    /// # Errors
    ///
    /// Returns an error if parsing fails or the reader fails.
    fn read_from(reader: &mut impl BufRead) -> Result<Vec<Structure>, Self::Error>;

    /// Writes structures to a writer, in slice order.
    ///
    /// # Errors
    ///
    /// Returns an error if writing fails.
    fn write_to(structures: &[Structure], writer: &mut impl Write) -> Result<(), Self::Error>;

    /// Reads every structure from a file path.
    fn read_from_path<P: AsRef<Path>>(path: P) -> Result<Vec<Structure>, Self::Error> {
        let file = File::open(path)?;
        let mut reader = BufReader::new(file);
        Self::read_from(&mut reader)
    }

    /// Writes structures to a file path, replacing any existing file.
    fn write_to_path<P: AsRef<Path>>(
        structures: &[Structure],
        path: P,
    ) -> Result<(), Self::Error> {
        let file = File::create(path)?;
        let mut writer = BufWriter::new(file);
        Self::write_to(structures, &mut writer)?;
        writer.flush()?;
        Ok(())
    }
}
