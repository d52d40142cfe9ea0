use crate::core::models::scheme::Scheme;
use std::error::Error;
use std::fs::File;
use std::io::{self, BufRead, BufReader, BufWriter, Write};
use std::path::Path;

/// Defines the interface for reading and writing scheme file formats.
///
/// Implementors carry their layout options as state, so one value can be used to read
/// every shell of a multi-shell set and write the results back in the same layout.
pub trait SchemeFile {
    /// The error type for I/O operations.
    type Error: Error + From<io::Error>;

    /// Reads one shell from a buffered reader.
    ///
    /// # Errors
    ///
    /// Returns an error if parsing fails or I/O operations encounter issues.
    fn read_from(&self, reader: &mut impl BufRead) -> Result<Scheme, Self::Error>;

    /// Writes one shell to a writer.
    ///
    /// # Errors
    ///
    /// Returns an error if writing fails.
    fn write_to(&self, scheme: &Scheme, writer: &mut impl Write) -> Result<(), Self::Error>;

    /// Reads one shell from a file path.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened or parsing fails.
    fn read_from_path<P: AsRef<Path>>(&self, path: P) -> Result<Scheme, Self::Error> {
        let file = File::open(path)?;
        let mut reader = BufReader::new(file);
        self.read_from(&mut reader)
    }

    /// Writes one shell to a file path, creating or truncating the file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be created or writing fails.
    fn write_to_path<P: AsRef<Path>>(&self, scheme: &Scheme, path: P) -> Result<(), Self::Error> {
        let file = File::create(path)?;
        let mut writer = BufWriter::new(file);
        self.write_to(scheme, &mut writer)?;
        writer.flush()?;
        Ok(())
    }
}
