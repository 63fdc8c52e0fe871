//! Segmentation output: one line per token, `token <TAB> form1:…:formK`.

use std::io::Write;

use crate::errors::Result;
use crate::graph::Mapping;
use crate::lattice::Lattice;

/// Writes one sentence's chosen segmentation, ending with a blank line.
/// The root mapping is skipped.
///
/// # Errors
///
/// I/O errors are returned as is.
pub fn write_sentence<W>(wtr: &mut W, mappings: &[Mapping], lattices: &[Lattice]) -> Result<()>
where
    W: Write,
{
    for mapping in mappings {
        if mapping.token == 0 {
            continue;
        }
        let lattice = &lattices[mapping.token];
        let forms: Vec<&str> = mapping
            .spellout
            .iter()
            .map(|&m| lattice.morphemes[m].form.as_str())
            .collect();
        writeln!(wtr, "{}\t{}", lattice.token, forms.join(":"))?;
    }
    writeln!(wtr)?;
    Ok(())
}
