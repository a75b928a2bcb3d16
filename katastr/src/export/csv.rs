//! Export CSV de la table d'aperçu (sans géométrie)

use std::io::Write;

use crate::error::{KatastrError, Result};
use crate::table::{Cell, ParcelTable};

/// Écrit l'en-tête puis une ligne par parcelle
pub fn write_csv<W: Write>(table: &ParcelTable, writer: W) -> Result<()> {
    let mut csv = csv::Writer::from_writer(writer);
    csv.write_record(table.columns())?;
    for row in table.rows() {
        csv.write_record(row.iter().map(Cell::to_text))?;
    }
    csv.flush()?;
    Ok(())
}

pub fn to_csv_bytes(table: &ParcelTable) -> Result<Vec<u8>> {
    let mut buffer = Vec::with_capacity(table.len() * 128);
    write_csv(table, &mut buffer)?;
    if buffer.is_empty() {
        return Err(KatastrError::Export("CSV: nothing written".into()));
    }
    Ok(buffer)
}
