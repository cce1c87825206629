use std::path::Path;

use vitaledger_core::reference::ReferenceDirectory;
use vitaledger_core::VitaLedgerError;

/// Loads the input-only reference directory (providers, patients,
/// validators; spec §3) from `<DATA_ROOT>/reference.json`. A missing file
/// is not an error — the directory starts empty, matching an out-of-scope
/// seed script that simply hasn't run yet.
pub fn load_reference_directory<P: AsRef<Path>>(data_root: P) -> Result<ReferenceDirectory, VitaLedgerError> {
    let path = data_root.as_ref().join("reference.json");
    if !path.exists() {
        tracing::info!(path = %path.display(), "no reference directory seed found, starting empty");
        return Ok(ReferenceDirectory::default());
    }
    let raw = std::fs::read_to_string(&path)
        .map_err(|e| VitaLedgerError::storage(format!("reading {}: {e}", path.display())))?;
    serde_json::from_str(&raw)
        .map_err(|e| VitaLedgerError::Serialization(format!("parsing {}: {e}", path.display())))
}
