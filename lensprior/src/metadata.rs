//! Per-sample metadata rows and their CSV export.
//!
//! A row is the flat `{component}_{param}` view of a sample
//! ([`Sample::flatten`](crate::sample::Sample::flatten)). The `add_*`
//! helpers append alternate parameterisations that downstream training code
//! expects next to the sampled ones.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use crate::ellipticity::{ellipticity2phi_q, shear_polar2cartesian};
use crate::error::Result;

/// One flattened sample
pub type Row = BTreeMap<String, f64>;

/// Add `{comp}_q`, `{comp}_phi` for every `{comp}_e1`, `{comp}_e2` pair.
pub fn add_qphi_columns(row: &mut Row) {
    let components: Vec<String> = row
        .keys()
        .filter_map(|key| key.strip_suffix("_e1"))
        .filter(|comp| row.contains_key(&format!("{comp}_e2")))
        .map(str::to_string)
        .collect();
    for comp in components {
        let (e1, e2) = (row[&format!("{comp}_e1")], row[&format!("{comp}_e2")]);
        let (phi, q) = ellipticity2phi_q(e1, e2);
        row.insert(format!("{comp}_q"), q);
        row.insert(format!("{comp}_phi"), phi);
    }
}

/// Add the Cartesian external shear `external_shear_gamma1`, `_gamma2`.
///
/// # Returns
/// Whether the row had `gamma_ext` and `psi_ext` to convert
pub fn add_g1g2_columns(row: &mut Row) -> bool {
    let (Some(&gamma), Some(&psi)) = (
        row.get("external_shear_gamma_ext"),
        row.get("external_shear_psi_ext"),
    ) else {
        return false;
    };
    let (gamma1, gamma2) = shear_polar2cartesian(psi, gamma);
    row.insert("external_shear_gamma1".into(), gamma1);
    row.insert("external_shear_gamma2".into(), gamma2);
    true
}

/// Add the source position relative to the lens, `src_light_pos_offset_x/y`.
pub fn add_relative_src_offset(row: &mut Row) -> bool {
    let get = |key: &str| row.get(key).copied();
    let (Some(src_x), Some(src_y), Some(lens_x), Some(lens_y)) = (
        get("src_light_center_x"),
        get("src_light_center_y"),
        get("lens_mass_center_x"),
        get("lens_mass_center_y"),
    ) else {
        return false;
    };
    row.insert("src_light_pos_offset_x".into(), src_x - lens_x);
    row.insert("src_light_pos_offset_y".into(), src_y - lens_y);
    true
}

/// Streaming CSV export of metadata rows.
///
/// The header is the sorted key set of the first row. Later rows are written
/// against that header: missing columns are left empty and extra columns are
/// dropped with a warning. Rows are flushed every `checkpoint_interval`.
#[derive(Debug)]
pub struct MetadataWriter {
    out: BufWriter<File>,
    header: Option<Vec<String>>,
    checkpoint_interval: usize,
    rows: usize,
}

impl MetadataWriter {
    pub fn create<P: AsRef<Path>>(path: P, checkpoint_interval: usize) -> Result<Self> {
        let file = File::create(path.as_ref())?;
        log::info!("Writing metadata to {}", path.as_ref().display());
        Ok(Self {
            out: BufWriter::new(file),
            header: None,
            checkpoint_interval: checkpoint_interval.max(1),
            rows: 0,
        })
    }

    pub fn header(&self) -> Option<&[String]> {
        self.header.as_deref()
    }

    /// Number of rows written so far
    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn write_row(&mut self, row: &Row) -> Result<()> {
        if self.header.is_none() {
            let header: Vec<String> = row.keys().cloned().collect();
            writeln!(self.out, "{}", header.join(","))?;
            self.header = Some(header);
        }
        let header = self.header.as_deref().unwrap_or_default();
        let extra = row.keys().filter(|k| header.binary_search(*k).is_err()).count();
        if extra > 0 {
            log::warn!("Dropping {extra} metadata columns not in the header of the first row");
        }
        let cells: Vec<String> = header
            .iter()
            .map(|key| row.get(key).map(|v| v.to_string()).unwrap_or_default())
            .collect();
        writeln!(self.out, "{}", cells.join(","))?;

        self.rows += 1;
        if self.rows == 1 || self.rows % self.checkpoint_interval == 0 {
            self.out.flush()?;
        }
        Ok(())
    }

    pub fn finish(mut self) -> Result<()> {
        self.out.flush()?;
        Ok(())
    }
}
