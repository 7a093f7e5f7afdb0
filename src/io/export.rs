//! Read/write model-bag JSON files.
//!
//! The schema is `domain::ModelBagExport`; this module only adds the file
//! handling and the JSON encoding.

use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

use crate::domain::{ModelBag, ModelBagExport};
use crate::error::TsaError;

fn io_err(path: &Path) -> impl FnOnce(std::io::Error) -> TsaError + '_ {
    move |source| TsaError::Io {
        path: path.display().to_string(),
        source,
    }
}

/// Write a bag as pretty-printed JSON.
pub fn write_bag_json(path: &Path, bag: &ModelBag) -> Result<(), TsaError> {
    let export = bag.to_export()?;
    let file = File::create(path).map_err(io_err(path))?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer_pretty(&mut writer, &export)?;
    writer.flush().map_err(io_err(path))?;
    Ok(())
}

/// Read the raw export structure.
pub fn read_export_json(path: &Path) -> Result<ModelBagExport, TsaError> {
    let file = File::open(path).map_err(io_err(path))?;
    Ok(serde_json::from_reader(BufReader::new(file))?)
}

/// Read and rebuild a bag.
pub fn read_bag_json(path: &Path) -> Result<ModelBag, TsaError> {
    ModelBag::from_export(&read_export_json(path)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{ModelSpace, ParameterCatalog, ParameterType, TargetModel, Topology, WholeModel};

    #[test]
    fn bag_survives_a_file_round_trip() {
        let catalog = ParameterCatalog::from_types([
            ParameterType::node("Growth Rate", 0.1, 1.0),
            ParameterType::edge("Interaction Strength", 0.1, 2.0),
        ]);
        let space = ModelSpace::new(1, vec!["Species 0".to_string()], 1, 1, 1, Vec::new(), Vec::new())
            .unwrap();
        let model = WholeModel {
            targets: vec![TargetModel {
                topology: Topology::basal(0),
                params: vec![0.3],
                distance: 0.125,
                aic: -12.5,
            }],
            distance: Some(0.75),
        };
        let bag = ModelBag::new(vec![model], catalog, space);

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bag.json");
        write_bag_json(&path, &bag).unwrap();

        let export = read_export_json(&path).unwrap();
        assert!(export.generated_at.is_some());
        assert_eq!(export.system.node_names, vec!["Species 0".to_string()]);
        assert_eq!(read_bag_json(&path).unwrap(), bag);
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = read_bag_json(&dir.path().join("absent.json")).unwrap_err();
        assert_eq!(err.exit_code(), 5);
        assert!(matches!(err, TsaError::Io { .. }));
    }
}
