pub mod co2_reader;
pub mod grid_extractor;
pub mod observation_reader;

pub use co2_reader::{Co2Reader, Co2Record};
pub use grid_extractor::{
    apply_transforms, CsvGridExtractor, GridExtractor, GridRequest, LinearTransform,
    TransformPreset,
};
pub use observation_reader::{
    ColumnMapping, ObservationFile, ObservationReader, TimestampLayout,
};
