pub mod constants;
pub mod coordinates;
pub mod filename;
pub mod progress;
pub mod text;

pub use constants::*;
pub use coordinates::{deserialize_coordinate, dms_to_decimal, haversine_distance, parse_coordinate};
pub use filename::generate_default_output_filename;
pub use progress::ProgressReporter;
pub use text::{is_missing_marker, read_text_file};
