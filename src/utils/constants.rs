/// Restricted-hour window used for daytime means (inclusive)
pub const DEFAULT_WINDOW_START_HOUR: u32 = 11;
pub const DEFAULT_WINDOW_END_HOUR: u32 = 16;

/// Output column names
pub const DATE_COLUMN: &str = "date";
pub const DOY_COLUMN: &str = "doy";
pub const FILL_FLAGS_COLUMN: &str = "fill_flags";

/// Gridded point-file columns
pub const GRID_LON_COLUMN: &str = "lon";
pub const GRID_LAT_COLUMN: &str = "lat";
pub const GRID_DATE_COLUMN: &str = "date";
pub const GRID_DATE_FORMAT: &str = "%Y-%m-%d";
pub const RESOLUTION_DAILY: &str = "daily";

/// Missing-value markers recognised in input tables
pub const MISSING_MARKERS: [&str; 7] = ["", "NA", "NaN", "nan", "-9999", "-9999.0", "-9999.00"];
pub const DEFAULT_OUTPUT_MISSING: &str = "NA";

/// Saturation vapour pressure (Tetens, kPa)
pub const TETENS_A: f64 = 0.6108;
pub const TETENS_B: f64 = 17.27;
pub const TETENS_C: f64 = 237.3;

/// FAO-56 station pressure from elevation
pub const SEA_LEVEL_PRESSURE_KPA: f64 = 101.3;
pub const STANDARD_TEMP_K: f64 = 293.0;
pub const LAPSE_RATE: f64 = 0.0065;
pub const PRESSURE_EXPONENT: f64 = 5.26;

/// Ratio of molecular weights of water vapour and dry air
pub const EPSILON: f64 = 0.622;

/// Shortwave (W/m²) to PAR (µmol/m²/s): PAR fraction 0.5 × 4.57 µmol/J
pub const SHORTWAVE_TO_PAR: f64 = 2.285;

/// Kelvin to degrees Celsius
pub const KELVIN_OFFSET: f64 = 273.15;

/// QA thresholds
pub const TEMPERATURE_JUMP_THRESHOLD: f64 = 20.0;

/// Processing defaults
pub const DEFAULT_ROW_GROUP_SIZE: usize = 10000;
pub const DEFAULT_OUTPUT_DIR: &str = "output";
pub const ENV_PREFIX: &str = "SITE_FORCING";

/// Parquet compression options
pub const COMPRESSION_SNAPPY: &str = "snappy";
pub const COMPRESSION_GZIP: &str = "gzip";
pub const COMPRESSION_LZ4: &str = "lz4";
pub const COMPRESSION_ZSTD: &str = "zstd";
pub const COMPRESSION_NONE: &str = "none";
