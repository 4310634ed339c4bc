use crate::utils::constants::DEFAULT_OUTPUT_DIR;
use std::path::PathBuf;

/// Default forcing output path: output/forcing-{site}-{start}-{end}.{ext}
pub fn generate_default_output_filename(
    site_id: &str,
    start_year: i32,
    end_year: i32,
    extension: &str,
) -> PathBuf {
    let safe_id: String = site_id
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect();

    let filename = format!(
        "forcing-{}-{}-{}.{}",
        safe_id, start_year, end_year, extension
    );
    PathBuf::from(DEFAULT_OUTPUT_DIR).join(filename)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_default_output_filename() {
        let filename = generate_default_output_filename("US-Ha1", 2010, 2015, "csv");
        let filename_str = filename.to_string_lossy();

        assert!(filename_str.starts_with("output"));
        assert!(filename_str.ends_with("forcing-US-Ha1-2010-2015.csv"));
    }

    #[test]
    fn test_unsafe_characters_replaced() {
        let filename = generate_default_output_filename("site/one two", 2000, 2001, "parquet");
        assert_eq!(
            filename.file_name().unwrap().to_string_lossy(),
            "forcing-site_one_two-2000-2001.parquet"
        );
    }
}
