use uuid::Uuid;

/// Builds a unique output filename inside the given remote directory, e.g.
/// `/tmp/reports/6f1c….csv`. The directory may be empty, in which case the
/// bare filename is returned.
pub fn generated_filename(directory: &str, extension: &str) -> String {
    let name = format!("{}{}", Uuid::new_v4(), extension);
    let trimmed = directory.trim();
    if trimmed.is_empty() {
        return name;
    }
    if trimmed.ends_with('/') {
        format!("{}{}", trimmed, name)
    } else {
        format!("{}/{}", trimmed, name)
    }
}

#[cfg(test)]
mod tests {
    use super::generated_filename;

    #[test]
    fn joins_directory_and_extension() {
        let path = generated_filename("/tmp/reports", ".csv");
        assert!(path.starts_with("/tmp/reports/"));
        assert!(path.ends_with(".csv"));
    }

    #[test]
    fn does_not_double_the_separator() {
        let path = generated_filename("/tmp/reports/", ".tsv");
        assert!(!path.contains("//"));
    }

    #[test]
    fn empty_directory_yields_bare_filename() {
        let path = generated_filename("", ".csv");
        assert!(!path.contains('/'));
    }
}
